use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::CommandVector;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Axis {axis}: input_low and input_high are both {value}")]
    DegenerateRange { axis: &'static str, value: f64 },

    #[error("Axis {axis}: {field} is not finite ({value})")]
    NonFinite {
        axis: &'static str,
        field: &'static str,
        value: f64,
    },

    #[error("{field} = {value} does not fit in one byte (0..=255)")]
    OutOfByteRange { field: String, value: i64 },

    #[error("Closure threshold must be finite and positive, got {0}")]
    InvalidThreshold(f64),
}

/// Tabla de calibración de un eje tal como aparece en el JSON
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisConfig {
    pub input_low: f64,
    pub input_center: f64,
    pub input_high: f64,
    pub output_low: i64,
    pub output_center: i64,
    pub output_high: i64,
    /// Si es true, input_low se mapea a output_high
    pub inverted: bool,
}

/// Configuración de calibración completa (sin validar)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Ángulo de la palma -> joint 1
    pub palm_angle: AxisConfig,
    /// Altura de la muñeca -> joint 2
    pub wrist_height: AxisConfig,
    /// Tamaño de la mano -> joint 3 (extensión)
    pub hand_size: AxisConfig,
    pub gripper_open: i64,
    pub gripper_closed: i64,
    /// Ratio de cierre por debajo del cual la pinza se considera cerrada
    pub closure_threshold: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            palm_angle: AxisConfig {
                input_low: -50.0,
                input_center: -15.0,
                input_high: 20.0,
                output_low: 0,
                output_center: 75,
                output_high: 180,
                inverted: true,
            },
            wrist_height: AxisConfig {
                input_low: 0.3,
                input_center: 0.6,
                input_high: 0.9,
                output_low: 35,
                output_center: 90,
                output_high: 72,
                inverted: true,
            },
            hand_size: AxisConfig {
                input_low: 0.1,
                input_center: 0.4,
                input_high: 0.7,
                output_low: 10,
                output_center: 50,
                output_high: 180,
                inverted: true,
            },
            gripper_open: 60,
            gripper_closed: 150,
            closure_threshold: 3.0,
        }
    }
}

impl CalibrationConfig {
    /// Carga la configuración desde un JSON; los campos ausentes toman el
    /// valor por defecto
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<Calibration, ConfigError> {
        let threshold = self.closure_threshold;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ConfigError::InvalidThreshold(threshold));
        }

        Ok(Calibration {
            joint1: CalibrationRange::from_config("palm_angle", &self.palm_angle)?,
            joint2: CalibrationRange::from_config("wrist_height", &self.wrist_height)?,
            joint3: CalibrationRange::from_config("hand_size", &self.hand_size)?,
            gripper_open: to_byte("gripper_open".to_string(), self.gripper_open)?,
            gripper_closed: to_byte("gripper_closed".to_string(), self.gripper_closed)?,
            closure_threshold: threshold,
        })
    }
}

fn to_byte(field: String, value: i64) -> Result<u8, ConfigError> {
    u8::try_from(value).map_err(|_| ConfigError::OutOfByteRange { field, value })
}

/// Rango de calibración validado de un eje
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationRange {
    input_low: f64,
    input_high: f64,
    output_low: u8,
    output_center: u8,
    output_high: u8,
    inverted: bool,
}

impl CalibrationRange {
    fn from_config(axis: &'static str, cfg: &AxisConfig) -> Result<Self, ConfigError> {
        for (field, value) in [
            ("input_low", cfg.input_low),
            ("input_center", cfg.input_center),
            ("input_high", cfg.input_high),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { axis, field, value });
            }
        }

        if cfg.input_low == cfg.input_high {
            return Err(ConfigError::DegenerateRange {
                axis,
                value: cfg.input_low,
            });
        }

        Ok(Self {
            input_low: cfg.input_low,
            input_high: cfg.input_high,
            output_low: to_byte(format!("{}.output_low", axis), cfg.output_low)?,
            output_center: to_byte(format!("{}.output_center", axis), cfg.output_center)?,
            output_high: to_byte(format!("{}.output_high", axis), cfg.output_high)?,
            inverted: cfg.inverted,
        })
    }

    /// Acota `value` al rango de entrada y lo reescala linealmente al rango
    /// de salida: |(v - i1) * (o2 - o1) / (i2 - i1) + o1|, truncado a entero.
    pub fn map(&self, value: f64) -> u8 {
        let (in_min, in_max) = if self.input_low <= self.input_high {
            (self.input_low, self.input_high)
        } else {
            (self.input_high, self.input_low)
        };
        let clamped = value.max(in_min).min(in_max);

        let (out_from, out_to) = if self.inverted {
            (self.output_high as f64, self.output_low as f64)
        } else {
            (self.output_low as f64, self.output_high as f64)
        };

        let scaled = ((clamped - self.input_low) * (out_to - out_from)
            / (self.input_high - self.input_low)
            + out_from)
            .abs()
            .trunc();

        // El redondeo en coma flotante puede dejar el resultado a 1 unidad
        // fuera de los límites de salida
        let (out_min, out_max) = self.output_bounds();
        scaled.clamp(out_min as f64, out_max as f64) as u8
    }

    /// Límites físicos del actuador: (mínimo, máximo)
    pub fn output_bounds(&self) -> (u8, u8) {
        (
            self.output_low.min(self.output_high),
            self.output_low.max(self.output_high),
        )
    }

    pub fn output_center(&self) -> u8 {
        self.output_center
    }
}

/// Calibración validada e inmutable, construida una vez al arrancar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub joint1: CalibrationRange,
    pub joint2: CalibrationRange,
    pub joint3: CalibrationRange,
    pub gripper_open: u8,
    pub gripper_closed: u8,
    pub closure_threshold: f64,
}

impl Calibration {
    /// Vector de reposo antes de la primera detección
    pub fn center_command(&self) -> CommandVector {
        CommandVector::new(
            self.joint1.output_center(),
            self.joint2.output_center(),
            self.joint3.output_center(),
            self.gripper_open,
        )
    }
}

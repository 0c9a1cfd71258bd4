use std::fmt;

use thiserror::Error;

/// Índices anatómicos de los 21 landmarks de la mano
pub const WRIST: usize = 0;
pub const INDEX_MCP: usize = 5;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

/// Articulaciones distales y puntas de los cuatro dedos (sin pulgar)
pub const FINGERTIP_JOINTS: [usize; 8] = [
    INDEX_DIP, INDEX_TIP, MIDDLE_DIP, MIDDLE_TIP, RING_DIP, RING_TIP, PINKY_DIP, PINKY_TIP,
];

/// Constantes del sistema
pub const NUM_LANDMARKS: usize = 21;
pub const COMMAND_LEN: usize = 4;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Invalid landmark count: expected 21, got {actual}")]
pub struct LandmarkCountError {
    pub actual: usize,
}

/// Punto 3D normalizado entregado por el modelo de landmarks
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Landmark {
    /// 0.0 a 1.0, normalizado al ancho de la imagen
    pub x: f64,
    /// 0.0 a 1.0, normalizado al alto de la imagen (0 = arriba)
    pub y: f64,
    /// Profundidad relativa a la muñeca
    pub z: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Distancia euclídea 3D
    pub fn distance(&self, other: &Landmark) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Los 21 landmarks de una mano detectada, en orden anatómico
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkSet {
    points: [Landmark; NUM_LANDMARKS],
}

impl LandmarkSet {
    pub fn new(points: [Landmark; NUM_LANDMARKS]) -> Self {
        Self { points }
    }

    pub fn from_slice(points: &[Landmark]) -> Result<Self, LandmarkCountError> {
        let points: [Landmark; NUM_LANDMARKS] = points
            .try_into()
            .map_err(|_| LandmarkCountError {
                actual: points.len(),
            })?;
        Ok(Self { points })
    }

    pub fn wrist(&self) -> &Landmark {
        &self.points[WRIST]
    }

    pub fn index_base(&self) -> &Landmark {
        &self.points[INDEX_MCP]
    }

    pub fn points(&self) -> &[Landmark; NUM_LANDMARKS] {
        &self.points
    }
}

impl std::ops::Index<usize> for LandmarkSet {
    type Output = Landmark;

    fn index(&self, idx: usize) -> &Landmark {
        &self.points[idx]
    }
}

/// Resultado por frame de la fuente de landmarks: `None` si no hay mano
pub type Detection = Option<LandmarkSet>;

/// Estado de la pinza
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GripState {
    Open,
    Closed,
}

impl GripState {
    /// Cerrada sólo si el ratio es estrictamente menor que el umbral
    pub fn classify(closure_ratio: f64, threshold: f64) -> Self {
        if closure_ratio < threshold {
            GripState::Closed
        } else {
            GripState::Open
        }
    }
}

/// Características geométricas de una mano en un frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    /// "Ángulo" de la palma ya truncado a entero (no es un ángulo real)
    pub palm_angle: f64,
    /// y de la muñeca, 0 = borde superior
    pub wrist_height: f64,
    /// Distancia muñeca -> base del índice
    pub hand_size: f64,
    /// Suma de distancias muñeca -> dedos dividida por hand_size
    pub closure_ratio: f64,
}

impl FeatureVector {
    pub fn grip(&self, threshold: f64) -> GripState {
        GripState::classify(self.closure_ratio, threshold)
    }
}

/// Vector de comandos [joint1, joint2, joint3, pinza], un byte por actuador
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandVector([u8; COMMAND_LEN]);

impl CommandVector {
    pub fn new(joint1: u8, joint2: u8, joint3: u8, gripper: u8) -> Self {
        Self([joint1, joint2, joint3, gripper])
    }

    pub fn joint1(&self) -> u8 {
        self.0[0]
    }

    pub fn joint2(&self) -> u8 {
        self.0[1]
    }

    pub fn joint3(&self) -> u8 {
        self.0[2]
    }

    pub fn gripper(&self) -> u8 {
        self.0[3]
    }

    /// Bytes en el orden del cable: [joint1, joint2, joint3, pinza]
    pub fn to_bytes(&self) -> [u8; COMMAND_LEN] {
        self.0
    }
}

impl fmt::Display for CommandVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

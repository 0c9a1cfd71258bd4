use std::f64::consts::PI;

use thiserror::Error;

use crate::types::{FeatureVector, LandmarkSet, FINGERTIP_JOINTS};

#[derive(Error, Debug, PartialEq)]
pub enum GeometryError {
    #[error("Degenerate hand: wrist and index base coincide (hand size {hand_size})")]
    DegenerateHand { hand_size: f64 },

    #[error("Non-finite feature {name}: {value}")]
    NonFinite { name: &'static str, value: f64 },
}

/// Extrae las 4 características de una mano
///
/// El "ángulo" de la palma es el desplazamiento horizontal muñeca -> índice
/// dividido por el tamaño de la mano, escalado por 180/π y truncado a entero.
/// No es un ángulo geométrico; la tabla de calibración está ajustada a esta
/// fórmula exacta, incluida la truncación previa al clamp.
pub fn extract(hand: &LandmarkSet) -> Result<FeatureVector, GeometryError> {
    let wrist = hand.wrist();
    let index_base = hand.index_base();

    let hand_size = wrist.distance(index_base);
    if !hand_size.is_finite() {
        return Err(GeometryError::NonFinite {
            name: "hand_size",
            value: hand_size,
        });
    }
    if hand_size <= 0.0 {
        return Err(GeometryError::DegenerateHand { hand_size });
    }

    let raw = (wrist.x - index_base.x) / hand_size;
    let palm_angle = (raw * 180.0 / PI).trunc();

    let features = FeatureVector {
        palm_angle,
        wrist_height: wrist.y,
        hand_size,
        closure_ratio: closure_ratio(hand, hand_size),
    };

    ensure_finite("palm_angle", features.palm_angle)?;
    ensure_finite("wrist_height", features.wrist_height)?;
    ensure_finite("closure_ratio", features.closure_ratio)?;

    Ok(features)
}

/// Suma de distancias muñeca -> articulaciones distales, normalizada
fn closure_ratio(hand: &LandmarkSet, hand_size: f64) -> f64 {
    let wrist = hand.wrist();
    let total: f64 = FINGERTIP_JOINTS
        .iter()
        .map(|&idx| wrist.distance(&hand[idx]))
        .sum();
    total / hand_size
}

fn ensure_finite(name: &'static str, value: f64) -> Result<(), GeometryError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(GeometryError::NonFinite { name, value })
    }
}

//! Control de un brazo robótico con la pose de una mano.
//!
//! Landmarks de la mano (detector externo) -> características geométricas
//! -> calibración a unidades del actuador -> vector de 4 bytes enviado por
//! puerto serie sólo cuando cambia.

pub mod assembler;
pub mod calibration;
pub mod csv_loader;
pub mod geometry;
pub mod landmark_source;
pub mod link;
pub mod pipeline;
pub mod transmitter;
pub mod types;

use crate::calibration::Calibration;
use crate::geometry::{self, GeometryError};
use crate::types::{CommandVector, FeatureVector, GripState, LandmarkSet};

/// Construye el vector de comandos a partir de una mano detectada
pub struct CommandAssembler<'a> {
    calibration: &'a Calibration,
}

impl<'a> CommandAssembler<'a> {
    pub fn new(calibration: &'a Calibration) -> Self {
        Self { calibration }
    }

    pub fn assemble(&self, hand: &LandmarkSet) -> Result<CommandVector, GeometryError> {
        let features = geometry::extract(hand)?;
        Ok(self.command_from_features(&features))
    }

    /// palm_angle -> joint1, wrist_height -> joint2, hand_size -> joint3,
    /// ratio de cierre -> pinza (dos valores fijos)
    pub fn command_from_features(&self, features: &FeatureVector) -> CommandVector {
        let cal = self.calibration;
        let gripper = match features.grip(cal.closure_threshold) {
            GripState::Closed => cal.gripper_closed,
            GripState::Open => cal.gripper_open,
        };

        CommandVector::new(
            cal.joint1.map(features.palm_angle),
            cal.joint2.map(features.wrist_height),
            cal.joint3.map(features.hand_size),
            gripper,
        )
    }
}

/// Estados del seguimiento de la mano
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    /// Sin mano en el último frame: el vector queda congelado
    NoHand,
    /// Mano detectada: el vector se recalcula cada frame
    Tracking,
}

/// Máquina de estados NoHand/Tracking que guarda el último vector deseado
#[derive(Debug, Clone)]
pub struct HandTracker {
    state: TrackingState,
    command: CommandVector,
}

impl HandTracker {
    /// `initial` es el vector mostrado antes de la primera detección
    pub fn new(initial: CommandVector) -> Self {
        Self {
            state: TrackingState::NoHand,
            command: initial,
        }
    }

    pub fn on_detection(&mut self, command: CommandVector) {
        self.state = TrackingState::Tracking;
        self.command = command;
    }

    /// Pérdida de la mano: no se vuelve al centro
    pub fn on_loss(&mut self) {
        self.state = TrackingState::NoHand;
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn command(&self) -> CommandVector {
        self.command
    }
}

use thiserror::Error;
use tracing::debug;

use crate::assembler::{CommandAssembler, HandTracker, TrackingState};
use crate::calibration::Calibration;
use crate::geometry::{self, GeometryError};
use crate::link::{ActuatorLink, LinkError};
use crate::transmitter::ChangeGatedTransmitter;
use crate::types::{CommandVector, FeatureVector, LandmarkSet};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Actuator link error: {0}")]
    Link(#[from] LinkError),
}

/// Resultado de procesar un frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameOutcome {
    pub state: TrackingState,
    /// Vector deseado tras el frame (congelado si no hay mano)
    pub command: CommandVector,
    /// `None` si el frame no traía mano
    pub features: Option<FeatureVector>,
    pub transmitted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames: u64,
    pub frames_with_hand: u64,
    pub writes: u64,
}

/// Extractor -> mapper -> ensamblador -> transmisor, un frame por llamada
pub struct Pipeline<'a, L: ActuatorLink> {
    assembler: CommandAssembler<'a>,
    tracker: HandTracker,
    transmitter: ChangeGatedTransmitter<L>,
    stats: PipelineStats,
}

impl<'a, L: ActuatorLink> Pipeline<'a, L> {
    pub fn new(calibration: &'a Calibration, link: L) -> Self {
        Self {
            assembler: CommandAssembler::new(calibration),
            tracker: HandTracker::new(calibration.center_command()),
            transmitter: ChangeGatedTransmitter::new(link),
            stats: PipelineStats::default(),
        }
    }

    /// Procesa un frame completo. Sin mano no se recalcula ni se escribe.
    pub fn process(&mut self, detection: Option<&LandmarkSet>) -> Result<FrameOutcome, PipelineError> {
        self.stats.frames += 1;

        let Some(hand) = detection else {
            self.tracker.on_loss();
            return Ok(FrameOutcome {
                state: self.tracker.state(),
                command: self.tracker.command(),
                features: None,
                transmitted: false,
            });
        };

        self.stats.frames_with_hand += 1;
        let features = geometry::extract(hand)?;
        let command = self.assembler.command_from_features(&features);
        self.tracker.on_detection(command);

        let transmitted = self.transmitter.submit(command)?;
        if transmitted {
            self.stats.writes += 1;
        }
        debug!(%command, transmitted, "frame procesado");

        Ok(FrameOutcome {
            state: self.tracker.state(),
            command,
            features: Some(features),
            transmitted,
        })
    }

    pub fn command(&self) -> CommandVector {
        self.tracker.command()
    }

    pub fn last_sent(&self) -> Option<CommandVector> {
        self.transmitter.last_sent()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn link(&self) -> &L {
        self.transmitter.link()
    }
}

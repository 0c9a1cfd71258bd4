use crate::link::{ActuatorLink, LinkError};
use crate::types::CommandVector;

/// Envía el vector al actuador sólo cuando cambia
pub struct ChangeGatedTransmitter<L: ActuatorLink> {
    link: L,
    last_sent: Option<CommandVector>,
}

impl<L: ActuatorLink> ChangeGatedTransmitter<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            last_sent: None,
        }
    }

    /// Devuelve `true` si se escribió. Un error de escritura se propaga sin
    /// reintentos y deja `last_sent` intacto.
    pub fn submit(&mut self, command: CommandVector) -> Result<bool, LinkError> {
        if self.last_sent == Some(command) {
            return Ok(false);
        }

        self.link.write_command(&command.to_bytes())?;
        self.last_sent = Some(command);
        Ok(true)
    }

    pub fn last_sent(&self) -> Option<CommandVector> {
        self.last_sent
    }

    pub fn link(&self) -> &L {
        &self.link
    }
}

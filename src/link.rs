use std::io::Write;
use std::time::Duration;

use serialport::SerialPort;
use thiserror::Error;
use tracing::{debug, info};

use crate::types::COMMAND_LEN;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Serial port error: {0}")]
    SerialError(#[from] serialport::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Canal de bytes hacia el microcontrolador
pub trait ActuatorLink {
    /// Escribe un comando completo; sin reintentos
    fn write_command(&mut self, bytes: &[u8; COMMAND_LEN]) -> Result<(), LinkError>;
}

impl<L: ActuatorLink + ?Sized> ActuatorLink for Box<L> {
    fn write_command(&mut self, bytes: &[u8; COMMAND_LEN]) -> Result<(), LinkError> {
        (**self).write_command(bytes)
    }
}

/// Puerto serie real (Arduino u otro microcontrolador)
pub struct SerialLink {
    port: Box<dyn SerialPort>,
}

impl SerialLink {
    pub fn open(path: &str, baud_rate: u32, write_timeout: Duration) -> Result<Self, LinkError> {
        let port = serialport::new(path, baud_rate)
            .timeout(write_timeout)
            .open()?;
        info!(port = path, baud_rate, "puerto serie abierto");
        Ok(Self { port })
    }
}

impl ActuatorLink for SerialLink {
    fn write_command(&mut self, bytes: &[u8; COMMAND_LEN]) -> Result<(), LinkError> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        debug!(?bytes, "comando escrito");
        Ok(())
    }
}

/// Modo DEBUG: no hay hardware, sólo se registra lo que se enviaría
#[derive(Debug, Default)]
pub struct DryRunLink;

impl DryRunLink {
    pub fn new() -> Self {
        Self
    }
}

impl ActuatorLink for DryRunLink {
    fn write_command(&mut self, bytes: &[u8; COMMAND_LEN]) -> Result<(), LinkError> {
        debug!(?bytes, "dry-run: comando no enviado");
        Ok(())
    }
}

/// Guarda en memoria cada comando escrito (replay y tests)
#[derive(Debug, Default, Clone)]
pub struct RecordingLink {
    writes: Vec<[u8; COMMAND_LEN]>,
}

impl RecordingLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> &[[u8; COMMAND_LEN]] {
        &self.writes
    }
}

impl ActuatorLink for RecordingLink {
    fn write_command(&mut self, bytes: &[u8; COMMAND_LEN]) -> Result<(), LinkError> {
        self.writes.push(*bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_link_keeps_order() {
        let mut link = RecordingLink::new();
        link.write_command(&[1, 2, 3, 4]).unwrap();
        link.write_command(&[5, 6, 7, 8]).unwrap();
        assert_eq!(link.writes(), &[[1, 2, 3, 4], [5, 6, 7, 8]]);
    }

    #[test]
    fn test_boxed_link_delegates() {
        let mut link: Box<dyn ActuatorLink> = Box::new(DryRunLink::new());
        assert!(link.write_command(&[0, 0, 0, 0]).is_ok());
    }

    #[test]
    fn test_open_missing_port_fails() {
        let result = SerialLink::open(
            "/dev/quirobrazo-no-existe",
            115_200,
            Duration::from_millis(100),
        );
        assert!(result.is_err());
    }
}

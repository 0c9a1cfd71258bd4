use std::io::{self, BufRead, BufReader, Read};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};

use crossbeam_channel::Sender;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, trace, warn};

use crate::types::{Detection, Landmark, LandmarkCountError, LandmarkSet};

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    LandmarkCount(#[from] LandmarkCountError),
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Line {line}: {source}")]
    Decode { line: u64, source: DecodeError },

    #[error("Could not start detector {program:?}: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("Detector did not signal READY, got {0:?}")]
    NotReady(String),

    #[error("Detector process has no stdout")]
    NoStdout,

    #[error("Detector exited with {0}")]
    DetectorExited(ExitStatus),
}

/// Formato JSON por línea que emite el detector de landmarks
#[derive(Deserialize, Debug)]
struct LandmarkJson {
    x: f64,
    y: f64,
    z: f64,
}

#[derive(Deserialize, Debug)]
struct HandJson {
    landmarks: Vec<LandmarkJson>,
    #[serde(default)]
    handedness: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

#[derive(Deserialize, Debug)]
struct DetectionJson {
    #[serde(default)]
    hands: Vec<HandJson>,
    #[serde(default)]
    error: Option<String>,
}

/// Decodifica una línea del detector.
///
/// - línea vacía -> `Ok(None)` (no es un frame)
/// - `hands` vacío o `error` presente -> `Ok(Some(None))`, frame sin mano
/// - sólo se usa la primera mano
pub fn decode_detection(line: &str) -> Result<Option<Detection>, DecodeError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let parsed: DetectionJson = serde_json::from_str(line)?;

    if let Some(err) = parsed.error {
        warn!(error = %err, "el detector reportó un error, frame sin mano");
        return Ok(Some(None));
    }

    let Some(hand) = parsed.hands.into_iter().next() else {
        return Ok(Some(None));
    };

    trace!(handedness = ?hand.handedness, score = ?hand.score, "mano detectada");
    let points: Vec<Landmark> = hand
        .landmarks
        .iter()
        .map(|lm| Landmark::new(lm.x, lm.y, lm.z))
        .collect();

    Ok(Some(Some(LandmarkSet::from_slice(&points)?)))
}

/// Lee detecciones línea a línea y las envía por el canal, en orden.
/// Termina al acabar la entrada o si el receptor se cierra; devuelve el
/// número de frames enviados.
pub fn start_landmark_reader<R: BufRead>(reader: R, tx: Sender<Detection>) -> Result<u64, SourceError> {
    let mut frames = 0u64;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let detection = decode_detection(&line).map_err(|source| SourceError::Decode {
            line: idx as u64 + 1,
            source,
        })?;

        let Some(detection) = detection else {
            continue;
        };

        if tx.send(detection).is_err() {
            info!("receptor cerrado, deteniendo lector de landmarks");
            break;
        }
        frames += 1;
    }

    Ok(frames)
}

/// Subproceso detector (p. ej. un script de MediaPipe) que escribe una
/// línea JSON por frame en stdout tras anunciar `READY`.
/// El proceso se mata al soltar el valor; su salida se lee por separado a
/// través de `DetectorOutput`.
pub struct DetectorProcess {
    child: Child,
}

/// stdout del detector, ya pasada la línea `READY`
pub struct DetectorOutput {
    stdout: BufReader<ChildStdout>,
}

impl DetectorProcess {
    pub fn spawn(program: &str, args: &[String]) -> Result<(Self, DetectorOutput), SourceError> {
        info!(program, ?args, "lanzando detector de landmarks");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| SourceError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or(SourceError::NoStdout)?;
        let detector = Self { child };
        let mut output = DetectorOutput {
            stdout: BufReader::new(stdout),
        };

        // Esperar la señal "READY"
        let mut ready_line = String::new();
        output.stdout.read_line(&mut ready_line)?;
        if ready_line.trim() != "READY" {
            return Err(SourceError::NotReady(ready_line.trim().to_string()));
        }

        info!("detector listo");
        Ok((detector, output))
    }

    /// Espera a que el detector termine tras cerrar su stdout. Un código de
    /// salida distinto de cero es una pérdida de percepción, no un fin normal.
    pub fn finish(mut self) -> Result<(), SourceError> {
        let status = self.child.wait()?;
        if !status.success() {
            return Err(SourceError::DetectorExited(status));
        }
        info!(%status, "detector terminado");
        Ok(())
    }
}

impl Read for DetectorOutput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stdout.read(buf)
    }
}

impl BufRead for DetectorOutput {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.stdout.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.stdout.consume(amt)
    }
}

impl Drop for DetectorProcess {
    fn drop(&mut self) {
        // Tras `finish` el hijo ya fue recogido y esto no hace nada
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{bounded, unbounded};
    use std::io::Cursor;

    /// Línea JSON con una mano cuya muñeca está en (x, y)
    fn hand_line(x: f64, y: f64, count: usize) -> String {
        let landmarks: Vec<String> = (0..count)
            .map(|i| {
                format!(
                    r#"{{"x":{},"y":{},"z":0.0}}"#,
                    x + i as f64 * 0.01,
                    y - i as f64 * 0.01
                )
            })
            .collect();
        format!(
            r#"{{"hands":[{{"handedness":"Right","score":0.98,"landmarks":[{}]}}]}}"#,
            landmarks.join(",")
        )
    }

    #[test]
    fn test_decode_hand() {
        let detection = decode_detection(&hand_line(0.5, 0.6, 21)).unwrap();
        let hand = detection.unwrap().unwrap();
        assert_eq!(hand.wrist(), &Landmark::new(0.5, 0.6, 0.0));
        assert!((hand.index_base().x - 0.55).abs() < 1e-9);
    }

    #[test]
    fn test_decode_no_hand() {
        assert_eq!(decode_detection(r#"{"hands":[]}"#).unwrap(), Some(None));
        assert_eq!(decode_detection("{}").unwrap(), Some(None));
        assert_eq!(
            decode_detection(r#"{"hands":[],"error":"camera timeout"}"#).unwrap(),
            Some(None)
        );
    }

    #[test]
    fn test_blank_line_is_not_a_frame() {
        assert_eq!(decode_detection("   ").unwrap(), None);
    }

    #[test]
    fn test_only_first_hand_is_used() {
        let first = hand_line(0.2, 0.3, 21);
        let second = hand_line(0.7, 0.8, 21);
        let strip = |line: &str| -> String {
            line.strip_prefix(r#"{"hands":["#)
                .and_then(|rest| rest.strip_suffix("]}"))
                .unwrap()
                .to_string()
        };
        let hands_first = strip(&first);
        let hands_second = strip(&second);
        let line = format!(r#"{{"hands":[{},{}]}}"#, hands_first, hands_second);

        let hand = decode_detection(&line).unwrap().unwrap().unwrap();
        assert_eq!(hand.wrist().x, 0.2);
    }

    #[test]
    fn test_wrong_landmark_count_fails() {
        let err = decode_detection(&hand_line(0.5, 0.5, 20)).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::LandmarkCount(LandmarkCountError { actual: 20 })
        ));
    }

    #[test]
    fn test_invalid_json_fails() {
        assert!(matches!(
            decode_detection("{hands: nope"),
            Err(DecodeError::JsonError(_))
        ));
    }

    #[test]
    fn test_reader_keeps_frame_order() {
        let input = format!(
            "{}\n{}\n\n{}\n",
            hand_line(0.1, 0.5, 21),
            r#"{"hands":[]}"#,
            hand_line(0.3, 0.5, 21)
        );
        let (tx, rx) = unbounded();
        let frames = start_landmark_reader(Cursor::new(input), tx).unwrap();
        assert_eq!(frames, 3);

        let received: Vec<Detection> = rx.iter().collect();
        assert_eq!(received.len(), 3);
        assert_eq!(received[0].unwrap().wrist().x, 0.1);
        assert!(received[1].is_none());
        assert_eq!(received[2].unwrap().wrist().x, 0.3);
    }

    #[test]
    fn test_reader_reports_line_number() {
        let input = format!("{}\nbasura\n", hand_line(0.1, 0.5, 21));
        let (tx, _rx) = unbounded();
        match start_landmark_reader(Cursor::new(input), tx) {
            Err(SourceError::Decode { line, .. }) => assert_eq!(line, 2),
            other => panic!("resultado inesperado: {:?}", other),
        }
    }

    #[test]
    fn test_reader_stops_when_receiver_dropped() {
        let input = format!("{}\n{}\n", hand_line(0.1, 0.5, 21), hand_line(0.2, 0.5, 21));
        let (tx, rx) = bounded(1);
        drop(rx);
        assert_eq!(start_landmark_reader(Cursor::new(input), tx).unwrap(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_detector_process_handshake() {
        let script = format!("echo READY; echo '{}'", r#"{"hands":[]}"#);
        let (detector, output) = DetectorProcess::spawn("sh", &["-c".to_string(), script]).unwrap();

        let (tx, rx) = unbounded();
        let frames = start_landmark_reader(output, tx).unwrap();
        assert_eq!(frames, 1);
        assert_eq!(rx.recv().unwrap(), None);
        assert!(detector.finish().is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_detector_without_ready_fails() {
        let result = DetectorProcess::spawn("sh", &["-c".to_string(), "echo hola".to_string()]);
        assert!(matches!(result, Err(SourceError::NotReady(ref got)) if got == "hola"));
    }

    #[cfg(unix)]
    #[test]
    fn test_detector_crash_is_an_error() {
        let (detector, output) =
            DetectorProcess::spawn("sh", &["-c".to_string(), "echo READY; exit 3".to_string()])
                .unwrap();

        // El lector sólo ve EOF
        let (tx, _rx) = unbounded();
        assert_eq!(start_landmark_reader(output, tx).unwrap(), 0);

        match detector.finish() {
            Err(SourceError::DetectorExited(status)) => assert_eq!(status.code(), Some(3)),
            other => panic!("resultado inesperado: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_dropped_detector_is_killed() {
        let (detector, mut output) =
            DetectorProcess::spawn("sh", &["-c".to_string(), "echo READY; exec sleep 30".to_string()])
                .unwrap();
        drop(detector);

        // Muerto el hijo, su stdout se cierra enseguida
        let mut rest = String::new();
        assert_eq!(output.read_to_string(&mut rest).unwrap(), 0);
    }

    #[test]
    fn test_missing_detector_binary_fails() {
        let result = DetectorProcess::spawn("/nonexistent/quirobrazo-detector", &[]);
        assert!(matches!(result, Err(SourceError::Spawn { .. })));
    }
}

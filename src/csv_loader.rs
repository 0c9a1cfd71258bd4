use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use anyhow::{anyhow, bail, ensure, Context, Result};
use csv::{ReaderBuilder, Writer};

use crate::types::{Detection, Landmark, LandmarkSet, NUM_LANDMARKS};

/// Carga una secuencia de detecciones desde un CSV en el formato
/// frame,landmark,x,y,z ordenado por frame y landmark.
/// Un índice de frame sin filas es un frame sin mano.
pub fn load_frames_from_csv(path: impl AsRef<Path>) -> Result<Vec<Detection>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("No se pudo abrir el CSV {:?}", path))?;

    let mut frames: BTreeMap<usize, [Option<Landmark>; NUM_LANDMARKS]> = BTreeMap::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record =
            result.with_context(|| format!("Fila {} inválida en {:?}", row_idx + 1, path))?;
        if record.len() < 5 {
            bail!("La fila {} no tiene 5 columnas", row_idx + 1);
        }

        let frame: usize = record[0]
            .trim()
            .parse()
            .with_context(|| format!("frame inválido en fila {}", row_idx + 1))?;
        let landmark: usize = record[1]
            .trim()
            .parse()
            .with_context(|| format!("landmark inválido en fila {}", row_idx + 1))?;

        if landmark >= NUM_LANDMARKS {
            bail!("Landmark {} fuera de rango (fila {})", landmark, row_idx + 1);
        }

        let x: f64 = record[2]
            .trim()
            .parse()
            .with_context(|| format!("x inválido en fila {}", row_idx + 1))?;
        let y: f64 = record[3]
            .trim()
            .parse()
            .with_context(|| format!("y inválido en fila {}", row_idx + 1))?;
        let z: f64 = record[4]
            .trim()
            .parse()
            .with_context(|| format!("z inválido en fila {}", row_idx + 1))?;

        let points = frames.entry(frame).or_insert([None; NUM_LANDMARKS]);
        points[landmark] = Some(Landmark::new(x, y, z));
    }

    let (&min_frame, _) = frames
        .iter()
        .next()
        .ok_or_else(|| anyhow!("El CSV {:?} no contiene datos", path))?;
    ensure!(
        min_frame == 0,
        "El CSV debe iniciar en frame=0 (encontrado frame={})",
        min_frame
    );
    let max_frame = frames.keys().next_back().copied().unwrap_or(0);

    let mut detections = Vec::with_capacity(max_frame + 1);
    for frame_idx in 0..=max_frame {
        let Some(points) = frames.get(&frame_idx) else {
            detections.push(None);
            continue;
        };

        let present: Vec<Landmark> = points.iter().flatten().copied().collect();
        ensure!(
            present.len() == NUM_LANDMARKS,
            "Frame {} incompleto: {} de {} landmarks",
            frame_idx,
            present.len(),
            NUM_LANDMARKS
        );
        detections.push(Some(LandmarkSet::from_slice(&present)?));
    }

    Ok(detections)
}

/// Graba el flujo de landmarks en el mismo formato que lee
/// `load_frames_from_csv`, para reproducirlo después con `replay_csv`.
pub struct LandmarkCsvWriter {
    writer: Writer<File>,
    next_frame: usize,
}

impl LandmarkCsvWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut writer = Writer::from_path(path)
            .with_context(|| format!("No se pudo crear el CSV {:?}", path))?;
        writer.write_record(["frame", "landmark", "x", "y", "z"])?;
        Ok(Self {
            writer,
            next_frame: 0,
        })
    }

    /// Escribe un frame; un frame sin mano no genera filas pero consume
    /// su índice
    pub fn write_detection(&mut self, detection: &Detection) -> Result<()> {
        let frame = self.next_frame;
        self.next_frame += 1;

        if let Some(hand) = detection {
            for (idx, lm) in hand.points().iter().enumerate() {
                self.writer.write_record(&[
                    frame.to_string(),
                    idx.to_string(),
                    lm.x.to_string(),
                    lm.y.to_string(),
                    lm.z.to_string(),
                ])?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

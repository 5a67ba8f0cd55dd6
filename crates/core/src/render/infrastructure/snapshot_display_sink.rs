use std::path::{Path, PathBuf};

use crate::render::compositor::ComposedFrame;
use crate::render::display_sink::{DisplayError, DisplaySink};

/// Writes composed frames to PNG files: whenever the displayed privacy state
/// changes and every `every_n` frames in between.
pub struct SnapshotDisplaySink {
    dir: PathBuf,
    every_n: u64,
    frames: u64,
    last_state: Option<bool>,
    written: Vec<PathBuf>,
}

impl SnapshotDisplaySink {
    /// Creates `dir` if needed. `every_n == 0` disables periodic snapshots.
    pub fn new(dir: &Path, every_n: u64) -> Result<Self, DisplayError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| DisplayError::Output(format!("{}: {e}", dir.display())))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            every_n,
            frames: 0,
            last_state: None,
            written: Vec::new(),
        })
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn write(&mut self, composed: &ComposedFrame) -> Result<(), DisplayError> {
        let frame = &composed.frame;
        let state = match composed.privacy_on {
            Some(true) => "on",
            Some(false) => "off",
            None => "pending",
        };
        let path = self
            .dir
            .join(format!("frame_{:08}_{state}.png", frame.sequence()));
        let img = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or_else(|| DisplayError::Output("frame is not RGB".into()))?;
        img.save(&path)
            .map_err(|e| DisplayError::Output(format!("{}: {e}", path.display())))?;
        log::debug!("Wrote snapshot {}", path.display());
        self.written.push(path);
        Ok(())
    }
}

impl DisplaySink for SnapshotDisplaySink {
    fn show(&mut self, composed: &ComposedFrame) -> Result<(), DisplayError> {
        self.frames += 1;
        let state_changed = composed.privacy_on != self.last_state;
        let periodic = self.every_n > 0 && self.frames % self.every_n == 0;
        self.last_state = composed.privacy_on;
        if state_changed || periodic {
            self.write(composed)?;
        }
        Ok(())
    }

    fn close(&mut self) {
        log::info!(
            "Wrote {} snapshot(s) to {}",
            self.written.len(),
            self.dir.display()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::solid_frame;

    fn composed(sequence: u64, on: Option<bool>) -> ComposedFrame {
        ComposedFrame {
            frame: solid_frame(4, 3, 90, sequence),
            obscured: on == Some(true),
            privacy_on: on,
            decision_sequence: on.map(|_| sequence),
            status: None,
        }
    }

    #[test]
    fn test_writes_on_state_change() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = SnapshotDisplaySink::new(dir.path(), 0).unwrap();

        sink.show(&composed(1, None)).unwrap();
        sink.show(&composed(2, Some(false))).unwrap();
        sink.show(&composed(3, Some(false))).unwrap();
        sink.show(&composed(4, Some(true))).unwrap();

        let names: Vec<String> = sink
            .written()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["frame_00000002_off.png", "frame_00000004_on.png"]
        );

        let img = image::open(&sink.written()[1]).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (4, 3));
        assert_eq!(img.get_pixel(0, 0).0, [90, 90, 90]);
    }

    #[test]
    fn test_writes_every_n_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = SnapshotDisplaySink::new(&dir.path().join("nested"), 3).unwrap();
        for seq in 1..=6 {
            sink.show(&composed(seq, None)).unwrap();
        }
        assert_eq!(sink.written().len(), 2);
        assert!(sink.written()[0].ends_with("frame_00000003_pending.png"));
    }
}

use std::path::PathBuf;

use crate::capture::domain::capture_device::{CaptureDevice, CaptureError, RawImage};
use crate::shared::constants::IMAGE_EXTENSIONS;

/// Replays a list of image files as if they were camera frames.
///
/// Each image is repeated for `hold` reads before moving to the next, and the
/// list loops forever. Images are decoded once, on `open`.
pub struct StillImageDevice {
    paths: Vec<PathBuf>,
    hold: u32,
    images: Vec<RawImage>,
    cursor: usize,
    reads_on_current: u32,
}

impl StillImageDevice {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            hold: 1,
            images: Vec::new(),
            cursor: 0,
            reads_on_current: 0,
        }
    }

    pub fn holding_each(mut self, reads: u32) -> Self {
        self.hold = reads.max(1);
        self
    }

    pub fn is_supported(path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
    }
}

impl CaptureDevice for StillImageDevice {
    fn open(&mut self) -> Result<(), CaptureError> {
        if self.paths.is_empty() {
            return Err(CaptureError::Device("no images to replay".into()));
        }
        let mut images = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            let img = image::open(path)
                .map_err(|e| CaptureError::Device(format!("{}: {e}", path.display())))?
                .to_rgb8();
            let (width, height) = img.dimensions();
            images.push(RawImage {
                data: img.into_raw(),
                width,
                height,
            });
        }
        self.images = images;
        self.cursor = 0;
        self.reads_on_current = 0;
        Ok(())
    }

    fn read(&mut self) -> Result<RawImage, CaptureError> {
        if self.images.is_empty() {
            return Err(CaptureError::Device("image replay is not open".into()));
        }
        let image = self.images[self.cursor].clone();
        self.reads_on_current += 1;
        if self.reads_on_current >= self.hold {
            self.reads_on_current = 0;
            self.cursor = (self.cursor + 1) % self.images.len();
        }
        Ok(image)
    }

    fn close(&mut self) {
        self.images.clear();
    }

    fn describe(&self) -> String {
        format!("{} replayed image(s)", self.paths.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write_png(dir: &Path, name: &str, value: u8) -> PathBuf {
        let path = dir.join(name);
        let img = image::RgbImage::from_pixel(6, 4, image::Rgb([value, value, value]));
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_cycles_through_images() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_png(dir.path(), "a.png", 10);
        let b = write_png(dir.path(), "b.png", 200);

        let mut device = StillImageDevice::new(vec![a, b]);
        device.open().unwrap();

        let values: Vec<u8> = (0..4).map(|_| device.read().unwrap().data[0]).collect();
        assert_eq!(values, vec![10, 200, 10, 200]);

        let first = device.read().unwrap();
        assert_eq!((first.width, first.height), (6, 4));
        assert_eq!(first.data.len(), 6 * 4 * 3);
    }

    #[test]
    fn test_hold_repeats_each_image() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_png(dir.path(), "a.png", 1);
        let b = write_png(dir.path(), "b.png", 2);

        let mut device = StillImageDevice::new(vec![a, b]).holding_each(2);
        device.open().unwrap();

        let values: Vec<u8> = (0..5).map(|_| device.read().unwrap().data[0]).collect();
        assert_eq!(values, vec![1, 1, 2, 2, 1]);
    }

    #[test]
    fn test_missing_file_fails_open() {
        let mut device = StillImageDevice::new(vec![PathBuf::from("/nonexistent/face.png")]);
        assert!(matches!(device.open(), Err(CaptureError::Device(_))));
    }

    #[test]
    fn test_empty_list_fails_open() {
        let mut device = StillImageDevice::new(vec![]);
        assert!(matches!(device.open(), Err(CaptureError::Device(_))));
    }

    #[test]
    fn test_read_after_close_is_device_error() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_png(dir.path(), "a.png", 1);
        let mut device = StillImageDevice::new(vec![a]);
        device.open().unwrap();
        device.close();
        assert!(matches!(device.read(), Err(CaptureError::Device(_))));
    }

    #[test]
    fn test_is_supported() {
        assert!(StillImageDevice::is_supported(Path::new("x.PNG")));
        assert!(StillImageDevice::is_supported(Path::new("x.jpeg")));
        assert!(!StillImageDevice::is_supported(Path::new("x.mp4")));
    }
}

use std::time::Instant;

use ndarray::ArrayView3;

use crate::shared::bounding_box::PixelRect;
use crate::shared::latest_slot::Sequenced;

/// A single captured camera frame: contiguous RGB bytes in row-major order.
///
/// Frames are immutable once published. Consumers receive them behind an
/// `Arc` and copy the pixels (`clone`) before applying any transform.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    sequence: u64,
    captured_at: Instant,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, sequence: u64) -> Self {
        Self::captured(data, width, height, channels, sequence, Instant::now())
    }

    pub fn captured(
        data: Vec<u8>,
        width: u32,
        height: u32,
        channels: u8,
        sequence: u64,
        captured_at: Instant,
    ) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            sequence,
            captured_at,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable pixels of an owned copy. Published frames are only reachable
    /// through `Arc<Frame>`, so this never touches a shared frame.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Nearest-neighbour resample to `width x height`, keeping sequence and
    /// capture time so downstream results still refer to the source frame.
    pub fn resized(&self, width: u32, height: u32) -> Frame {
        if width == self.width && height == self.height {
            return self.clone();
        }
        let src_w = self.width as usize;
        let src_h = self.height as usize;
        let dst_w = width as usize;
        let dst_h = height as usize;
        let ch = self.channels as usize;

        let mut out = vec![0u8; dst_w * dst_h * ch];
        if src_w > 0 && src_h > 0 {
            for y in 0..dst_h {
                let sy = (((y as f64 + 0.5) * src_h as f64 / dst_h as f64) as usize).min(src_h - 1);
                for x in 0..dst_w {
                    let sx =
                        (((x as f64 + 0.5) * src_w as f64 / dst_w as f64) as usize).min(src_w - 1);
                    let src = (sy * src_w + sx) * ch;
                    let dst = (y * dst_w + x) * ch;
                    out[dst..dst + ch].copy_from_slice(&self.data[src..src + ch]);
                }
            }
        }

        Frame::captured(
            out,
            width,
            height,
            self.channels,
            self.sequence,
            self.captured_at,
        )
    }

    /// Copies the pixels inside `rect` (clipped to the frame) into a new frame.
    pub fn crop(&self, rect: PixelRect) -> Frame {
        let rect = rect.clipped(self.width, self.height);
        let ch = self.channels as usize;
        let fw = self.width as usize;
        let (rx, ry, rw, rh) = (
            rect.x as usize,
            rect.y as usize,
            rect.width as usize,
            rect.height as usize,
        );

        let mut out = Vec::with_capacity(rw * rh * ch);
        for row in 0..rh {
            let start = ((ry + row) * fw + rx) * ch;
            out.extend_from_slice(&self.data[start..start + rw * ch]);
        }

        Frame::captured(
            out,
            rw as u32,
            rh as u32,
            self.channels,
            self.sequence,
            self.captured_at,
        )
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

impl Sequenced for Frame {
    fn sequence(&self) -> u64 {
        self.sequence
    }
}

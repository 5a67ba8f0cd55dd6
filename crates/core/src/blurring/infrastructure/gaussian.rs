/// Kernels larger than this are applied to a downscaled copy instead.
const DIRECT_KERNEL_LIMIT: usize = 50;

/// Precompute a 1D Gaussian kernel of the given size.
///
/// `kernel_size` must be odd and >= 1. Sigma is derived as `kernel_size / 6.0`
/// (matching OpenCV's sigma=0 convention).
pub fn gaussian_kernel_1d(kernel_size: usize) -> Vec<f32> {
    debug_assert!(kernel_size >= 1 && kernel_size % 2 == 1);
    let sigma = kernel_size as f64 / 6.0;
    let half = (kernel_size / 2) as f64;
    let weights: Vec<f64> = (0..kernel_size)
        .map(|i| {
            let x = i as f64 - half;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.iter().map(|&w| (w / sum) as f32).collect()
}

/// Reusable separable Gaussian blur for whole images.
///
/// Large kernels run on an image downscaled by `kernel_size / 50`, then the
/// result is upscaled bilinearly; visually indistinguishable at these
/// strengths and an order of magnitude cheaper.
pub struct GaussianBlur {
    kernel: Vec<f32>,
    scale: usize,
    small_kernel: Vec<f32>,
    temp: Vec<f32>,
}

impl GaussianBlur {
    pub fn new(kernel_size: usize) -> Self {
        let kernel_size = kernel_size.max(1) | 1;
        let scale = (kernel_size / DIRECT_KERNEL_LIMIT).max(1);
        Self {
            kernel: gaussian_kernel_1d(kernel_size),
            scale,
            small_kernel: gaussian_kernel_1d((kernel_size / scale) | 1),
            temp: Vec::new(),
        }
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel.len()
    }

    pub fn apply(&mut self, data: &mut [u8], width: usize, height: usize, channels: usize) {
        if self.scale <= 1 || width < self.scale * 2 || height < self.scale * 2 {
            blur_with_kernel(data, width, height, channels, &self.kernel, &mut self.temp);
            return;
        }
        let (mut small, sw, sh) = downscale(data, width, height, channels, self.scale);
        blur_with_kernel(&mut small, sw, sh, channels, &self.small_kernel, &mut self.temp);
        upscale_into(&small, sw, sh, channels, data, width, height);
    }
}

/// Horizontal pass into `temp`, vertical pass back into `data`, clamping at edges.
fn blur_with_kernel(
    data: &mut [u8],
    width: usize,
    height: usize,
    channels: usize,
    kernel: &[f32],
    temp: &mut Vec<f32>,
) {
    if kernel.len() <= 1 || width == 0 || height == 0 {
        return;
    }
    let half = (kernel.len() / 2) as isize;
    let stride = width * channels;
    temp.resize(stride * height, 0.0);

    for (src_row, dst_row) in data.chunks_exact(stride).zip(temp.chunks_exact_mut(stride)) {
        for x in 0..width {
            for c in 0..channels {
                let mut sum = 0.0f32;
                for (k, &w) in kernel.iter().enumerate() {
                    let sx = (x as isize + k as isize - half).clamp(0, width as isize - 1) as usize;
                    sum += src_row[sx * channels + c] as f32 * w;
                }
                dst_row[x * channels + c] = sum;
            }
        }
    }

    for y in 0..height {
        for i in 0..stride {
            let mut sum = 0.0f32;
            for (k, &w) in kernel.iter().enumerate() {
                let sy = (y as isize + k as isize - half).clamp(0, height as isize - 1) as usize;
                sum += temp[sy * stride + i] * w;
            }
            data[y * stride + i] = sum.round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Area-average downscale by an integer factor.
fn downscale(
    data: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    scale: usize,
) -> (Vec<u8>, usize, usize) {
    let new_w = width / scale;
    let new_h = height / scale;
    let mut out = vec![0u8; new_w * new_h * channels];
    let block = (scale * scale) as u32;

    for y in 0..new_h {
        for x in 0..new_w {
            for c in 0..channels {
                let mut sum = 0u32;
                for dy in 0..scale {
                    let row = (y * scale + dy) * width;
                    for dx in 0..scale {
                        sum += data[(row + x * scale + dx) * channels + c] as u32;
                    }
                }
                out[(y * new_w + x) * channels + c] = (sum / block) as u8;
            }
        }
    }

    (out, new_w, new_h)
}

/// Bilinear upscale of `src` into `dst` (`target_w x target_h`).
fn upscale_into(
    src: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    dst: &mut [u8],
    target_w: usize,
    target_h: usize,
) {
    let x_ratio = (width as f32 - 1.0) / (target_w as f32 - 1.0).max(1.0);
    let y_ratio = (height as f32 - 1.0) / (target_h as f32 - 1.0).max(1.0);

    for y in 0..target_h {
        let fy_src = y as f32 * y_ratio;
        let y0 = (fy_src.floor() as usize).min(height - 1);
        let y1 = (y0 + 1).min(height - 1);
        let fy = fy_src - y0 as f32;

        for x in 0..target_w {
            let fx_src = x as f32 * x_ratio;
            let x0 = (fx_src.floor() as usize).min(width - 1);
            let x1 = (x0 + 1).min(width - 1);
            let fx = fx_src - x0 as f32;

            for c in 0..channels {
                let at = |yy: usize, xx: usize| src[(yy * width + xx) * channels + c] as f32;
                let top = at(y0, x0) * (1.0 - fx) + at(y0, x1) * fx;
                let bottom = at(y1, x0) * (1.0 - fx) + at(y1, x1) * fx;
                let val = top * (1.0 - fy) + bottom * fy;
                dst[(y * target_w + x) * channels + c] = val.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_kernel_sums_to_one_and_is_symmetric() {
        let k = gaussian_kernel_1d(7);
        assert_relative_eq!(k.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        for i in 0..k.len() / 2 {
            assert_relative_eq!(k[i], k[k.len() - 1 - i], epsilon = 1e-6);
        }
        assert!(k.iter().all(|&v| v <= k[3]));
    }

    #[test]
    fn test_uniform_image_unchanged() {
        let mut data = vec![128u8; 10 * 10 * 3];
        GaussianBlur::new(5).apply(&mut data, 10, 10, 3);
        assert!(data.iter().all(|&v| (v as i32 - 128).abs() <= 1));
    }

    #[test]
    fn test_bright_pixel_spreads() {
        let mut data = vec![0u8; 10 * 10 * 3];
        let centre = (5 * 10 + 5) * 3;
        data[centre..centre + 3].fill(255);

        GaussianBlur::new(5).apply(&mut data, 10, 10, 3);

        assert!(data[centre] < 255);
        assert!(data[(5 * 10 + 6) * 3] > 0);
    }

    #[test]
    fn test_kernel_size_1_is_identity() {
        let mut data: Vec<u8> = (0..75).map(|v| v as u8).collect();
        let original = data.clone();
        GaussianBlur::new(1).apply(&mut data, 5, 5, 3);
        assert_eq!(data, original);
    }

    #[test]
    fn test_even_kernel_rounds_up() {
        assert_eq!(GaussianBlur::new(30).kernel_size(), 31);
    }

    #[test]
    fn test_large_kernel_uses_downscale_path() {
        // 8x8 checkerboard is flattened towards mid-grey
        let mut data = Vec::new();
        for y in 0..8 {
            for x in 0..8 {
                let v = if (x + y) % 2 == 0 { 255 } else { 0 };
                data.extend_from_slice(&[v, v, v]);
            }
        }
        GaussianBlur::new(101).apply(&mut data, 8, 8, 3);
        assert!(data.iter().all(|&v| (v as i32 - 128).abs() <= 16));
    }

    #[test]
    fn test_downscale_upscale_uniform() {
        let data = vec![100u8; 8 * 8 * 3];
        let (small, sw, sh) = downscale(&data, 8, 8, 3, 2);
        assert_eq!((sw, sh), (4, 4));
        let mut big = vec![0u8; 8 * 8 * 3];
        upscale_into(&small, sw, sh, 3, &mut big, 8, 8);
        assert!(big.iter().all(|&v| (v as i32 - 100).abs() <= 1));
    }
}

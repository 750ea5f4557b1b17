//! 帧质量指标：清晰度 / 信息熵 / 边缘密度

use super::frame::{Frame, FrameMetrics};
use image::GrayImage;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::path::Path;

/// 无状态的帧指标计算器
///
/// 读不出来的图片一律返回全零指标，帧本身保留在流水线中。
#[derive(Debug, Clone, Copy)]
pub struct FrameMetricsComputer {
    low_threshold: f64,
    high_threshold: f64,
}

impl FrameMetricsComputer {
    pub fn new() -> Self {
        Self {
            low_threshold: 100.0,
            high_threshold: 200.0,
        }
    }

    pub fn with_edge_thresholds(low: f64, high: f64) -> Self {
        Self {
            low_threshold: low.min(high),
            high_threshold: high.max(low),
        }
    }

    /// 从图片文件计算指标
    pub fn compute_path(&self, path: &Path) -> FrameMetrics {
        match image::open(path) {
            Ok(img) => self.compute(&img.to_luma8()),
            Err(e) => {
                warn!("⚠️ Unreadable frame {:?}, metrics set to zero: {}", path, e);
                FrameMetrics::zero()
            }
        }
    }

    pub fn compute(&self, gray: &GrayImage) -> FrameMetrics {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return FrameMetrics::zero();
        }

        let w = width as usize;
        let h = height as usize;
        let pixels = gray.as_raw();

        FrameMetrics {
            clarity: laplacian_variance(pixels, w, h),
            entropy: histogram_entropy(pixels),
            edge_density: self.edge_density(pixels, w, h),
        }
    }

    /// 并行计算整批帧的指标
    pub fn compute_batch(&self, frames: &mut [Frame]) {
        info!("📐 Computing metrics for {} frames", frames.len());
        frames.par_iter_mut().for_each(|frame| {
            let metrics = self.compute_path(&frame.path);
            debug!(
                "   {} clarity={:.2} entropy={:.3} edges={:.3}",
                frame.frame_id, metrics.clarity, metrics.entropy, metrics.edge_density
            );
            frame.metrics = Some(metrics);
        });
    }

    /// Canny 风格边缘检测：Sobel(L1) -> 非极大值抑制 -> 双阈值滞后连接
    fn edge_density(&self, pixels: &[u8], w: usize, h: usize) -> f64 {
        let total = w * h;
        let mut magnitude = vec![0f64; total];
        let mut direction = vec![0u8; total];

        for y in 0..h {
            for x in 0..w {
                let p = |dx: isize, dy: isize| -> f64 {
                    let sx = reflect(x as isize + dx, w);
                    let sy = reflect(y as isize + dy, h);
                    pixels[sy * w + sx] as f64
                };
                let gx = (p(1, -1) + 2.0 * p(1, 0) + p(1, 1))
                    - (p(-1, -1) + 2.0 * p(-1, 0) + p(-1, 1));
                let gy = (p(-1, 1) + 2.0 * p(0, 1) + p(1, 1))
                    - (p(-1, -1) + 2.0 * p(0, -1) + p(1, -1));

                let idx = y * w + x;
                magnitude[idx] = gx.abs() + gy.abs();
                direction[idx] = quantize_direction(gx, gy);
            }
        }

        // 0 = 非边缘, 1 = 弱边缘, 2 = 强边缘
        let mut marks = vec![0u8; total];
        let mut stack = Vec::new();

        for y in 0..h {
            for x in 0..w {
                let idx = y * w + x;
                let mag = magnitude[idx];
                if mag <= self.low_threshold {
                    continue;
                }

                let (dx, dy): (isize, isize) = match direction[idx] {
                    0 => (1, 0),
                    1 => (1, -1),
                    2 => (0, 1),
                    _ => (1, 1),
                };
                let neighbour = |sign: isize| -> f64 {
                    let nx = x as isize + dx * sign;
                    let ny = y as isize + dy * sign;
                    if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                        0.0
                    } else {
                        magnitude[ny as usize * w + nx as usize]
                    }
                };
                if mag < neighbour(1) || mag < neighbour(-1) {
                    continue;
                }

                if mag > self.high_threshold {
                    marks[idx] = 2;
                    stack.push(idx);
                } else {
                    marks[idx] = 1;
                }
            }
        }

        while let Some(idx) = stack.pop() {
            let x = (idx % w) as isize;
            let y = (idx / w) as isize;
            for ny in (y - 1)..=(y + 1) {
                for nx in (x - 1)..=(x + 1) {
                    if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                        continue;
                    }
                    let n = ny as usize * w + nx as usize;
                    if marks[n] == 1 {
                        marks[n] = 2;
                        stack.push(n);
                    }
                }
            }
        }

        let edges = marks.iter().filter(|&&m| m == 2).count();
        edges as f64 / total as f64
    }
}

impl Default for FrameMetricsComputer {
    fn default() -> Self {
        Self::new()
    }
}

/// 镜像边界（reflect-101），单像素图像退化为 0
fn reflect(i: isize, n: usize) -> usize {
    let n = n as isize;
    if n <= 1 {
        return 0;
    }
    let mut i = i;
    if i < 0 {
        i = -i;
    }
    if i >= n {
        i = 2 * n - 2 - i;
    }
    i.clamp(0, n - 1) as usize
}

fn quantize_direction(gx: f64, gy: f64) -> u8 {
    let angle = gy.atan2(gx).to_degrees();
    let angle = if angle < 0.0 { angle + 180.0 } else { angle };
    if !(22.5..157.5).contains(&angle) {
        0
    } else if angle < 67.5 {
        1
    } else if angle < 112.5 {
        2
    } else {
        3
    }
}

/// 4 邻域拉普拉斯响应的方差
fn laplacian_variance(pixels: &[u8], w: usize, h: usize) -> f64 {
    let total = (w * h) as f64;
    let mut sum = 0f64;
    let mut sum_sq = 0f64;

    for y in 0..h {
        for x in 0..w {
            let p = |dx: isize, dy: isize| -> f64 {
                let sx = reflect(x as isize + dx, w);
                let sy = reflect(y as isize + dy, h);
                pixels[sy * w + sx] as f64
            };
            let lap = p(0, -1) + p(-1, 0) + p(1, 0) + p(0, 1) - 4.0 * p(0, 0);
            sum += lap;
            sum_sq += lap * lap;
        }
    }

    let mean = sum / total;
    (sum_sq / total - mean * mean).max(0.0)
}

/// 256 bins 灰度直方图熵（自然对数）
fn histogram_entropy(pixels: &[u8]) -> f64 {
    if pixels.is_empty() {
        return 0.0;
    }

    let mut hist = [0u64; 256];
    for &val in pixels {
        hist[val as usize] += 1;
    }

    let total = pixels.len() as f64;
    hist.iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / total;
            -p * p.ln()
        })
        .sum::<f64>()
        .max(0.0)
}

//! 候选池生成：镜头中位帧 + 全局启发式 Top-N

use super::frame::{Frame, Scene};
use super::scene::SceneAssignment;
use log::{debug, info};
use std::collections::HashSet;

pub const CLARITY_WEIGHT: f64 = 0.5;
pub const ENTROPY_WEIGHT: f64 = 0.3;
pub const EDGE_WEIGHT: f64 = 0.2;

pub struct CandidateGenerator {
    k: usize,
    budget: usize,
}

impl CandidateGenerator {
    pub fn new(k: usize, budget: usize) -> Self {
        Self { k, budget }
    }

    /// 候选池上限：min(帧数, max(k, 2 × budget))
    pub fn pool_cap(&self, frame_count: usize) -> usize {
        frame_count.min(self.k.max(self.budget.saturating_mul(2)))
    }

    /// 在全部帧上做 min-max 归一化并写入 heuristic_score
    pub fn score(frames: &mut [Frame]) {
        let metrics: Vec<_> = frames.iter().map(Frame::metrics_or_zero).collect();
        let clarity = normalize(&metrics.iter().map(|m| m.clarity).collect::<Vec<_>>());
        let entropy = normalize(&metrics.iter().map(|m| m.entropy).collect::<Vec<_>>());
        let edges = normalize(&metrics.iter().map(|m| m.edge_density).collect::<Vec<_>>());

        for (i, frame) in frames.iter_mut().enumerate() {
            frame.heuristic_score =
                CLARITY_WEIGHT * clarity[i] + ENTROPY_WEIGHT * entropy[i] + EDGE_WEIGHT * edges[i];
        }
    }

    /// 返回候选帧下标（有序）：先每个镜头的中位帧，再按启发式分补齐
    ///
    /// 调用前需已完成 [`CandidateGenerator::score`] 和镜头归属。
    pub fn generate(
        &self,
        scenes: &[Scene],
        frames: &[Frame],
        assignment: &SceneAssignment,
    ) -> Vec<usize> {
        let cap = self.pool_cap(frames.len());
        let mut pool = Vec::with_capacity(cap);
        let mut seen = HashSet::new();

        for (scene_idx, scene) in scenes.iter().enumerate() {
            if pool.len() >= cap {
                break;
            }
            if let Some(idx) = median_frame(scene, frames, assignment.frames_in_scene(scene_idx)) {
                if seen.insert(idx) {
                    pool.push(idx);
                }
            }
        }
        let seeded = pool.len();

        let mut by_score: Vec<usize> = (0..frames.len()).collect();
        // 稳定排序，同分保持时间顺序
        by_score.sort_by(|&a, &b| {
            frames[b]
                .heuristic_score
                .total_cmp(&frames[a].heuristic_score)
        });

        for idx in by_score {
            if pool.len() >= cap {
                break;
            }
            if seen.insert(idx) {
                pool.push(idx);
            }
        }

        info!(
            "🎯 Candidate pool: {} frames ({} scene medians, cap {})",
            pool.len(),
            seeded,
            cap
        );
        pool
    }
}

/// 最接近镜头中点的帧；同距离取更早的帧，再同则取先出现的
fn median_frame(scene: &Scene, frames: &[Frame], members: &[usize]) -> Option<usize> {
    let mid = scene.midpoint();
    let picked = members.iter().copied().min_by(|&a, &b| {
        let da = (frames[a].timestamp - mid).abs();
        let db = (frames[b].timestamp - mid).abs();
        da.total_cmp(&db)
            .then(frames[a].timestamp.total_cmp(&frames[b].timestamp))
    });
    if let Some(idx) = picked {
        debug!(
            "   scene [{:.2}, {:.2}] median -> {}",
            scene.start, scene.end, frames[idx].frame_id
        );
    }
    picked
}

fn normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    if values.is_empty() || !span.is_finite() || span.abs() <= f64::EPSILON * max.abs().max(1.0) {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - min) / span).collect()
}

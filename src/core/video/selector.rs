//! 关键帧选择：镜头多样性优先的贪心选择

use super::frame::Frame;
use super::ranker::RankedPool;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 落选原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// 没有送给视觉模型（超出预算或不在候选池）
    NotSentToVlm,
    /// 送检了但分数不够
    LowerScore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedFrame {
    #[serde(flatten)]
    pub frame: Frame,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyframeSelection {
    /// 入选帧，按 final_score 降序
    pub chosen: Vec<Frame>,
    pub rejected: Vec<RejectedFrame>,
}

impl KeyframeSelection {
    pub fn chosen_paths(&self) -> Vec<String> {
        self.chosen.iter().map(Frame::path_string).collect()
    }
}

pub struct KeyframeSelector {
    k: usize,
}

impl KeyframeSelector {
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    /// 先在送检帧里选，不足 k 张时再从未送检的候选帧里补
    pub fn select(&self, ranked: RankedPool, outside_pool: Vec<Frame>) -> KeyframeSelection {
        let mut used_scenes = HashSet::new();

        let sent_picks = greedy_pick(&ranked.sent, self.k, &mut used_scenes);
        let remaining = self.k.saturating_sub(sent_picks.len());
        let held_picks = greedy_pick(&ranked.held_back, remaining, &mut used_scenes);

        let mut chosen = Vec::with_capacity(self.k);
        let mut rejected = Vec::new();

        partition(ranked.sent, &sent_picks, RejectReason::LowerScore, &mut chosen, &mut rejected);
        partition(
            ranked.held_back,
            &held_picks,
            RejectReason::NotSentToVlm,
            &mut chosen,
            &mut rejected,
        );
        rejected.extend(outside_pool.into_iter().map(|frame| RejectedFrame {
            frame,
            reason: RejectReason::NotSentToVlm,
        }));

        chosen.sort_by(|a, b| b.effective_score().total_cmp(&a.effective_score()));

        info!(
            "✅ Keyframes chosen: {} (k = {}), rejected: {}",
            chosen.len(),
            self.k,
            rejected.len()
        );
        KeyframeSelection { chosen, rejected }
    }
}

/// 两轮贪心：第一轮每个镜头最多一张，第二轮去掉镜头约束补齐
fn greedy_pick(candidates: &[Frame], limit: usize, used_scenes: &mut HashSet<usize>) -> Vec<usize> {
    let mut picks = Vec::new();
    if limit == 0 {
        return picks;
    }

    for (i, frame) in candidates.iter().enumerate() {
        if picks.len() >= limit {
            break;
        }
        if let Some(scene) = frame.scene_index {
            if used_scenes.insert(scene) {
                picks.push(i);
            }
        }
    }

    if picks.len() < limit {
        for i in 0..candidates.len() {
            if picks.len() >= limit {
                break;
            }
            if !picks.contains(&i) {
                if let Some(scene) = candidates[i].scene_index {
                    used_scenes.insert(scene);
                }
                picks.push(i);
            }
        }
    }
    picks
}

fn partition(
    frames: Vec<Frame>,
    picks: &[usize],
    reason: RejectReason,
    chosen: &mut Vec<Frame>,
    rejected: &mut Vec<RejectedFrame>,
) {
    for (i, frame) in frames.into_iter().enumerate() {
        if picks.contains(&i) {
            chosen.push(frame);
        } else {
            rejected.push(RejectedFrame { frame, reason });
        }
    }
}

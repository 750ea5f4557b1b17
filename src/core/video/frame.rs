use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 镜头区间（秒）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub start: f64,
    pub end: f64,
}

impl Scene {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// 未检测到切镜时使用的整段镜头
    pub fn full_duration(duration: f64) -> Self {
        Self {
            start: 0.0,
            end: duration.max(0.0),
        }
    }

    pub fn midpoint(&self) -> f64 {
        (self.start + self.end) / 2.0
    }

    pub fn contains(&self, timestamp: f64) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }

    pub fn is_valid(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start <= self.end
    }
}

/// 帧质量指标
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameMetrics {
    /// 拉普拉斯方差（清晰度）
    pub clarity: f64,
    /// 灰度直方图香农熵
    pub entropy: f64,
    /// 边缘像素占比 [0, 1]
    pub edge_density: f64,
}

impl FrameMetrics {
    pub fn zero() -> Self {
        Self::default()
    }
}

/// 视觉模型对单帧的轻量判断，所有字段都可能缺失
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualJudgment {
    /// 模型回传的图片引用，用于校验顺序
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub has_landmark: Option<bool>,
    #[serde(default)]
    pub has_readable_text: Option<bool>,
    #[serde(default)]
    pub representativeness: Option<f64>,
    #[serde(default)]
    pub brief: String,
}

impl VisualJudgment {
    /// 全空判断（未送检 / 调用失败 / 无法对齐）
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn visual_bonus(&self) -> f64 {
        let mut bonus = 0.0;
        if let Some(rep) = self.representativeness {
            if rep.is_finite() {
                bonus += 0.5 * rep;
            }
        }
        if self.has_landmark == Some(true) {
            bonus += 0.3;
        }
        if self.has_readable_text == Some(true) {
            bonus += 0.2;
        }
        bonus
    }
}

/// 抽帧得到的帧记录，随流水线逐步补充字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub frame_id: String,
    /// 秒
    pub timestamp: f64,
    pub path: PathBuf,
    #[serde(default)]
    pub metrics: Option<FrameMetrics>,
    #[serde(default)]
    pub scene_index: Option<usize>,
    #[serde(default)]
    pub heuristic_score: f64,
    #[serde(default)]
    pub vlm: Option<VisualJudgment>,
    #[serde(default)]
    pub final_score: Option<f64>,
    /// 视觉模型调用失败原因（调试用）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlm_error: Option<String>,
}

impl Frame {
    pub fn new(frame_id: impl Into<String>, timestamp: f64, path: impl Into<PathBuf>) -> Self {
        Self {
            frame_id: frame_id.into(),
            timestamp,
            path: path.into(),
            metrics: None,
            scene_index: None,
            heuristic_score: 0.0,
            vlm: None,
            final_score: None,
            vlm_error: None,
        }
    }

    /// 按 fps 抽帧的序号生成稳定 ID 与时间戳
    pub fn sampled(ordinal: usize, fps: f64, path: impl Into<PathBuf>) -> Self {
        let interval = if fps > 0.0 { 1.0 / fps } else { 1.0 };
        let timestamp = (ordinal as f64 * interval * 1000.0).round() / 1000.0;
        Self::new(format!("frame_{:05}", ordinal), timestamp, path)
    }

    pub fn metrics_or_zero(&self) -> FrameMetrics {
        self.metrics.unwrap_or_default()
    }

    pub fn path_string(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// final_score 未计算时退化为 0.6 × 启发式分
    pub fn effective_score(&self) -> f64 {
        self.final_score
            .unwrap_or(super::ranker::HEURISTIC_WEIGHT * self.heuristic_score)
    }
}

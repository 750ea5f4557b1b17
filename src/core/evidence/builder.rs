//! 证据构建：ASR 片段 + 入选帧视觉描述 -> 带置信度和稳定 ID 的证据

use super::model::{AsrSegment, Evidence, EvidencePayload, VisionRecord};
use crate::core::video::Frame;
use log::{debug, info};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// 费用 / 交通 / 营业时间相关的关键词
pub const ASR_KEYWORDS: &[&str] = &[
    "元", "¥", "门票", "地铁", "公交", "站", "酒店", "美食", "餐", "开放", "营业", "时间",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct EvidenceBuilder;

impl EvidenceBuilder {
    pub fn new() -> Self {
        Self
    }

    /// 相同输入总是得到相同的证据 ID 和置信度
    pub fn build(
        &self,
        asr_segments: &[AsrSegment],
        chosen: &[Frame],
        vision: &[VisionRecord],
    ) -> Vec<Evidence> {
        let mut evidences = Vec::with_capacity(asr_segments.len() + vision.len());

        for (idx, segment) in asr_segments.iter().enumerate() {
            let ordinal = idx + 1;
            let text = segment.text.trim().to_string();
            let keywords: Vec<String> = ASR_KEYWORDS
                .iter()
                .filter(|kw| text.contains(*kw))
                .map(|kw| kw.to_string())
                .collect();
            let confidence = asr_confidence(&text, keywords.len());
            let end = if segment.end.is_finite() { segment.end } else { segment.start };

            evidences.push(Evidence {
                id: evidence_id("asr", ordinal, &text),
                confidence,
                payload: EvidencePayload::Asr {
                    start: round3(segment.start),
                    end: round3(end),
                    text,
                    keywords,
                },
            });
        }

        let by_path: HashMap<String, &Frame> =
            chosen.iter().map(|f| (f.path_string(), f)).collect();

        for (idx, record) in vision.iter().enumerate() {
            let ordinal = idx + 1;
            let path = record.image_path.clone();
            let frame = path.as_deref().and_then(|p| by_path.get(p).copied());
            let judgment = frame.and_then(|f| f.vlm.as_ref());

            let representativeness = judgment.and_then(|j| j.representativeness);
            let has_landmark = judgment.and_then(|j| j.has_landmark);
            let has_text = judgment.and_then(|j| j.has_readable_text);

            if frame.is_none() {
                debug!("   vision record {:?} has no chosen frame", path);
            }

            evidences.push(Evidence {
                id: evidence_id("vision", ordinal, path.as_deref().unwrap_or_default()),
                confidence: vision_confidence(representativeness, has_landmark, has_text),
                payload: EvidencePayload::Vision {
                    frame_id: frame.map(|f| f.frame_id.clone()),
                    path,
                    representativeness,
                    has_landmark,
                    has_text,
                    place: record.place.clone(),
                    visible_text: record.visible_text.clone(),
                    activities: record.activities.clone(),
                    objects: record.objects.clone(),
                    mood: record.mood.clone(),
                },
            });
        }

        info!(
            "🧾 Built {} evidences ({} asr, {} vision)",
            evidences.len(),
            asr_segments.len(),
            vision.len()
        );
        evidences
    }
}

/// 0.35 保底，避免短句被直接归零
pub fn asr_confidence(text: &str, keyword_hits: usize) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }
    let length_score = (text.len() as f64 / 40.0).min(1.0);
    let keyword_score = (keyword_hits as f64 / 4.0).min(1.0);
    round3((0.35 + 0.45 * length_score + 0.2 * keyword_score).min(1.0))
}

pub fn vision_confidence(
    representativeness: Option<f64>,
    has_landmark: Option<bool>,
    has_text: Option<bool>,
) -> f64 {
    let rep = representativeness.filter(|r| r.is_finite()).unwrap_or(0.0).clamp(0.0, 1.0);
    let mut score = 0.55 * rep;
    if has_landmark == Some(true) {
        score += 0.25;
    }
    if has_text == Some(true) {
        score += 0.2;
    }
    round3(score.min(1.0))
}

/// `{type}_{序号:04}_{内容哈希前 8 位}`，内容为空时用序号代替哈希
fn evidence_id(kind: &str, ordinal: usize, content: &str) -> String {
    if content.is_empty() {
        return format!("{}_{:04}_{}", kind, ordinal, ordinal);
    }
    format!("{}_{:04}_{}", kind, ordinal, short_hash(content))
}

fn short_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    hex::encode(&digest[..4])
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

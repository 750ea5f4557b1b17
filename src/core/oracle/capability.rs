//! 流水线依赖的外部能力（语音识别 / 视觉模型 / 文本模型）

use super::error::OracleError;
use crate::core::evidence::{AsrSegment, FactBundle, RawFactSet, VisionRecord};
use crate::core::video::VisualJudgment;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 成稿：标题 + Markdown 正文
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub markdown: String,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> Result<Vec<AsrSegment>, OracleError>;
}

/// 批量轻量打分，结果按输入顺序返回
#[async_trait]
pub trait FrameRanker: Send + Sync {
    async fn rank_frames(
        &self,
        images: &[PathBuf],
        budget: usize,
    ) -> Result<Vec<VisualJudgment>, OracleError>;
}

#[async_trait]
pub trait FrameDescriber: Send + Sync {
    async fn describe_frame(&self, image: &Path) -> Result<VisionRecord, OracleError>;
}

#[async_trait]
pub trait FactExtractor: Send + Sync {
    async fn extract_facts(
        &self,
        asr: &[AsrSegment],
        vision: &[VisionRecord],
    ) -> Result<RawFactSet, OracleError>;
}

/// 只应使用 facts_strict 中的事实
#[async_trait]
pub trait PostWriter: Send + Sync {
    async fn write_post(&self, facts: &FactBundle) -> Result<Post, OracleError>;
}

//! 关键帧提取器

use crate::core::oracle::FrameRanker;
use crate::core::video::{
    Frame, KeyframePipeline, KeyframeSelection, Scene, SelectionConfig, VideoError,
};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

/// 关键帧提取器 - 启发式预筛 + 预算内视觉打分 + 镜头多样性
///
/// ```ignore
/// let extractor = KeyframeExtractor::create(SelectionConfig::default(), ranker)?;
/// let selection = extractor.select_from_paths(scenes, frame_paths, 1.0).await?;
/// ```
pub struct KeyframeExtractor {
    pipeline: KeyframePipeline,
}

impl KeyframeExtractor {
    pub fn create(
        config: SelectionConfig,
        ranker: Arc<dyn FrameRanker>,
    ) -> Result<Self, VideoError> {
        let pipeline = KeyframePipeline::new(config, ranker)?;
        info!(
            "🎬 KeyframeExtractor: created (k = {}, budget = {})",
            pipeline.config().k,
            pipeline.config().budget
        );
        Ok(Self { pipeline })
    }

    pub fn config(&self) -> &SelectionConfig {
        self.pipeline.config()
    }

    pub async fn select(
        &self,
        scenes: Vec<Scene>,
        frames: Vec<Frame>,
    ) -> Result<KeyframeSelection, VideoError> {
        self.pipeline.select(scenes, frames).await
    }

    /// 按 fps 抽出的帧图片，顺序即时间顺序
    pub async fn select_from_paths(
        &self,
        scenes: Vec<Scene>,
        frame_paths: Vec<PathBuf>,
        fps: f64,
    ) -> Result<KeyframeSelection, VideoError> {
        let frames = sampled_frames(frame_paths, fps);
        self.pipeline.select(scenes, frames).await
    }
}

impl Drop for KeyframeExtractor {
    fn drop(&mut self) {
        info!("🗑️ KeyframeExtractor: released");
    }
}

/// `frame_00000` 起编号，时间戳为 序号 / fps
pub fn sampled_frames(frame_paths: Vec<PathBuf>, fps: f64) -> Vec<Frame> {
    frame_paths
        .into_iter()
        .enumerate()
        .map(|(ordinal, path)| Frame::sampled(ordinal, fps, path))
        .collect()
}

//! 视频 -> 小红书旅行笔记 端到端流水线

use super::error::PipelineError;
use super::keyframes::sampled_frames;
use crate::core::evidence::{
    normalize_segments, AsrSegment, Evidence, EvidenceBuilder, FactBundle, FactGrounder, RawFactSet,
    VisionRecord,
};
use crate::core::oracle::{
    FactExtractor, FrameDescriber, FrameRanker, LlmCapabilities, Post, PostWriter, Transcriber,
};
use crate::core::video::{KeyframePipeline, KeyframeSelection, Scene, SelectionConfig, VideoError};
use log::{error, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 抽帧 / 切镜 / 抽音频（通常由 ffmpeg 一类的工具实现）
pub trait MediaSource: Send + Sync {
    /// 按 fps 抽出的帧图片，按时间排序
    fn sample_frames(&self, video: &Path, fps: f64) -> Result<Vec<PathBuf>, PipelineError>;

    fn detect_scenes(&self, video: &Path) -> Result<Vec<Scene>, PipelineError>;

    fn extract_audio(&self, video: &Path) -> Result<PathBuf, PipelineError>;
}

/// 流水线依赖的外部能力
#[derive(Clone)]
pub struct Collaborators {
    pub media: Arc<dyn MediaSource>,
    pub transcriber: Arc<dyn Transcriber>,
    pub ranker: Arc<dyn FrameRanker>,
    pub describer: Arc<dyn FrameDescriber>,
    pub extractor: Arc<dyn FactExtractor>,
    pub writer: Arc<dyn PostWriter>,
}

impl Collaborators {
    /// 视觉 / 抽取 / 成稿都走同一个模型后端
    pub fn with_llm(
        media: Arc<dyn MediaSource>,
        transcriber: Arc<dyn Transcriber>,
        llm: Arc<LlmCapabilities>,
    ) -> Self {
        Self {
            media,
            transcriber,
            ranker: llm.clone(),
            describer: llm.clone(),
            extractor: llm.clone(),
            writer: llm,
        }
    }
}

/// 每一步的中间产物
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub transcript: Vec<AsrSegment>,
    pub scenes: Vec<Scene>,
    pub selection: KeyframeSelection,
    pub vision: Vec<VisionRecord>,
    pub raw_facts: RawFactSet,
    pub evidence: Vec<Evidence>,
    pub facts: FactBundle,
    pub post: Post,
}

pub struct TravelPostPipeline {
    parts: Collaborators,
    keyframes: KeyframePipeline,
    evidence: EvidenceBuilder,
    fps: f64,
}

impl TravelPostPipeline {
    pub const DEFAULT_FPS: f64 = 1.0;

    pub fn new(parts: Collaborators, config: SelectionConfig) -> Result<Self, PipelineError> {
        let keyframes = KeyframePipeline::new(config, parts.ranker.clone())?;
        info!("📝 TravelPostPipeline: created");
        Ok(Self {
            parts,
            keyframes,
            evidence: EvidenceBuilder::new(),
            fps: Self::DEFAULT_FPS,
        })
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        if fps > 0.0 && fps.is_finite() {
            self.fps = fps;
        } else {
            warn!("⚠️ Ignoring invalid fps {}", fps);
        }
        self
    }

    pub async fn run(&self, video: &Path) -> Result<PipelineOutput, PipelineError> {
        info!("🎬 Processing {}", video.display());

        let frame_paths = self.parts.media.sample_frames(video, self.fps)?;
        let frames = sampled_frames(frame_paths, self.fps);
        let last_ts = frames.last().map(|f| f.timestamp).ok_or(VideoError::NoFrames)?;

        let mut scenes = self.parts.media.detect_scenes(video)?;
        if scenes.is_empty() {
            scenes.push(Scene::full_duration(last_ts));
        }

        let audio = self.parts.media.extract_audio(video)?;
        let transcript = normalize_segments(self.parts.transcriber.transcribe(&audio).await?);
        info!("🎙️ Transcript: {} segments", transcript.len());

        let selection = self.keyframes.select(scenes.clone(), frames).await?;
        let vision = self.describe(&selection).await;

        let raw_facts = self.parts.extractor.extract_facts(&transcript, &vision).await?;
        let evidence = self.evidence.build(&transcript, &selection.chosen, &vision);
        let facts = FactGrounder::new(&evidence).ground(&raw_facts);
        let post = self.parts.writer.write_post(&facts).await?;

        info!("✅ Post ready: {}", post.title);
        Ok(PipelineOutput {
            transcript,
            scenes,
            selection,
            vision,
            raw_facts,
            evidence,
            facts,
            post,
        })
    }

    /// 逐帧描述入选帧，单帧失败只跳过该帧
    async fn describe(&self, selection: &KeyframeSelection) -> Vec<VisionRecord> {
        let mut records = Vec::with_capacity(selection.chosen.len());
        for frame in &selection.chosen {
            match self.parts.describer.describe_frame(&frame.path).await {
                Ok(record) => records.push(record),
                Err(e) => error!("❌ Failed to describe {}: {}", frame.frame_id, e),
            }
        }
        info!("🖼️ Described {}/{} keyframes", records.len(), selection.chosen.len());
        records
    }
}

impl Drop for TravelPostPipeline {
    fn drop(&mut self) {
        info!("🗑️ TravelPostPipeline: released");
    }
}

use super::candidate::CandidateGenerator;
use super::error::VideoError;
use super::frame::{Frame, Scene};
use super::metrics::FrameMetricsComputer;
use super::ranker::BudgetedVisualRanker;
use super::scene::SceneIndexer;
use super::selector::{KeyframeSelection, KeyframeSelector};
use crate::core::oracle::FrameRanker;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionConfig {
    /// 最终关键帧数量
    pub k: usize,
    /// 最多送给视觉模型的帧数
    pub budget: usize,
    pub oracle_timeout: Duration,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            k: 9,
            budget: 15,
            oracle_timeout: Duration::from_secs(45),
        }
    }
}

impl SelectionConfig {
    /// 命中缓存较少时节省视觉调用
    pub fn economy() -> Self {
        Self {
            budget: 5,
            ..Default::default()
        }
    }

    /// 不调用视觉模型，只用启发式分
    pub fn heuristic_only() -> Self {
        Self {
            budget: 0,
            ..Default::default()
        }
    }

    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = budget;
        self
    }

    pub fn validate(&self) -> Result<(), VideoError> {
        if self.k == 0 {
            return Err(VideoError::InvalidConfig("k must be greater than 0".into()));
        }
        if self.oracle_timeout.is_zero() {
            return Err(VideoError::InvalidConfig("oracle_timeout must be non-zero".into()));
        }
        Ok(())
    }
}

pub struct KeyframePipeline {
    config: SelectionConfig,
    metrics: FrameMetricsComputer,
    ranker: BudgetedVisualRanker,
}

impl KeyframePipeline {
    pub fn new(config: SelectionConfig, ranker: Arc<dyn FrameRanker>) -> Result<Self, VideoError> {
        config.validate()?;
        let ranker = BudgetedVisualRanker::new(ranker, config.budget, config.oracle_timeout);
        Ok(Self {
            config,
            metrics: FrameMetricsComputer::new(),
            ranker,
        })
    }

    pub fn with_metrics(mut self, metrics: FrameMetricsComputer) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// 镜头 + 抽帧 -> 入选 / 落选
    ///
    /// 已带 metrics 的帧不会重复计算。
    pub async fn select(
        &self,
        scenes: Vec<Scene>,
        mut frames: Vec<Frame>,
    ) -> Result<KeyframeSelection, VideoError> {
        if frames.is_empty() {
            return Err(VideoError::NoFrames);
        }
        frames.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        let scenes = prepare_scenes(scenes, &frames)?;

        info!(
            "🎬 Selecting keyframes: {} frames, {} scenes, k = {}, budget = {}",
            frames.len(),
            scenes.len(),
            self.config.k,
            self.config.budget
        );

        let needs_metrics = frames.iter().any(|f| f.metrics.is_none());
        if needs_metrics {
            let (pending, ready): (Vec<Frame>, Vec<Frame>) =
                frames.into_iter().partition(|f| f.metrics.is_none());
            let pending = self.compute_metrics(pending).await?;
            frames = pending.into_iter().chain(ready).collect();
            frames.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        }

        let assignment = SceneIndexer::assign(&scenes, &mut frames);
        CandidateGenerator::score(&mut frames);
        let pool_indices = CandidateGenerator::new(self.config.k, self.config.budget)
            .generate(&scenes, &frames, &assignment);

        let mut slots: Vec<Option<Frame>> = frames.into_iter().map(Some).collect();
        let pool: Vec<Frame> = pool_indices.iter().filter_map(|&i| slots[i].take()).collect();
        let outside: Vec<Frame> = slots.into_iter().flatten().collect();

        let ranked = self.ranker.rank(pool).await;
        Ok(KeyframeSelector::new(self.config.k).select(ranked, outside))
    }

    /// 图像计算放到阻塞线程池，不占用 async worker
    async fn compute_metrics(&self, mut frames: Vec<Frame>) -> Result<Vec<Frame>, VideoError> {
        let metrics = self.metrics;
        tokio::task::spawn_blocking(move || {
            metrics.compute_batch(&mut frames);
            frames
        })
        .await
        .map_err(|e| VideoError::MetricsWorker(e.to_string()))
    }
}

/// 过滤非法镜头并按起点排序；一个镜头都没有时退化为整段视频
fn prepare_scenes(scenes: Vec<Scene>, frames: &[Frame]) -> Result<Vec<Scene>, VideoError> {
    if scenes.is_empty() {
        let last_ts = frames.last().map(|f| f.timestamp).unwrap_or(0.0);
        warn!("⚠️ No scene cuts detected, using a single scene [0, {:.2}]", last_ts);
        return Ok(vec![Scene::full_duration(last_ts)]);
    }

    let total = scenes.len();
    let mut valid: Vec<Scene> = scenes.into_iter().filter(Scene::is_valid).collect();
    if valid.is_empty() {
        return Err(VideoError::NoScenes);
    }
    if valid.len() < total {
        warn!("⚠️ Dropped {} invalid scenes", total - valid.len());
    }
    valid.sort_by(|a, b| a.start.total_cmp(&b.start));
    Ok(valid)
}

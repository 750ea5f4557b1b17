//! 关键帧选择引擎
//!
//! 流程：
//! 1. 帧指标 - 清晰度 / 熵 / 边缘密度
//! 2. 镜头归属 - 单次扫描把帧挂到镜头
//! 3. 候选池 - 镜头中位帧 + 启发式 Top-N
//! 4. 视觉打分 - 预算内调用视觉模型，失败退化为启发式分
//! 5. 多样性选择 - 每个镜头优先一张，再补齐到 k 张

pub mod candidate;
pub mod error;
pub mod frame;
pub mod metrics;
pub mod pipeline;
pub mod ranker;
pub mod scene;
pub mod selector;

pub use candidate::CandidateGenerator;
pub use error::VideoError;
pub use frame::{Frame, FrameMetrics, Scene, VisualJudgment};
pub use metrics::FrameMetricsComputer;
pub use pipeline::{KeyframePipeline, SelectionConfig};
pub use ranker::{BudgetedVisualRanker, RankedPool, HEURISTIC_WEIGHT};
pub use scene::{SceneAssignment, SceneIndexer};
pub use selector::{KeyframeSelection, KeyframeSelector, RejectReason, RejectedFrame};

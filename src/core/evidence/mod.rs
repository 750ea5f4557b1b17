//! 证据与事实落地
//!
//! ASR 片段和入选帧的视觉描述被转换成可溯源的证据；抽取器给出的事实
//! 必须在证据原文中逐字出现才会进入 strict / weak，否则一律归为 missing。

pub mod builder;
pub mod facts;
pub mod grounding;
pub mod model;
pub mod transcript;

pub use builder::{EvidenceBuilder, ASR_KEYWORDS};
pub use facts::{FactBundle, FactField, FactValue, GroundedFacts, RawFactSet};
pub use grounding::{FactGrounder, Support, Tier, STRICT_THRESHOLD, WEAK_THRESHOLD};
pub use model::{AsrSegment, Evidence, EvidenceKind, EvidencePayload, VisionRecord};
pub use transcript::{normalize_segments, normalize_transcript_text};

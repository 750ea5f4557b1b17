pub mod error;
pub mod keyframes;
pub mod post;

pub use error::PipelineError;
pub use keyframes::{sampled_frames, KeyframeExtractor};
pub use post::{Collaborators, MediaSource, PipelineOutput, TravelPostPipeline};

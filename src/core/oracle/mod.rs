//! 外部模型能力
//!
//! 流水线只依赖 `capability` 中的 trait；`LlmCapabilities` 用一个
//! chat-completions 后端实现其中四种，`CachedOracle` 为后端加上磁盘缓存、
//! 同指纹请求合并和并发上限。

pub mod cache;
pub mod capability;
pub mod client;
pub mod completion;
pub mod error;
pub mod llm;
pub mod parse;

#[cfg(test)]
pub mod mock;

pub use cache::CachedOracle;
pub use capability::{FactExtractor, FrameDescriber, FrameRanker, Post, PostWriter, Transcriber};
pub use client::{HttpCompletionOracle, OracleConfig};
pub use completion::{CompletionOracle, CompletionRequest};
pub use error::OracleError;
pub use llm::{image_data_url, LlmCapabilities};

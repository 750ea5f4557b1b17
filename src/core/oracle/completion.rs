//! OpenAI 兼容的 chat-completions 请求抽象

use super::error::OracleError;
use async_trait::async_trait;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Value>,
    pub temperature: f64,
    /// 不参与指纹
    pub timeout: Duration,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, temperature: f64, timeout: Duration) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature,
            timeout,
        }
    }

    pub fn system(mut self, text: impl Into<String>) -> Self {
        self.messages.push(json!({"role": "system", "content": text.into()}));
        self
    }

    /// 用户消息，内容为 text / image_url 分片
    pub fn user(mut self, parts: Vec<Value>) -> Self {
        self.messages.push(json!({"role": "user", "content": parts}));
        self
    }

    pub fn text_part(text: impl Into<String>) -> Value {
        json!({"type": "text", "text": text.into()})
    }

    pub fn image_part(data_url: impl Into<String>) -> Value {
        json!({"type": "image_url", "image_url": {"url": data_url.into()}})
    }

    /// 请求体（model / messages / temperature）
    pub fn body(&self) -> Value {
        json!({
            "model": self.model,
            "messages": self.messages,
            "temperature": self.temperature,
        })
    }

    /// 请求体规范 JSON 的 SHA-256，作为缓存键
    ///
    /// serde_json 的 Map 按键排序，同一请求的序列化结果稳定。
    pub fn fingerprint(&self) -> String {
        let canonical = self.body().to_string();
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }
}

#[async_trait]
pub trait CompletionOracle: Send + Sync {
    /// 返回上游的原始 JSON 响应
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, OracleError>;
}

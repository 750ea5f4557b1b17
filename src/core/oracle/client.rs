use super::completion::{CompletionOracle, CompletionRequest};
use super::error::OracleError;
use async_trait::async_trait;
use log::{info, warn};
use serde_json::Value;
use std::path::PathBuf;
use std::time::{Duration, Instant};

pub const DEFAULT_API_URL: &str = "https://api.iflow.cn/v1/chat/completions";
pub const DEFAULT_VISION_MODEL: &str = "qwen3-vl-plus";
pub const DEFAULT_TEXT_MODEL: &str = "qwen3-max";

/// 上游模型服务配置
#[derive(Debug, Clone, PartialEq)]
pub struct OracleConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub vision_model: String,
    pub fact_model: String,
    pub writer_model: String,
    /// 同时在途的上游请求上限
    pub max_workers: usize,
    pub cache_dir: PathBuf,
    pub timeout: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            fact_model: DEFAULT_TEXT_MODEL.to_string(),
            writer_model: DEFAULT_TEXT_MODEL.to_string(),
            max_workers: num_cpus::get().clamp(1, 4),
            cache_dir: PathBuf::from(".cache"),
            timeout: Duration::from_secs(120),
        }
    }
}

impl OracleConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 读取配置，`lookup` 返回 None 或空串时使用默认值
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let max_workers = match get("IFLOW_MAX_WORKERS").map(|v| v.parse::<usize>()) {
            Some(Ok(n)) => n.max(1),
            Some(Err(e)) => {
                warn!("⚠️ Invalid IFLOW_MAX_WORKERS ({}), using {}", e, defaults.max_workers);
                defaults.max_workers
            }
            None => defaults.max_workers,
        };
        let timeout = match get("IFLOW_TIMEOUT_SECS").map(|v| v.parse::<u64>()) {
            Some(Ok(secs)) if secs > 0 => Duration::from_secs(secs),
            Some(_) => {
                warn!("⚠️ Invalid IFLOW_TIMEOUT_SECS, using {:?}", defaults.timeout);
                defaults.timeout
            }
            None => defaults.timeout,
        };

        Self {
            api_url: get("IFLOW_API_URL").unwrap_or(defaults.api_url),
            api_key: get("IFLOW_API_KEY"),
            vision_model: get("IFLOW_MODEL_VISION").unwrap_or(defaults.vision_model),
            fact_model: get("IFLOW_MODEL_FACT").unwrap_or(defaults.fact_model),
            writer_model: get("IFLOW_MODEL_WRITER").unwrap_or(defaults.writer_model),
            max_workers,
            cache_dir: get("IFLOW_CACHE_DIR").map(PathBuf::from).unwrap_or(defaults.cache_dir),
            timeout,
        }
    }
}

/// chat-completions HTTP 客户端
pub struct HttpCompletionOracle {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl HttpCompletionOracle {
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl CompletionOracle for HttpCompletionOracle {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, OracleError> {
        let api_key = self.api_key.as_deref().ok_or(OracleError::MissingApiKey)?;
        let started = Instant::now();
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&request.body())
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout(request.timeout)
                } else {
                    OracleError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("⚠️ Completion failed: model={} status={}", request.model, status.as_u16());
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let data: Value = response.json().await?;
        info!(
            "🌐 Completion ok: model={} status={} {:.2}s",
            request.model,
            status.as_u16(),
            started.elapsed().as_secs_f64()
        );
        Ok(data)
    }
}

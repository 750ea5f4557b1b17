//! 基于 chat-completions 的视觉打分 / 帧描述 / 事实抽取 / 成稿

use super::cache::CachedOracle;
use super::capability::{FactExtractor, FrameDescriber, FrameRanker, Post, PostWriter};
use super::client::{HttpCompletionOracle, OracleConfig};
use super::completion::{CompletionOracle, CompletionRequest};
use super::error::OracleError;
use super::parse::{message_text, parse_json_lenient, vision_record, visual_judgments};
use crate::core::evidence::{AsrSegment, FactBundle, RawFactSet, VisionRecord};
use crate::core::video::VisualJudgment;
use async_trait::async_trait;
use base64::Engine;
use log::{info, warn};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const RANK_PROMPT: &str = "你在为旅行视频挑选封面和配图。逐张判断图片：是否有地标 (has_landmark)、\
是否有可读文字 (has_readable_text)、能否代表这段旅程 (representativeness, 0 到 1)，并用一句话概括 (brief)。\
只输出 JSON：{\"frames\": [{\"index\": 图片序号, \"has_landmark\": bool, \"has_readable_text\": bool, \
\"representativeness\": number, \"brief\": string}]}";

const DESCRIBE_PROMPT: &str = "你在逐帧分析旅行视频。识别图片中的地点、活动、物体、氛围和可读文字。\
只输出 JSON，键为 place, activities, objects, mood, visible_text；activities 和 objects 为字符串数组。\
看不出来的字段留空，不要猜测。";

const FACT_PROMPT: &str = "你是旅行视频的信息抽取助手。根据语音转写 (asr) 和画面识别 (visual) 输出一个 JSON 对象，键如下：\n\
- 地点: string\n\
- 费用: string（有金额时保留币种）\n\
- 玩法: string 数组\n\
- 交通: string\n\
- 时间: string\n\
- 注意事项: string 数组\n\
- 标签: string 数组\n\
- missing: 无法从材料中确定的字段名数组\n\
每个字段都必须出现。材料中没有的信息填 \"未知\" 或空数组，不要编造。只输出合法 JSON。";

const WRITER_PROMPT: &str = "你是小红书旅行博主。根据给定的事实写一篇笔记：吸引人的标题，Markdown 正文，\
口语化、分段、适量 emoji。只能使用 facts 中的信息；missing 中列出的内容不要提及，更不能编造。\
只输出 JSON：{\"title\": string, \"markdown\": string}";

/// 图片文件转 base64 data URL
pub fn image_data_url(path: &Path) -> Result<String, OracleError> {
    let bytes = std::fs::read(path)?;
    let mime = match path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()) {
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "bmp" => "image/bmp",
        _ => "image/jpeg",
    };
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:{};base64,{}", mime, encoded))
}

/// 基于同一个 completion 后端的四种模型能力
pub struct LlmCapabilities {
    oracle: Arc<dyn CompletionOracle>,
    vision_model: String,
    fact_model: String,
    writer_model: String,
    timeout: Duration,
}

impl LlmCapabilities {
    pub fn new(oracle: Arc<dyn CompletionOracle>, config: &OracleConfig) -> Self {
        Self {
            oracle,
            vision_model: config.vision_model.clone(),
            fact_model: config.fact_model.clone(),
            writer_model: config.writer_model.clone(),
            timeout: config.timeout,
        }
    }

    /// HTTP 客户端 + 磁盘缓存
    pub fn from_config(config: &OracleConfig) -> Result<Self, OracleError> {
        let http = HttpCompletionOracle::new(config)?;
        let cached = CachedOracle::new(http, config.cache_dir.clone(), config.max_workers);
        Ok(Self::new(Arc::new(cached), config))
    }

    pub fn from_env() -> Result<Self, OracleError> {
        Self::from_config(&OracleConfig::from_env())
    }

    async fn ask_json(&self, request: CompletionRequest) -> Result<Value, OracleError> {
        let response = self.oracle.complete(&request).await?;
        let text = message_text(&response)?;
        parse_json_lenient(&text)
    }
}

#[async_trait]
impl FrameRanker for LlmCapabilities {
    async fn rank_frames(
        &self,
        images: &[PathBuf],
        budget: usize,
    ) -> Result<Vec<VisualJudgment>, OracleError> {
        let images = &images[..budget.min(images.len())];
        if images.is_empty() {
            return Ok(Vec::new());
        }

        let mut parts = vec![CompletionRequest::text_part(format!(
            "共 {} 张图片，按顺序编号 1 到 {}。",
            images.len(),
            images.len()
        ))];
        for (idx, path) in images.iter().enumerate() {
            parts.push(CompletionRequest::text_part(format!("图片 {}", idx + 1)));
            parts.push(CompletionRequest::image_part(image_data_url(path)?));
        }

        let request = CompletionRequest::new(&self.vision_model, 0.2, self.timeout)
            .system(RANK_PROMPT)
            .user(parts);
        let value = self.ask_json(request).await?;
        let judgments = visual_judgments(&value, images);
        info!("🏷️ Visual ranker judged {}/{} frames", judgments.len(), images.len());
        Ok(judgments)
    }
}

#[async_trait]
impl FrameDescriber for LlmCapabilities {
    async fn describe_frame(&self, image: &Path) -> Result<VisionRecord, OracleError> {
        let request = CompletionRequest::new(&self.vision_model, 0.2, self.timeout)
            .system(DESCRIBE_PROMPT)
            .user(vec![
                CompletionRequest::text_part("分析这张图片。"),
                CompletionRequest::image_part(image_data_url(image)?),
            ]);

        let path = image.to_string_lossy();
        let value = self.ask_json(request).await?;
        Ok(vision_record(&value, &path))
    }
}

#[async_trait]
impl FactExtractor for LlmCapabilities {
    async fn extract_facts(
        &self,
        asr: &[AsrSegment],
        vision: &[VisionRecord],
    ) -> Result<RawFactSet, OracleError> {
        let material = json!({ "asr": asr, "visual": vision }).to_string();
        let request = CompletionRequest::new(&self.fact_model, 0.2, self.timeout)
            .system(FACT_PROMPT)
            .user(vec![CompletionRequest::text_part(material)]);

        let value = match self.ask_json(request).await {
            Ok(value) => value,
            Err(e @ (OracleError::Malformed(_) | OracleError::EmptyResponse)) => {
                warn!("⚠️ Fact extractor output unusable, treating all fields as unknown: {}", e);
                return Ok(RawFactSet::unknown());
            }
            Err(e) => return Err(e),
        };

        let mut facts = serde_json::from_value::<RawFactSet>(value).unwrap_or_else(|e| {
            warn!("⚠️ Fact extractor returned unexpected shape: {}", e);
            RawFactSet::unknown()
        });
        facts.fill_placeholders();
        Ok(facts)
    }
}

#[async_trait]
impl PostWriter for LlmCapabilities {
    async fn write_post(&self, facts: &FactBundle) -> Result<Post, OracleError> {
        // 只给 strict 事实和缺失字段
        let material = json!({
            "facts": facts.facts_strict.values,
            "missing": facts.missing,
        })
        .to_string();
        let request = CompletionRequest::new(&self.writer_model, 0.6, self.timeout)
            .system(WRITER_PROMPT)
            .user(vec![CompletionRequest::text_part(material)]);

        let post: Post = serde_json::from_value(self.ask_json(request).await?)?;
        if post.title.trim().is_empty() && post.markdown.trim().is_empty() {
            return Err(OracleError::Malformed("post has neither title nor markdown".into()));
        }
        info!("✍️ Post written: {}", post.title);
        Ok(post)
    }
}

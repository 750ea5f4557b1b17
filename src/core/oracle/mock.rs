//! 测试用的确定性 oracle

use super::capability::{FactExtractor, FrameDescriber, FrameRanker, Post, PostWriter, Transcriber};
use super::completion::{CompletionOracle, CompletionRequest};
use super::error::OracleError;
use crate::core::evidence::{AsrSegment, FactBundle, FactField, RawFactSet, VisionRecord};
use crate::core::video::VisualJudgment;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// chat-completions 形状的响应
pub fn chat_response(content: &str) -> Value {
    json!({"choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]})
}

/// 按顺序返回预置响应，并记录收到的请求
pub struct ScriptedOracle {
    responses: Mutex<VecDeque<Value>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedOracle {
    pub fn new(responses: Vec<Value>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionOracle for ScriptedOracle {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, OracleError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses.lock().unwrap().pop_front().ok_or(OracleError::EmptyResponse)
    }
}

enum RankBehavior {
    Uniform(VisualJudgment),
    Judgments(Vec<VisualJudgment>),
    Failing,
}

pub struct MockFrameRanker {
    behavior: RankBehavior,
    delay: Option<Duration>,
    submitted: Mutex<Vec<usize>>,
}

impl MockFrameRanker {
    fn with_behavior(behavior: RankBehavior) -> Self {
        Self {
            behavior,
            delay: None,
            submitted: Mutex::new(Vec::new()),
        }
    }

    /// 每张图都给同样的判断
    pub fn uniform(judgment: VisualJudgment) -> Self {
        Self::with_behavior(RankBehavior::Uniform(judgment))
    }

    /// 原样返回给定的判断列表
    pub fn with_judgments(judgments: Vec<VisualJudgment>) -> Self {
        Self::with_behavior(RankBehavior::Judgments(judgments))
    }

    pub fn failing() -> Self {
        Self::with_behavior(RankBehavior::Failing)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 每次调用收到的图片数
    pub fn submitted(&self) -> Vec<usize> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl FrameRanker for MockFrameRanker {
    async fn rank_frames(
        &self,
        images: &[PathBuf],
        _budget: usize,
    ) -> Result<Vec<VisualJudgment>, OracleError> {
        self.submitted.lock().unwrap().push(images.len());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.behavior {
            RankBehavior::Uniform(judgment) => Ok(vec![judgment.clone(); images.len()]),
            RankBehavior::Judgments(judgments) => Ok(judgments.clone()),
            RankBehavior::Failing => Err(OracleError::Malformed("mock ranker failure".into())),
        }
    }
}

pub struct MockTranscriber {
    segments: Option<Vec<AsrSegment>>,
}

impl MockTranscriber {
    pub fn new(segments: Vec<AsrSegment>) -> Self {
        Self { segments: Some(segments) }
    }

    pub fn failing() -> Self {
        Self { segments: None }
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, _audio: &Path) -> Result<Vec<AsrSegment>, OracleError> {
        self.segments.clone().ok_or(OracleError::EmptyResponse)
    }
}

/// 按文件名返回描述；`failing` 中的文件名返回错误
#[derive(Default)]
pub struct MockFrameDescriber {
    records: HashMap<String, VisionRecord>,
    failing: Vec<String>,
    described: Mutex<Vec<PathBuf>>,
}

impl MockFrameDescriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(mut self, file_name: &str, record: VisionRecord) -> Self {
        self.records.insert(file_name.to_string(), record);
        self
    }

    pub fn failing_on(mut self, file_name: &str) -> Self {
        self.failing.push(file_name.to_string());
        self
    }

    pub fn described(&self) -> Vec<PathBuf> {
        self.described.lock().unwrap().clone()
    }
}

#[async_trait]
impl FrameDescriber for MockFrameDescriber {
    async fn describe_frame(&self, image: &Path) -> Result<VisionRecord, OracleError> {
        self.described.lock().unwrap().push(image.to_path_buf());
        let name = image.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if self.failing.iter().any(|f| f == name) {
            return Err(OracleError::Malformed(format!("cannot describe {}", name)));
        }
        let mut record = self.records.get(name).cloned().unwrap_or_default();
        record.image_path = Some(image.to_string_lossy().into_owned());
        Ok(record)
    }
}

/// 返回固定的抽取结果，记录收到的素材数量
pub struct MockFactExtractor {
    facts: RawFactSet,
    received: Mutex<Vec<(usize, usize)>>,
}

impl MockFactExtractor {
    pub fn new(facts: RawFactSet) -> Self {
        Self {
            facts,
            received: Mutex::new(Vec::new()),
        }
    }

    /// (asr 片段数, 视觉记录数)
    pub fn received(&self) -> Vec<(usize, usize)> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl FactExtractor for MockFactExtractor {
    async fn extract_facts(
        &self,
        asr: &[AsrSegment],
        vision: &[VisionRecord],
    ) -> Result<RawFactSet, OracleError> {
        self.received.lock().unwrap().push((asr.len(), vision.len()));
        Ok(self.facts.clone())
    }
}

/// 用 strict 事实拼一篇短文，记录收到的事实
#[derive(Default)]
pub struct MockPostWriter {
    received: Mutex<Vec<FactBundle>>,
}

impl MockPostWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Vec<FactBundle> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl PostWriter for MockPostWriter {
    async fn write_post(&self, facts: &FactBundle) -> Result<Post, OracleError> {
        self.received.lock().unwrap().push(facts.clone());
        let title = facts
            .facts_strict
            .scalar(FactField::Place)
            .unwrap_or("旅行笔记")
            .to_string();
        let markdown = facts
            .facts_strict
            .values
            .keys()
            .map(|field| format!("- {}", field.label()))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(Post { title, markdown })
    }
}

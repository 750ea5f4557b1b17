use serde::{Deserialize, Serialize};

/// 语音识别片段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsrSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl AsrSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// 视觉模型对一张入选帧的描述，字段均可缺失
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisionRecord {
    /// 对应入选帧的图片路径
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub place: Option<String>,
    #[serde(default)]
    pub activities: Vec<String>,
    #[serde(default)]
    pub objects: Vec<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub visible_text: Option<String>,
}

impl VisionRecord {
    /// 只有图片路径的空描述
    pub fn at(image_path: impl Into<String>) -> Self {
        Self {
            image_path: Some(image_path.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Asr,
    Vision,
}

impl EvidenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceKind::Asr => "asr",
            EvidenceKind::Vision => "vision",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EvidencePayload {
    Asr {
        start: f64,
        end: f64,
        text: String,
        keywords: Vec<String>,
    },
    Vision {
        frame_id: Option<String>,
        path: Option<String>,
        representativeness: Option<f64>,
        has_landmark: Option<bool>,
        has_text: Option<bool>,
        place: Option<String>,
        visible_text: Option<String>,
        activities: Vec<String>,
        objects: Vec<String>,
        mood: Option<String>,
    },
}

/// 可溯源的证据记录，构建后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub id: String,
    /// [0, 1]，保留 3 位小数
    pub confidence: f64,
    #[serde(flatten)]
    pub payload: EvidencePayload,
}

impl Evidence {
    pub fn kind(&self) -> EvidenceKind {
        match self.payload {
            EvidencePayload::Asr { .. } => EvidenceKind::Asr,
            EvidencePayload::Vision { .. } => EvidenceKind::Vision,
        }
    }

    /// 参与事实匹配的文本（去掉空白项）
    pub fn texts(&self) -> Vec<&str> {
        let mut texts = Vec::new();
        match &self.payload {
            EvidencePayload::Asr { text, .. } => texts.push(text.as_str()),
            EvidencePayload::Vision {
                place,
                visible_text,
                mood,
                activities,
                objects,
                ..
            } => {
                texts.extend([place, visible_text, mood].into_iter().flatten().map(String::as_str));
                texts.extend(activities.iter().chain(objects.iter()).map(String::as_str));
            }
        }
        texts.retain(|t| !t.trim().is_empty());
        texts
    }

    pub fn contains(&self, value: &str) -> bool {
        self.texts().iter().any(|text| text.contains(value))
    }
}

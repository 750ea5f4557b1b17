use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// 抽取器未知时填写的占位值
pub const UNKNOWN_PLACEHOLDERS: &[&str] = &["未知", "unknown"];

/// 结构化事实字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactField {
    Place,
    Cost,
    Transport,
    Time,
    Activities,
    Caveats,
    Tags,
}

impl FactField {
    pub const SCALAR: [FactField; 4] = [
        FactField::Place,
        FactField::Cost,
        FactField::Transport,
        FactField::Time,
    ];
    pub const LIST: [FactField; 3] = [FactField::Activities, FactField::Caveats, FactField::Tags];

    pub fn as_str(&self) -> &'static str {
        match self {
            FactField::Place => "place",
            FactField::Cost => "cost",
            FactField::Transport => "transport",
            FactField::Time => "time",
            FactField::Activities => "activities",
            FactField::Caveats => "caveats",
            FactField::Tags => "tags",
        }
    }

    /// 抽取提示词中使用的中文键
    pub fn label(&self) -> &'static str {
        match self {
            FactField::Place => "地点",
            FactField::Cost => "费用",
            FactField::Transport => "交通",
            FactField::Time => "时间",
            FactField::Activities => "玩法",
            FactField::Caveats => "注意事项",
            FactField::Tags => "标签",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        FactField::SCALAR
            .iter()
            .chain(FactField::LIST.iter())
            .copied()
            .find(|f| f.as_str() == name || f.label() == name)
    }

    pub fn is_list(&self) -> bool {
        FactField::LIST.contains(self)
    }
}

// 按字段名排序，保证 missing 输出是字典序
impl Ord for FactField {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for FactField {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// 抽取器输出（未经证据校验，可能含幻觉）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFactSet {
    #[serde(rename = "地点", alias = "place", default, deserialize_with = "lenient_string")]
    pub place: Option<String>,
    #[serde(rename = "费用", alias = "cost", default, deserialize_with = "lenient_string")]
    pub cost: Option<String>,
    #[serde(rename = "交通", alias = "transport", default, deserialize_with = "lenient_string")]
    pub transport: Option<String>,
    #[serde(rename = "时间", alias = "time", default, deserialize_with = "lenient_string")]
    pub time: Option<String>,
    #[serde(rename = "玩法", alias = "activities", default, deserialize_with = "lenient_list")]
    pub activities: Vec<String>,
    #[serde(rename = "注意事项", alias = "caveats", default, deserialize_with = "lenient_list")]
    pub caveats: Vec<String>,
    #[serde(rename = "标签", alias = "tags", default, deserialize_with = "lenient_list")]
    pub tags: Vec<String>,
    /// 抽取器自己声明缺失的字段
    #[serde(default, deserialize_with = "lenient_list")]
    pub missing: Vec<String>,
}

impl RawFactSet {
    /// 标量字段的值；空串和占位值视为没有
    pub fn scalar(&self, field: FactField) -> Option<&str> {
        let value = match field {
            FactField::Place => self.place.as_deref(),
            FactField::Cost => self.cost.as_deref(),
            FactField::Transport => self.transport.as_deref(),
            FactField::Time => self.time.as_deref(),
            _ => None,
        }?;
        let value = value.trim();
        if value.is_empty() || UNKNOWN_PLACEHOLDERS.iter().any(|p| value.eq_ignore_ascii_case(p)) {
            return None;
        }
        Some(value)
    }

    pub fn list(&self, field: FactField) -> &[String] {
        match field {
            FactField::Activities => &self.activities,
            FactField::Caveats => &self.caveats,
            FactField::Tags => &self.tags,
            _ => &[],
        }
    }

    /// 抽取器约定：缺失的标量字段填 `未知`
    pub fn fill_placeholders(&mut self) {
        for slot in [&mut self.place, &mut self.cost, &mut self.transport, &mut self.time] {
            let blank = slot.as_deref().map_or(true, |v| v.trim().is_empty());
            if blank {
                *slot = Some(UNKNOWN_PLACEHOLDERS[0].to_string());
            }
        }
    }

    /// 所有字段都未知
    pub fn unknown() -> Self {
        let mut facts = Self::default();
        facts.fill_placeholders();
        facts
    }

    pub fn declared_missing(&self) -> BTreeSet<FactField> {
        self.missing.iter().filter_map(|name| FactField::parse(name)).collect()
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s],
        _ => Vec::new(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FactValue {
    Scalar(String),
    List(Vec<String>),
}

/// 某一置信档位下的事实及其证据 ID
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroundedFacts {
    #[serde(flatten)]
    pub values: BTreeMap<FactField, FactValue>,
    pub evidence_ids: BTreeMap<FactField, Vec<String>>,
}

impl GroundedFacts {
    pub fn insert(&mut self, field: FactField, value: FactValue, evidence_ids: Vec<String>) {
        self.values.insert(field, value);
        self.evidence_ids.insert(field, evidence_ids);
    }

    pub fn get(&self, field: FactField) -> Option<&FactValue> {
        self.values.get(&field)
    }

    pub fn scalar(&self, field: FactField) -> Option<&str> {
        match self.values.get(&field) {
            Some(FactValue::Scalar(s)) => Some(s),
            _ => None,
        }
    }

    pub fn list(&self, field: FactField) -> Option<&[String]> {
        match self.values.get(&field) {
            Some(FactValue::List(items)) => Some(items),
            _ => None,
        }
    }

    pub fn contains(&self, field: FactField) -> bool {
        self.values.contains_key(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// 证据校验后的事实：每个字段只出现在 strict / weak / missing 之一
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FactBundle {
    pub facts_strict: GroundedFacts,
    pub facts_weak: GroundedFacts,
    pub missing: BTreeSet<FactField>,
}

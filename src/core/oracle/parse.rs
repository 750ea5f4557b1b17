//! 模型输出解析：抽取消息正文，宽松地恢复 JSON

use super::error::OracleError;
use crate::core::evidence::VisionRecord;
use crate::core::video::VisualJudgment;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::path::PathBuf;

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").unwrap());

const LIST_SEPARATORS: &[char] = &['、', ',', '，', ';', '；'];

/// `choices[0].message.content`，content 可能是字符串或分片列表
pub fn message_text(response: &Value) -> Result<String, OracleError> {
    let content = response
        .pointer("/choices/0/message/content")
        .ok_or_else(|| OracleError::Malformed("missing choices[0].message.content".into()))?;

    let text = match content {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .concat(),
        Value::Null => String::new(),
        other => other.to_string(),
    };

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(OracleError::EmptyResponse);
    }
    Ok(text)
}

/// 宽松解析：去掉代码块和前后说明文字，严格解析失败时用 json5 再试
pub fn parse_json_lenient(text: &str) -> Result<Value, OracleError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(OracleError::EmptyResponse);
    }
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }

    let unfenced = CODE_FENCE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(text);

    let candidate = json_span(unfenced).unwrap_or(unfenced);
    serde_json::from_str::<Value>(candidate)
        .or_else(|_| json5::from_str::<Value>(candidate))
        .map_err(|e| {
            debug!("   unparseable model output: {}", text);
            OracleError::Malformed(format!("not JSON: {}", e))
        })
}

/// 第一个 `{` / `[` 到最后一个对应闭合符之间的片段
fn json_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let close = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

fn as_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// 字符串按 `、` / `,` / `，` 等拆分，数组逐项取字符串
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(as_text).collect(),
        Some(Value::String(s)) => s
            .split(LIST_SEPARATORS)
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn first_text(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| object.get(*key).and_then(as_text))
}

fn first_list(object: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .map(|key| string_list(object.get(*key)))
        .find(|items| !items.is_empty())
        .unwrap_or_default()
}

/// 视觉描述归一化（`location` → place，`text` → visible_text）
pub fn vision_record(value: &Value, image_path: &str) -> VisionRecord {
    let object = match value {
        Value::Object(object) => object,
        Value::Array(items) => match items.first() {
            Some(Value::Object(object)) => object,
            _ => return VisionRecord::at(image_path),
        },
        _ => return VisionRecord::at(image_path),
    };

    VisionRecord {
        image_path: Some(image_path.to_string()),
        place: first_text(object, &["place", "location", "地点"]),
        activities: first_list(object, &["activities", "activity", "玩法", "活动"]),
        objects: first_list(object, &["objects", "物体"]),
        mood: first_text(object, &["mood", "emotion", "氛围"]),
        visible_text: first_text(object, &["visible_text", "text", "文字"]),
    }
}

fn as_flag(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "是" | "有" => Some(true),
            "false" | "no" | "否" | "无" | "没有" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_score(value: Option<&Value>) -> Option<f64> {
    let score = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    score.is_finite().then(|| score.clamp(0.0, 1.0))
}

/// 轻量打分结果；`index` 为 1 起的图片序号，缺失时按位置对齐
pub fn visual_judgments(value: &Value, images: &[PathBuf]) -> Vec<VisualJudgment> {
    let items = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(object) => ["frames", "results", "items"]
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_array))
            .map(Vec::as_slice)
            .unwrap_or(std::slice::from_ref(value)),
        _ => &[],
    };

    items
        .iter()
        .filter_map(Value::as_object)
        .map(|item| {
            let path = item
                .get("index")
                .and_then(Value::as_u64)
                .and_then(|idx| (idx as usize).checked_sub(1))
                .and_then(|idx| images.get(idx))
                .map(|p| p.to_string_lossy().into_owned())
                .or_else(|| first_text(item, &["path", "image_path"]));

            VisualJudgment {
                path,
                has_landmark: as_flag(item.get("has_landmark")),
                has_readable_text: as_flag(
                    item.get("has_readable_text").or_else(|| item.get("has_text")),
                ),
                representativeness: as_score(item.get("representativeness")),
                brief: first_text(item, &["brief", "summary"]).unwrap_or_default(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chat(content: Value) -> Value {
        json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
    }

    #[test]
    fn test_message_text_variants() {
        assert_eq!(message_text(&chat(json!("  你好 "))).unwrap(), "你好");
        let parts = json!([{"type": "text", "text": "{\"a\":"}, {"type": "text", "text": "1}"}]);
        assert_eq!(message_text(&chat(parts)).unwrap(), "{\"a\":1}");
        assert!(matches!(message_text(&chat(json!(""))), Err(OracleError::EmptyResponse)));
        assert!(matches!(message_text(&json!({"error": "x"})), Err(OracleError::Malformed(_))));
    }

    #[test]
    fn test_lenient_json_strips_prose_and_fences() {
        let fenced = "这是结果：\n```json\n{\"地点\": \"苏州园林\"}\n```\n希望有帮助";
        assert_eq!(parse_json_lenient(fenced).unwrap()["地点"], "苏州园林");

        let prose = "结果如下 {\"place\": \"西湖\", \"tags\": [\"湖\"]} 以上";
        assert_eq!(parse_json_lenient(prose).unwrap()["place"], "西湖");

        let json5_style = "{place: '西湖', tags: ['湖',],}";
        assert_eq!(parse_json_lenient(json5_style).unwrap()["tags"][0], "湖");

        assert!(matches!(parse_json_lenient("没有 JSON"), Err(OracleError::Malformed(_))));
    }

    #[test]
    fn test_vision_record_normalizes_keys() {
        let value = json!({
            "location": "苏州园林",
            "activities": "逛园林、拍照, 喝茶",
            "objects": ["拱桥", ""],
            "mood": "惬意",
            "text": "开放时间 09:00"
        });
        let record = vision_record(&value, "/tmp/frame_00001.jpg");

        assert_eq!(record.image_path.as_deref(), Some("/tmp/frame_00001.jpg"));
        assert_eq!(record.place.as_deref(), Some("苏州园林"));
        assert_eq!(record.activities, vec!["逛园林", "拍照", "喝茶"]);
        assert_eq!(record.objects, vec!["拱桥"]);
        assert_eq!(record.visible_text.as_deref(), Some("开放时间 09:00"));
    }

    #[test]
    fn test_vision_record_from_non_object() {
        let record = vision_record(&json!("a pleasant garden"), "/tmp/a.jpg");
        assert_eq!(record, VisionRecord::at("/tmp/a.jpg"));
    }

    #[test]
    fn test_visual_judgments_map_index_to_path() {
        let images = vec![PathBuf::from("/tmp/a.jpg"), PathBuf::from("/tmp/b.jpg")];
        let value = json!({"frames": [
            {"index": 2, "has_landmark": "是", "has_readable_text": false, "representativeness": 1.4, "brief": "古桥"},
            {"index": 1, "has_landmark": false, "representativeness": "0.3"}
        ]});

        let judgments = visual_judgments(&value, &images);
        assert_eq!(judgments.len(), 2);
        assert_eq!(judgments[0].path.as_deref(), Some("/tmp/b.jpg"));
        assert_eq!(judgments[0].has_landmark, Some(true));
        assert_eq!(judgments[0].representativeness, Some(1.0));
        assert_eq!(judgments[0].brief, "古桥");
        assert_eq!(judgments[1].path.as_deref(), Some("/tmp/a.jpg"));
        assert_eq!(judgments[1].has_readable_text, None);
        assert_eq!(judgments[1].representativeness, Some(0.3));
    }

    #[test]
    fn test_visual_judgments_without_index_stay_positional() {
        let images = vec![PathBuf::from("/tmp/a.jpg")];
        let judgments = visual_judgments(&json!([{"has_landmark": true}]), &images);
        assert_eq!(judgments[0].path, None);
        assert_eq!(judgments[0].has_landmark, Some(true));
    }
}

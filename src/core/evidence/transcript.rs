//! 转写文本规整：统一全角标点，去掉多余空白

use super::model::AsrSegment;
use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

const TERMINAL: &[char] = &['。', '！', '？', '；', '：'];
const COLLAPSIBLE: &[char] = &['。', '！', '？', '；', '，'];

fn full_width(c: char) -> Option<char> {
    match c {
        ',' => Some('，'),
        ';' => Some('；'),
        ':' => Some('：'),
        '?' => Some('？'),
        '!' => Some('！'),
        _ => None,
    }
}

/// 规整单段文本；数字之间的 `,` 和 `:`（如 `1,200`、`09:00`）保持原样
pub fn normalize_transcript_text(text: &str) -> String {
    let collapsed = WHITESPACE.replace_all(text.trim(), " ");
    if collapsed.is_empty() {
        return String::new();
    }

    let chars: Vec<char> = collapsed.chars().collect();
    let mut out = String::with_capacity(collapsed.len());

    for (i, &c) in chars.iter().enumerate() {
        let prev = i.checked_sub(1).and_then(|p| chars.get(p)).copied();
        let next = chars.get(i + 1).copied();

        let numeric_separator = matches!(c, ',' | ':')
            && prev.is_some_and(|p| p.is_ascii_digit())
            && next.is_some_and(|n| n.is_ascii_digit());

        match full_width(c) {
            Some(wide) if !numeric_separator => {
                while out.ends_with(' ') {
                    out.pop();
                }
                if !out.ends_with(wide) || !COLLAPSIBLE.contains(&wide) {
                    out.push(wide);
                }
            }
            _ => {
                let last = out.chars().last();
                if c == ' ' && last.map_or(false, |l| full_width_punct(l)) {
                    continue;
                }
                if COLLAPSIBLE.contains(&c) && last == Some(c) {
                    continue;
                }
                out.push(c);
            }
        }
    }

    if !out.ends_with(TERMINAL) {
        out.push('。');
    }
    out
}

fn full_width_punct(c: char) -> bool {
    matches!(c, '，' | '；' | '：' | '？' | '！')
}

/// 规整整份转写，丢弃空片段
pub fn normalize_segments(segments: Vec<AsrSegment>) -> Vec<AsrSegment> {
    segments
        .into_iter()
        .filter_map(|segment| {
            let text = normalize_transcript_text(&segment.text);
            if text.is_empty() {
                None
            } else {
                Some(AsrSegment { text, ..segment })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_punctuation_becomes_full_width() {
        assert_eq!(normalize_transcript_text("门票 80 元 , 很值!"), "门票 80 元，很值！");
        assert_eq!(normalize_transcript_text("真的吗 ? 是的"), "真的吗？是的。");
    }

    #[test]
    fn test_repeated_punctuation_collapses() {
        assert_eq!(normalize_transcript_text("太美了！！！"), "太美了！");
        assert_eq!(normalize_transcript_text("好,,好"), "好，好。");
    }

    #[test]
    fn test_times_and_amounts_keep_separators() {
        assert_eq!(normalize_transcript_text("开放时间 09:00"), "开放时间 09:00。");
        assert_eq!(normalize_transcript_text("大约 1,200 元"), "大约 1,200 元。");
    }

    #[test]
    fn test_whitespace_only_is_empty() {
        assert_eq!(normalize_transcript_text("  \n\t "), "");
        let segments = normalize_segments(vec![
            AsrSegment::new(0.0, 1.0, " "),
            AsrSegment::new(1.0, 2.0, "你好"),
        ]);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "你好。");
        assert_eq!(segments[0].start, 1.0);
    }
}

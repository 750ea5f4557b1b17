//! 事实落地：只有能在证据原文中逐字找到的事实才会被采信

use super::facts::{FactBundle, FactField, FactValue, RawFactSet};
use super::model::Evidence;
use log::{debug, info};

pub const STRICT_THRESHOLD: f64 = 0.75;
pub const WEAK_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Strict,
    Weak,
    Missing,
}

impl Tier {
    pub fn from_support(score: f64) -> Self {
        if score >= STRICT_THRESHOLD {
            Tier::Strict
        } else if score >= WEAK_THRESHOLD {
            Tier::Weak
        } else {
            Tier::Missing
        }
    }
}

/// 某个值的证据支持度
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Support {
    /// 包含该值的证据中的最高置信度
    pub score: f64,
    pub evidence_ids: Vec<String>,
}

pub struct FactGrounder<'a> {
    evidences: &'a [Evidence],
}

impl<'a> FactGrounder<'a> {
    pub fn new(evidences: &'a [Evidence]) -> Self {
        Self { evidences }
    }

    /// 子串包含匹配，不做模糊匹配
    pub fn support(&self, value: &str) -> Support {
        let value = value.trim();
        if value.is_empty() {
            return Support::default();
        }

        let mut support = Support::default();
        for evidence in self.evidences {
            if evidence.contains(value) {
                support.evidence_ids.push(evidence.id.clone());
                support.score = support.score.max(evidence.confidence);
            }
        }
        support
    }

    pub fn ground(&self, facts: &RawFactSet) -> FactBundle {
        let mut bundle = FactBundle::default();
        let declared_missing = facts.declared_missing();

        // 抽取方自报的缺失字段只在没有证据支持时生效
        for field in FactField::SCALAR {
            let Some(value) = facts.scalar(field) else {
                bundle.missing.insert(field);
                continue;
            };

            let support = self.support(value);
            debug!("   {} = {:?} support {:.3}", field.as_str(), value, support.score);
            let grounded = FactValue::Scalar(value.to_string());
            match Tier::from_support(support.score) {
                Tier::Strict => bundle.facts_strict.insert(field, grounded, support.evidence_ids),
                Tier::Weak => bundle.facts_weak.insert(field, grounded, support.evidence_ids),
                Tier::Missing => {
                    bundle.missing.insert(field);
                }
            }
            if declared_missing.contains(&field) && !bundle.missing.contains(&field) {
                debug!("   {} declared missing but grounded", field.as_str());
            }
        }

        for field in FactField::LIST {
            let mut strict = TierItems::default();
            let mut weak = TierItems::default();
            for item in dedup_items(facts.list(field)) {
                let support = self.support(item);
                match Tier::from_support(support.score) {
                    Tier::Strict => strict.push(item, support.evidence_ids),
                    Tier::Weak => weak.push(item, support.evidence_ids),
                    Tier::Missing => debug!("   {} item {:?} unsupported", field.as_str(), item),
                }
            }

            // 有强支持的条目时整字段进 strict，只保留强支持条目
            if !strict.items.is_empty() {
                if !weak.items.is_empty() {
                    debug!("   {} drops {} weak items", field.as_str(), weak.items.len());
                }
                bundle
                    .facts_strict
                    .insert(field, FactValue::List(strict.items), strict.evidence_ids);
            } else if !weak.items.is_empty() {
                bundle
                    .facts_weak
                    .insert(field, FactValue::List(weak.items), weak.evidence_ids);
            } else {
                bundle.missing.insert(field);
            }
        }

        info!(
            "🔎 Grounded facts: {} strict, {} weak, {} missing",
            bundle.facts_strict.values.len(),
            bundle.facts_weak.values.len(),
            bundle.missing.len()
        );
        bundle
    }
}

#[derive(Default)]
struct TierItems {
    items: Vec<String>,
    evidence_ids: Vec<String>,
}

impl TierItems {
    fn push(&mut self, item: &str, evidence_ids: Vec<String>) {
        self.items.push(item.to_string());
        for id in evidence_ids {
            if !self.evidence_ids.contains(&id) {
                self.evidence_ids.push(id);
            }
        }
    }
}

fn dedup_items(items: &[String]) -> Vec<&str> {
    let mut seen = Vec::new();
    for item in items {
        let item = item.trim();
        if !item.is_empty() && !seen.contains(&item) {
            seen.push(item);
        }
    }
    seen
}

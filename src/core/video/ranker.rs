//! 预算内的视觉模型打分，失败时退化为纯启发式分

use super::frame::{Frame, VisualJudgment};
use crate::core::oracle::{FrameRanker, OracleError};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// final_score 中启发式分的权重
pub const HEURISTIC_WEIGHT: f64 = 0.6;

/// 打分后的候选池
#[derive(Debug, Clone, Default)]
pub struct RankedPool {
    /// 送检帧，按 final_score 降序
    pub sent: Vec<Frame>,
    /// 超出预算未送检的候选帧，按 final_score 降序
    pub held_back: Vec<Frame>,
}

pub struct BudgetedVisualRanker {
    ranker: Arc<dyn FrameRanker>,
    budget: usize,
    timeout: Duration,
}

impl BudgetedVisualRanker {
    pub fn new(ranker: Arc<dyn FrameRanker>, budget: usize, timeout: Duration) -> Self {
        Self {
            ranker,
            budget,
            timeout,
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// 只把前 budget 个候选送给视觉模型；模型出错不会中断流水线
    pub async fn rank(&self, pool: Vec<Frame>) -> RankedPool {
        let mut sent = pool;
        let mut held_back = sent.split_off(self.budget.min(sent.len()));

        if !sent.is_empty() {
            let images: Vec<PathBuf> = sent.iter().map(|f| f.path.clone()).collect();
            info!("🔭 Sending {} frames to visual ranker (budget {})", images.len(), self.budget);

            match self.call_ranker(&images).await {
                Ok(judgments) => {
                    let aligned = align_judgments(&images, judgments);
                    for (frame, judgment) in sent.iter_mut().zip(aligned) {
                        frame.vlm = Some(judgment);
                    }
                }
                Err(e) => {
                    warn!("⚠️ Visual ranking failed, falling back to heuristics: {}", e);
                    let reason = e.to_string();
                    for frame in sent.iter_mut() {
                        frame.vlm = Some(VisualJudgment::empty());
                        frame.vlm_error = Some(reason.clone());
                    }
                }
            }
        } else {
            debug!("Visual ranking skipped (budget {}, nothing to send)", self.budget);
        }

        for frame in sent.iter_mut().chain(held_back.iter_mut()) {
            let bonus = frame.vlm.as_ref().map(VisualJudgment::visual_bonus).unwrap_or(0.0);
            frame.final_score = Some(HEURISTIC_WEIGHT * frame.heuristic_score + bonus);
        }
        sort_by_final_score(&mut sent);
        sort_by_final_score(&mut held_back);

        RankedPool { sent, held_back }
    }

    async fn call_ranker(&self, images: &[PathBuf]) -> Result<Vec<VisualJudgment>, OracleError> {
        match timeout(self.timeout, self.ranker.rank_frames(images, images.len())).await {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout(self.timeout)),
        }
    }
}

fn sort_by_final_score(frames: &mut [Frame]) {
    frames.sort_by(|a, b| b.effective_score().total_cmp(&a.effective_score()));
}

/// 按请求顺序对齐判断结果
///
/// 同位置的结果带了不一致的 path 时按 path 查找；找不到或数量不足的帧给全空判断。
fn align_judgments(images: &[PathBuf], mut judgments: Vec<VisualJudgment>) -> Vec<VisualJudgment> {
    if judgments.len() != images.len() {
        warn!(
            "⚠️ Visual ranker returned {} judgments for {} frames",
            judgments.len(),
            images.len()
        );
    }

    let requested: Vec<String> = images.iter().map(|p| p.to_string_lossy().into_owned()).collect();
    let mut taken = vec![false; judgments.len()];
    let mut aligned = Vec::with_capacity(images.len());

    for (i, path) in requested.iter().enumerate() {
        let positional = judgments
            .get(i)
            .filter(|j| !taken[i] && j.path.as_deref().map_or(true, |p| p == path))
            .map(|_| i);
        let by_path = || {
            judgments
                .iter()
                .enumerate()
                .position(|(j, judgment)| {
                    !taken[j] && judgment.path.as_deref() == Some(path.as_str())
                })
        };

        match positional.or_else(by_path) {
            Some(j) => {
                taken[j] = true;
                aligned.push(std::mem::take(&mut judgments[j]));
            }
            None => {
                debug!("   no judgment matched {}", path);
                aligned.push(VisualJudgment::empty());
            }
        }
    }
    aligned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::oracle::mock::MockFrameRanker;

    fn candidate(i: usize, heuristic: f64) -> Frame {
        let mut f = Frame::new(
            format!("frame_{:05}", i),
            i as f64,
            format!("/tmp/frame_{}.jpg", i),
        );
        f.scene_index = Some(i);
        f.heuristic_score = heuristic;
        f
    }

    fn judgment(rep: f64, landmark: bool, text: bool) -> VisualJudgment {
        VisualJudgment {
            representativeness: Some(rep),
            has_landmark: Some(landmark),
            has_readable_text: Some(text),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_never_submits_more_than_budget() {
        for budget in 1..6 {
            let mock = Arc::new(MockFrameRanker::uniform(judgment(0.5, false, false)));
            let ranker = BudgetedVisualRanker::new(mock.clone(), budget, Duration::from_secs(5));
            let pool: Vec<Frame> = (0..4).map(|i| candidate(i, 0.5)).collect();

            let ranked = ranker.rank(pool).await;

            let submitted = mock.submitted();
            assert_eq!(submitted.len(), 1);
            assert!(submitted[0] <= budget);
            assert_eq!(ranked.sent.len(), budget.min(4));
            assert_eq!(ranked.sent.len() + ranked.held_back.len(), 4);
        }
    }

    #[tokio::test]
    async fn test_merges_visual_bonus() {
        let mock = Arc::new(MockFrameRanker::with_judgments(vec![
            judgment(0.2, false, false),
            judgment(1.0, true, true),
        ]));
        let ranker = BudgetedVisualRanker::new(mock, 2, Duration::from_secs(5));

        let ranked = ranker.rank(vec![candidate(0, 1.0), candidate(1, 0.0)]).await;

        assert_eq!(ranked.sent[0].frame_id, "frame_00001");
        assert!((ranked.sent[0].final_score.unwrap() - 1.0).abs() < 1e-9);
        assert!((ranked.sent[1].final_score.unwrap() - 0.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_failure_degrades_to_heuristics() {
        let ranker = BudgetedVisualRanker::new(
            Arc::new(MockFrameRanker::failing()),
            3,
            Duration::from_secs(5),
        );

        let ranked = ranker.rank(vec![candidate(0, 0.5), candidate(1, 0.9)]).await;

        assert_eq!(ranked.sent.len(), 2);
        for frame in &ranked.sent {
            assert_eq!(frame.vlm, Some(VisualJudgment::empty()));
            assert!(frame.vlm_error.is_some());
            assert!((frame.final_score.unwrap() - 0.6 * frame.heuristic_score).abs() < 1e-9);
        }
        assert_eq!(ranked.sent[0].frame_id, "frame_00001");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_soft() {
        let slow = MockFrameRanker::uniform(judgment(1.0, true, true))
            .with_delay(Duration::from_secs(60));
        let ranker = BudgetedVisualRanker::new(Arc::new(slow), 2, Duration::from_secs(1));

        let ranked = ranker.rank(vec![candidate(0, 0.5)]).await;

        let frame = &ranked.sent[0];
        assert!(frame.vlm_error.as_deref().unwrap_or_default().contains("timed out"));
        assert!((frame.final_score.unwrap() - 0.3).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_zero_budget_skips_oracle() {
        let mock = Arc::new(MockFrameRanker::uniform(judgment(1.0, true, true)));
        let ranker = BudgetedVisualRanker::new(mock.clone(), 0, Duration::from_secs(5));

        let ranked = ranker.rank(vec![candidate(0, 0.5), candidate(1, 0.25)]).await;

        assert!(mock.submitted().is_empty());
        assert!(ranked.sent.is_empty());
        for frame in &ranked.held_back {
            assert!(frame.vlm.is_none());
            assert!((frame.final_score.unwrap() - 0.6 * frame.heuristic_score).abs() < 1e-9);
        }
    }

    #[test]
    fn test_align_short_response_defaults_rest() {
        let images = vec![
            PathBuf::from("/a.jpg"),
            PathBuf::from("/b.jpg"),
            PathBuf::from("/c.jpg"),
        ];
        let aligned = align_judgments(&images, vec![judgment(0.9, true, false)]);
        assert_eq!(aligned.len(), 3);
        assert_eq!(aligned[0].representativeness, Some(0.9));
        assert_eq!(aligned[1], VisualJudgment::empty());
        assert_eq!(aligned[2], VisualJudgment::empty());
    }

    #[test]
    fn test_align_reordered_response_by_path() {
        let images = vec![PathBuf::from("/a.jpg"), PathBuf::from("/b.jpg")];
        let mut for_b = judgment(0.1, false, false);
        for_b.path = Some("/b.jpg".into());
        let mut for_a = judgment(0.9, true, false);
        for_a.path = Some("/a.jpg".into());

        let aligned = align_judgments(&images, vec![for_b, for_a]);
        assert_eq!(aligned[0].representativeness, Some(0.9));
        assert_eq!(aligned[1].representativeness, Some(0.1));
    }

    #[test]
    fn test_align_unknown_path_gets_empty() {
        let images = vec![PathBuf::from("/a.jpg")];
        let mut stray = judgment(0.9, true, true);
        stray.path = Some("/zzz.jpg".into());

        let aligned = align_judgments(&images, vec![stray]);
        assert_eq!(aligned[0], VisualJudgment::empty());
    }
}

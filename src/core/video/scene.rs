//! 镜头归属：把每一帧挂到包含其时间戳的镜头上

use super::frame::{Frame, Scene};
use log::debug;

/// 镜头索引结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneAssignment {
    /// 每个镜头内的帧下标（对应传入 frames 的下标）
    pub by_scene: Vec<Vec<usize>>,
    /// 不在任何镜头内的帧下标
    pub unassigned: Vec<usize>,
}

impl SceneAssignment {
    pub fn frames_in_scene(&self, scene_index: usize) -> &[usize] {
        self.by_scene
            .get(scene_index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

pub struct SceneIndexer;

impl SceneIndexer {
    /// 单次扫描，镜头游标只前进
    ///
    /// `scenes` 与 `frames` 都需按时间升序。重复调用结果一致。
    pub fn assign(scenes: &[Scene], frames: &mut [Frame]) -> SceneAssignment {
        let mut assignment = SceneAssignment {
            by_scene: vec![Vec::new(); scenes.len()],
            unassigned: Vec::new(),
        };

        let mut cursor = 0usize;
        for (frame_idx, frame) in frames.iter_mut().enumerate() {
            let ts = frame.timestamp;
            while cursor + 1 < scenes.len() && ts > scenes[cursor].end {
                cursor += 1;
            }

            match scenes.get(cursor) {
                Some(scene) if scene.contains(ts) => {
                    frame.scene_index = Some(cursor);
                    assignment.by_scene[cursor].push(frame_idx);
                }
                _ => {
                    frame.scene_index = None;
                    assignment.unassigned.push(frame_idx);
                }
            }
        }

        debug!(
            "🎞️ Scene assignment: {} scenes, {} unassigned frames",
            scenes.len(),
            assignment.unassigned.len()
        );
        assignment
    }
}

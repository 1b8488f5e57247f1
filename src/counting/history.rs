//! 轨迹位置记忆
//! Last-known vertical position per track

use crate::detection::TrackId;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct TrackState {
    /// 最近一帧的垂直中心
    center_y: i32,
    /// 最近一次被观测的帧序号
    last_seen: u64,
}

/// 每个跟踪ID的上一帧中心位置
#[derive(Debug, Default)]
pub struct TrackHistory {
    tracks: HashMap<TrackId, TrackState>,
    frame: u64,
}

impl TrackHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置当前帧序号 (用于记录 last_seen)
    pub fn set_frame(&mut self, frame: u64) {
        self.frame = frame;
    }

    /// 记录新位置, 返回上一次的位置 (首次出现返回 None)
    pub fn observe(&mut self, track_id: TrackId, center_y: i32) -> Option<i32> {
        let state = TrackState {
            center_y,
            last_seen: self.frame,
        };
        self.tracks
            .insert(track_id, state)
            .map(|previous| previous.center_y)
    }

    pub fn last_center_y(&self, track_id: TrackId) -> Option<i32> {
        self.tracks.get(&track_id).map(|state| state.center_y)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// 删除最近 `max_age` 帧内未出现的轨迹, 返回被删除的ID
    pub fn evict_stale(&mut self, max_age: u64) -> Vec<TrackId> {
        let frame = self.frame;
        let stale: Vec<TrackId> = self
            .tracks
            .iter()
            .filter(|(_, state)| frame.saturating_sub(state.last_seen) >= max_age)
            .map(|(id, _)| *id)
            .collect();
        for id in &stale {
            self.tracks.remove(id);
        }
        stale
    }
}

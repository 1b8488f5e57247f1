//! 累计计数
//! Cumulative directional totals with at-most-once counting per track

use super::crossing::Direction;
use crate::detection::TrackId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 进/出累计值 (只增不减)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    entering: u64,
    leaving: u64,
}

impl Totals {
    pub fn new(entering: u64, leaving: u64) -> Self {
        Self { entering, leaving }
    }

    pub fn entering(&self) -> u64 {
        self.entering
    }

    pub fn leaving(&self) -> u64 {
        self.leaving
    }

    pub fn total(&self) -> u64 {
        self.entering + self.leaving
    }
}

/// 计数聚合器, 唯一可以修改 Totals 的地方
#[derive(Debug, Default)]
pub struct CountAggregator {
    totals: Totals,
    counted: HashSet<TrackId>,
}

impl CountAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一次越线; 已计数的ID直接忽略并返回 false
    pub fn register(&mut self, track_id: TrackId, direction: Direction) -> bool {
        if !self.counted.insert(track_id) {
            return false;
        }
        match direction {
            Direction::Entering => self.totals.entering += 1,
            Direction::Leaving => self.totals.leaving += 1,
        }
        true
    }

    /// 当前累计值的副本
    pub fn totals(&self) -> Totals {
        self.totals
    }

    pub fn is_counted(&self, track_id: TrackId) -> bool {
        self.counted.contains(&track_id)
    }

    pub fn counted_len(&self) -> usize {
        self.counted.len()
    }

    /// 从已计数集合中移除过期ID (累计值不变)
    pub fn forget(&mut self, track_ids: &[TrackId]) {
        for id in track_ids {
            self.counted.remove(id);
        }
    }
}

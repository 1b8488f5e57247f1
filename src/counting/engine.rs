// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 越线计数引擎
//! Owns TrackHistory, CountAggregator and the counting line; processes one frame at a time

use super::aggregator::{CountAggregator, Totals};
use super::crossing::{self, CountingLine, Direction};
use super::history::TrackHistory;
use crate::config::CounterConfig;
use crate::detection::{DetectionFilter, FrameBatch, TrackId};
use tracing::{debug, info, warn};

/// 被接受的一次越线
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CrossingEvent {
    pub track_id: TrackId,
    pub direction: Direction,
    pub previous_y: i32,
    pub current_y: i32,
}

/// 单帧处理结果
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameReport {
    /// 帧序号 (从1开始)
    pub frame_index: u64,
    pub line_y: i32,
    /// 本帧被计数的越线
    pub crossings: Vec<CrossingEvent>,
    /// 写入轨迹记忆的检测数
    pub observed: usize,
    /// 被类别/置信度过滤的检测数
    pub filtered: usize,
    /// 格式错误被跳过的检测数
    pub skipped: usize,
    /// 本帧被淘汰的过期轨迹数
    pub evicted: usize,
}

pub struct LineCounter {
    line: CountingLine,
    filter: DetectionFilter,
    default_frame_height: u32,
    track_ttl: Option<u64>,
    history: TrackHistory,
    aggregator: CountAggregator,
    frames: u64,
}

impl LineCounter {
    pub fn new(line: CountingLine, filter: DetectionFilter) -> Self {
        Self {
            line,
            filter,
            default_frame_height: 720,
            track_ttl: None,
            history: TrackHistory::new(),
            aggregator: CountAggregator::new(),
            frames: 0,
        }
    }

    pub fn from_config(config: &CounterConfig) -> Self {
        Self::new(config.counting_line(), config.detection_filter())
            .with_frame_height(config.frame_height)
            .with_track_ttl(config.track_ttl_frames)
    }

    /// 帧记录未携带高度时使用的默认高度
    pub fn with_frame_height(mut self, frame_height: u32) -> Self {
        self.default_frame_height = frame_height;
        self
    }

    /// 过期轨迹淘汰窗口 (帧), None 表示从不淘汰
    pub fn with_track_ttl(mut self, track_ttl: Option<u64>) -> Self {
        self.track_ttl = track_ttl;
        self
    }

    /// 处理一帧检测结果
    pub fn process_frame(&mut self, batch: &FrameBatch) -> FrameReport {
        self.frames += 1;
        self.history.set_frame(self.frames);

        let frame_height = batch.frame_height.unwrap_or(self.default_frame_height);
        let line_y = self.line.line_y(frame_height);
        let mut report = FrameReport {
            frame_index: self.frames,
            line_y,
            skipped: batch.malformed,
            ..Default::default()
        };

        for raw in &batch.detections {
            let detection = match raw.validate() {
                Ok(detection) => detection,
                Err(e) => {
                    warn!("⚠️  帧 #{} 跳过检测: {}", self.frames, e);
                    report.skipped += 1;
                    continue;
                }
            };
            if !self.filter.accepts(&detection) {
                report.filtered += 1;
                continue;
            }

            let current_y = detection.bbox.center_y();
            report.observed += 1;
            let Some(previous_y) = self.history.observe(detection.track_id, current_y) else {
                continue;
            };
            let Some(direction) = crossing::detect(previous_y, current_y, line_y) else {
                continue;
            };
            if self.aggregator.register(detection.track_id, direction) {
                let totals = self.aggregator.totals();
                info!(
                    "🚗 #{} {} (y {} → {}, 线 {}) | 进: {} 出: {}",
                    detection.track_id,
                    direction,
                    previous_y,
                    current_y,
                    line_y,
                    totals.entering(),
                    totals.leaving()
                );
                report.crossings.push(CrossingEvent {
                    track_id: detection.track_id,
                    direction,
                    previous_y,
                    current_y,
                });
            } else {
                debug!("#{} 已计数, 忽略重复越线", detection.track_id);
            }
        }

        if let Some(ttl) = self.track_ttl {
            let evicted = self.history.evict_stale(ttl);
            if !evicted.is_empty() {
                self.aggregator.forget(&evicted);
                debug!("🧹 淘汰 {} 条过期轨迹", evicted.len());
            }
            report.evicted = evicted.len();
        }

        report
    }

    /// 当前累计值的副本 (交给持久化)
    pub fn totals(&self) -> Totals {
        self.aggregator.totals()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames
    }

    pub fn line(&self) -> CountingLine {
        self.line
    }

    /// 当前记忆中的轨迹数
    pub fn tracked(&self) -> usize {
        self.history.len()
    }

    pub fn is_counted(&self, track_id: TrackId) -> bool {
        self.aggregator.is_counted(track_id)
    }
}

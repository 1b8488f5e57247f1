//! 越线判定
//! Single-sample edge detector against a horizontal counting line

use serde::{Deserialize, Serialize};
use std::fmt;

/// 越线方向
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// 从线上方移动到线上或线下方
    Entering,
    /// 从线下方移动到线上或线上方
    Leaving,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Entering => write!(f, "entering"),
            Direction::Leaving => write!(f, "leaving"),
        }
    }
}

/// 判断两次连续观测之间是否越线
///
/// 每一侧都是"严格-包含"比较: 上一帧严格在一侧, 当前帧在线上或另一侧。
/// 恰好停在线上的一帧不会单独触发两次。
pub fn detect(previous_center_y: i32, current_center_y: i32, line_y: i32) -> Option<Direction> {
    if previous_center_y < line_y && current_center_y >= line_y {
        Some(Direction::Entering)
    } else if previous_center_y > line_y && current_center_y <= line_y {
        Some(Direction::Leaving)
    } else {
        None
    }
}

/// 水平计数线
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CountingLine {
    /// 线位置 (帧高度的比例, 0.0 - 1.0)
    pub position: f64,
    /// 预留的滞回带宽度 (像素), 当前判定逻辑不使用
    pub offset: i32,
}

impl Default for CountingLine {
    fn default() -> Self {
        Self {
            position: 0.5,
            offset: 20,
        }
    }
}

impl CountingLine {
    pub fn new(position: f64, offset: i32) -> Self {
        Self { position, offset }
    }

    /// 给定帧高度的计数线纵坐标 (截断取整)
    pub fn line_y(&self, frame_height: u32) -> i32 {
        (f64::from(frame_height) * self.position) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directions() {
        let line_y = 100;
        assert_eq!(detect(line_y - 5, line_y + 5, line_y), Some(Direction::Entering));
        assert_eq!(detect(line_y + 5, line_y - 5, line_y), Some(Direction::Leaving));
        assert_eq!(detect(line_y + 5, line_y + 3, line_y), None);
        assert_eq!(detect(line_y - 5, line_y - 1, line_y), None);
    }

    #[test]
    fn test_boundary_frames() {
        // 到达线上即触发
        assert_eq!(detect(99, 100, 100), Some(Direction::Entering));
        assert_eq!(detect(101, 100, 100), Some(Direction::Leaving));
        // 从线上离开不触发
        assert_eq!(detect(100, 140, 100), None);
        assert_eq!(detect(100, 60, 100), None);
        assert_eq!(detect(100, 100, 100), None);
    }

    #[test]
    fn test_line_y() {
        assert_eq!(CountingLine::default().line_y(720), 360);
        assert_eq!(CountingLine::new(0.33, 20).line_y(101), 33);
        assert_eq!(CountingLine::new(1.0, 0).line_y(480), 480);
        assert_eq!(Direction::Leaving.to_string(), "leaving");
    }
}

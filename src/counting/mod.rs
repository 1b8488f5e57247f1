/// 越线计数核心 (Line-Crossing Counting Core)
///
/// 单线程逐帧处理, 内部状态无需加锁:
/// - TrackHistory:    每个ID上一帧的垂直中心
/// - detect:          单次采样的越线判定
/// - CountAggregator: 累计进/出计数, 每个ID最多计一次
/// - LineCounter:     持有以上全部状态的计数引擎
pub mod aggregator;
pub mod crossing;
pub mod engine;
pub mod history;

pub use aggregator::{CountAggregator, Totals};
pub use crossing::{detect, CountingLine, Direction};
pub use engine::{CrossingEvent, FrameReport, LineCounter};
pub use history::TrackHistory;

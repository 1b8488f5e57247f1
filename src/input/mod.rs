/// 检测流输入系统 (Detection Stream Input)
///
/// 外部检测/跟踪器与计数核心之间的窄接口:
/// - FrameSource:        帧来源 trait
/// - NdjsonSource:       逐行JSON检测流 (文件/管道/标准输入)
/// - ReconnectingSource: 断线自动重连
pub mod ndjson;
pub mod reconnect;
pub mod source;

pub use ndjson::{parse_frame, NdjsonSource};
pub use reconnect::ReconnectingSource;
pub use source::{FrameSource, IterSource};

/// 计数流水线 (Counting Pipeline)
///
/// 单线程主循环:
/// - 从 FrameSource 拉取一帧检测结果
/// - LineCounter 同步处理该帧
/// - 每N帧通过 FlushSink 保存, 退出时 (包括异常) 再保存一次
pub mod runner;

pub use runner::{request_stop, CountingLoop, ExitReason, RunReport};

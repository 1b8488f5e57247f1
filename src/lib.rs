// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 计数配置参数
pub mod counting; // 越线计数核心
pub mod detection; // 检测输入数据结构
pub mod error; // 错误类型
pub mod input; // 检测流输入系统
pub mod persistence; // 计数持久化
pub mod pipeline; // 计数主循环

pub use crate::config::{Args, CounterConfig};
pub use crate::counting::{CountingLine, Direction, LineCounter, Totals};
pub use crate::error::{CounterError, Result};
pub use crate::persistence::{FlushSink, PersistenceWorker, PersistenceWriter};
pub use crate::pipeline::{CountingLoop, ExitReason, RunReport};

use chrono::NaiveDateTime;

/// 计数文件中的时间格式
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 本地当前时间
pub fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

pub fn format_timestamp(t: &NaiveDateTime) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

/// 计数持久化 (Count Persistence)
///
/// - PersistenceWriter: 追加CSV日志 + 原子替换JSON快照 (同步)
/// - PersistenceWorker: 后台线程版本, 通过 crossbeam channel 接收计数副本
pub mod worker;
pub mod writer;

pub use worker::{FlushRequest, PersistenceWorker};
pub use writer::{read_snapshot, PersistenceWriter, SnapshotDocument, AUDIT_HEADER};

use crate::counting::Totals;
use crate::error::Result;
use chrono::NaiveDateTime;

/// 计数保存目标 (主循环只依赖此接口)
pub trait FlushSink {
    /// 周期性保存
    fn flush(&mut self, at: NaiveDateTime, totals: Totals) -> Result<()>;

    /// 最终保存, 之后不再接受写入
    fn close(&mut self, at: NaiveDateTime, totals: Totals) -> Result<()>;
}

impl<S: FlushSink + ?Sized> FlushSink for Box<S> {
    fn flush(&mut self, at: NaiveDateTime, totals: Totals) -> Result<()> {
        (**self).flush(at, totals)
    }

    fn close(&mut self, at: NaiveDateTime, totals: Totals) -> Result<()> {
        (**self).close(at, totals)
    }
}

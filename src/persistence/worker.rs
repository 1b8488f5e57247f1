// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 后台持久化线程
//! Background persistence thread fed over a crossbeam channel

use super::writer::PersistenceWriter;
use super::FlushSink;
use crate::counting::Totals;
use crate::error::{CounterError, Result};
use chrono::NaiveDateTime;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::thread::JoinHandle;
use tracing::{error, info, warn};

/// 待写入的计数副本 (主循环 → 持久化线程)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlushRequest {
    pub at: NaiveDateTime,
    pub totals: Totals,
}

/// 持久化线程句柄
///
/// 单个线程按接收顺序依次写文件, 同一文件不会有交错写入。
/// `close` 会先结束线程, 再在调用线程上执行最终保存。
pub struct PersistenceWorker {
    tx: Option<Sender<FlushRequest>>,
    errors: Receiver<CounterError>,
    handle: Option<JoinHandle<PersistenceWriter>>,
}

impl PersistenceWorker {
    pub fn spawn(writer: PersistenceWriter) -> std::io::Result<Self> {
        let (tx, rx) = bounded::<FlushRequest>(16);
        let (err_tx, errors) = unbounded::<CounterError>();

        let handle = std::thread::Builder::new()
            .name("persistence".to_string())
            .spawn(move || {
                info!("✅ 持久化线程启动");
                for request in rx.iter() {
                    if let Err(e) = writer.flush(request.at, request.totals) {
                        error!("❌ 后台保存失败: {}", e);
                        let _ = err_tx.send(e);
                    }
                }
                writer
            })?;

        Ok(Self {
            tx: Some(tx),
            errors,
            handle: Some(handle),
        })
    }

    /// 取出一个后台写入错误 (如果有)
    pub fn take_error(&self) -> Option<CounterError> {
        self.errors.try_recv().ok()
    }

    /// 结束线程, 等待已提交的写入全部完成, 取回 writer
    fn join(&mut self) -> Result<PersistenceWriter> {
        self.tx.take();
        let handle = self.handle.take().ok_or(CounterError::WorkerDisconnected)?;
        handle
            .join()
            .map_err(|_| CounterError::Panicked("persistence worker".to_string()))
    }
}

impl FlushSink for PersistenceWorker {
    fn flush(&mut self, at: NaiveDateTime, totals: Totals) -> Result<()> {
        if let Some(e) = self.take_error() {
            return Err(e);
        }
        let tx = self.tx.as_ref().ok_or(CounterError::WorkerDisconnected)?;
        tx.send(FlushRequest { at, totals })
            .map_err(|_| CounterError::WorkerDisconnected)
    }

    fn close(&mut self, at: NaiveDateTime, totals: Totals) -> Result<()> {
        let writer = self.join()?;
        for e in self.errors.try_iter() {
            warn!("⚠️  未处理的后台保存错误: {}", e);
        }
        writer.flush(at, totals)
    }
}

impl Drop for PersistenceWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::writer::{read_snapshot, AUDIT_HEADER};
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::TempDir;

    fn ts(sec: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(8, 0, sec)
            .unwrap()
    }

    #[test]
    fn test_flushes_in_order_and_final_last() {
        let dir = TempDir::new().unwrap();
        let writer = PersistenceWriter::in_dir(dir.path());
        writer.initialize(ts(0), Totals::default()).unwrap();
        let audit = writer.audit_path().to_path_buf();
        let snapshot = writer.snapshot_path().to_path_buf();

        let mut worker = PersistenceWorker::spawn(writer).unwrap();
        for n in 1..=20u64 {
            worker.flush(ts(n as u32), Totals::new(n, 0)).unwrap();
        }
        worker.close(ts(30), Totals::new(21, 4)).unwrap();

        let text = fs::read_to_string(&audit).unwrap();
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows.len(), 22);
        assert_eq!(rows[0], AUDIT_HEADER);
        for n in 1..=20usize {
            assert!(rows[n].ends_with(&format!(",{},0,{}", n, n)));
        }
        assert_eq!(rows[21], "2024-03-09 08:00:30,21,4,25");
        assert_eq!(read_snapshot(&snapshot).unwrap().counts, Totals::new(21, 4));
    }

    #[test]
    fn test_background_error_is_surfaced() {
        let dir = TempDir::new().unwrap();
        let writer = PersistenceWriter::in_dir(&dir.path().join("gone"));
        let mut worker = PersistenceWorker::spawn(writer).unwrap();

        worker.flush(ts(1), Totals::new(1, 0)).unwrap();
        // 错误在下一次提交或关闭时返回
        let mut surfaced = false;
        for n in 2..200u32 {
            if worker.flush(ts(n % 60), Totals::new(1, 0)).is_err() {
                surfaced = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(surfaced);
        assert!(matches!(
            worker.close(ts(59), Totals::new(1, 0)),
            Err(CounterError::Persistence { .. })
        ));
    }

    #[test]
    fn test_flush_after_close_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut worker = PersistenceWorker::spawn(PersistenceWriter::in_dir(dir.path())).unwrap();
        worker.close(ts(0), Totals::default()).unwrap();
        assert!(matches!(
            worker.flush(ts(1), Totals::default()),
            Err(CounterError::WorkerDisconnected)
        ));
    }
}

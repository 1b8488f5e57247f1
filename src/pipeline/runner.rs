// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 计数主循环 (Counting Loop)
//! 职责: 拉取帧 → 计数 → 每N帧保存 → 任何退出路径都做最终保存
use crate::counting::{LineCounter, Totals};
use crate::error::{CounterError, Result};
use crate::input::FrameSource;
use crate::local_now;
use crate::persistence::FlushSink;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// 退出原因
#[derive(Debug)]
pub enum ExitReason {
    /// 收到停止请求 (Ctrl-C 等)
    StopRequested,
    /// 输入流结束
    EndOfStream,
    /// 输入源失败, 周期保存失败或主循环 panic
    Failed(CounterError),
}

/// 运行结果
#[derive(Debug)]
pub struct RunReport {
    pub reason: ExitReason,
    pub totals: Totals,
    pub frames: u64,
    /// 最终保存的结果
    pub final_flush: Result<()>,
}

impl RunReport {
    pub fn is_error(&self) -> bool {
        matches!(self.reason, ExitReason::Failed(_)) || self.final_flush.is_err()
    }
}

pub struct CountingLoop<K> {
    counter: LineCounter,
    sink: K,
    flush_interval: u64,
    stop: Arc<AtomicBool>,
}

impl<K: FlushSink> CountingLoop<K> {
    pub fn new(counter: LineCounter, sink: K, flush_interval: u64) -> Self {
        Self {
            counter,
            sink,
            flush_interval: flush_interval.max(1),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 使用外部停止标志 (例如 Ctrl-C 处理器)
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn counter(&self) -> &LineCounter {
        &self.counter
    }

    /// 运行直到停止/流结束/失败, 然后执行一次最终保存
    pub fn run<S: FrameSource + ?Sized>(&mut self, source: &mut S) -> RunReport {
        info!(
            "🚀 开始计数 | 计数线 {:.2} | 每 {} 帧保存",
            self.counter.line().position,
            self.flush_interval
        );
        let start = Instant::now();

        let reason = match panic::catch_unwind(AssertUnwindSafe(|| self.drive(source))) {
            Ok(reason) => reason,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("❌ 主循环 panic: {}", message);
                ExitReason::Failed(CounterError::Panicked(message))
            }
        };

        let totals = self.counter.totals();
        let final_flush = self.sink.close(local_now(), totals);
        match &final_flush {
            Ok(()) => info!(
                "💾 最终计数已保存 进: {} 出: {} 总: {}",
                totals.entering(),
                totals.leaving(),
                totals.total()
            ),
            Err(e) => error!("❌ 最终保存失败: {}", e),
        }

        let frames = self.counter.frames_processed();
        let elapsed = start.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            info!("📊 处理 {} 帧, {:.1} 帧/秒", frames, frames as f64 / elapsed);
        }

        RunReport {
            reason,
            totals,
            frames,
            final_flush,
        }
    }

    fn drive<S: FrameSource + ?Sized>(&mut self, source: &mut S) -> ExitReason {
        loop {
            if self.stop.load(Ordering::SeqCst) {
                info!("🛑 收到停止请求");
                return ExitReason::StopRequested;
            }

            let batch = match source.next_frame() {
                Ok(Some(batch)) => batch,
                Ok(None) => {
                    info!("📭 输入流结束");
                    return ExitReason::EndOfStream;
                }
                Err(e) => {
                    error!("❌ 输入源失败: {}", e);
                    return ExitReason::Failed(e);
                }
            };

            let report = self.counter.process_frame(&batch);
            if report.skipped > 0 {
                warn!("⚠️  帧 #{} 跳过 {} 个检测", report.frame_index, report.skipped);
            }

            if report.frame_index % self.flush_interval == 0 {
                let totals = self.counter.totals();
                if let Err(e) = self.sink.flush(local_now(), totals) {
                    error!("❌ 周期保存失败: {}", e);
                    return ExitReason::Failed(e);
                }
                info!(
                    "💾 帧 #{} 进: {} 出: {} 总: {}",
                    report.frame_index,
                    totals.entering(),
                    totals.leaving(),
                    totals.total()
                );
            }
        }
    }
}

/// 请求停止; 第一次请求返回 true
///
/// 重复请求不会跳过最终保存: 主循环在当前帧读取返回后照常退出并保存
pub fn request_stop(stop: &AtomicBool) -> bool {
    !stop.swap(true, Ordering::SeqCst)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

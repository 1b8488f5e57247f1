//! 断线重连
//! Reopens the underlying source on read failures, invisible to the counting core

use super::source::FrameSource;
use crate::detection::FrameBatch;
use crate::error::{CounterError, Result};
use std::time::Duration;
use tracing::{info, warn};

/// 自动重连的帧来源
///
/// `open` 接收已交付的帧数, 可用于从断点继续 (文件) 或直接忽略 (实时流)。
/// 连续失败超过 `max_attempts` 次后返回 `CounterError::Source`。
pub struct ReconnectingSource<S, F> {
    open: F,
    current: Option<S>,
    delivered: u64,
    max_attempts: u32,
    delay: Duration,
}

impl<S, F> ReconnectingSource<S, F>
where
    S: FrameSource,
    F: FnMut(u64) -> Result<S>,
{
    pub fn new(open: F, max_attempts: u32, delay: Duration) -> Self {
        Self {
            open,
            current: None,
            delivered: 0,
            max_attempts,
            delay,
        }
    }

    /// 已交付的帧数
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    fn give_up(&self, failures: u32, cause: CounterError) -> CounterError {
        CounterError::Source(format!(
            "gave up after {} consecutive failures: {}",
            failures, cause
        ))
    }
}

impl<S, F> FrameSource for ReconnectingSource<S, F>
where
    S: FrameSource,
    F: FnMut(u64) -> Result<S>,
{
    fn next_frame(&mut self) -> Result<Option<FrameBatch>> {
        let mut failures = 0u32;
        loop {
            if self.current.is_none() {
                match (self.open)(self.delivered) {
                    Ok(source) => {
                        if failures > 0 {
                            info!("✅ 输入源已重新连接");
                        }
                        self.current = Some(source);
                    }
                    Err(e) => {
                        failures += 1;
                        if failures > self.max_attempts {
                            return Err(self.give_up(failures, e));
                        }
                        warn!("⚠️  打开输入源失败 ({}), {:?} 后重试...", e, self.delay);
                        std::thread::sleep(self.delay);
                        continue;
                    }
                }
            }
            let Some(source) = self.current.as_mut() else {
                continue;
            };

            match source.next_frame() {
                Ok(frame) => {
                    if frame.is_some() {
                        self.delivered += 1;
                    }
                    return Ok(frame);
                }
                Err(e) => {
                    self.current = None;
                    failures += 1;
                    if failures > self.max_attempts {
                        return Err(self.give_up(failures, e));
                    }
                    warn!(
                        "⚠️  Failed to receive frame. Attempting to reconnect... ({})",
                        e
                    );
                    std::thread::sleep(self.delay);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::IterSource;

    fn frame(height: u32) -> Result<FrameBatch> {
        Ok(FrameBatch::new(height, Vec::new()))
    }

    fn broken() -> Result<FrameBatch> {
        Err(CounterError::Source("connection reset".to_string()))
    }

    #[test]
    fn test_reconnects_and_resumes() {
        let mut opens = Vec::new();
        let mut source = ReconnectingSource::new(
            |delivered| {
                opens.push(delivered);
                // 第一次连接在两帧后断开
                let frames = if delivered == 0 {
                    vec![frame(1), frame(2), broken()]
                } else {
                    vec![frame(3)]
                };
                Ok(IterSource::new(frames.into_iter()))
            },
            3,
            Duration::ZERO,
        );

        let heights: Vec<Option<u32>> = std::iter::from_fn(|| source.next_frame().unwrap())
            .map(|f| f.frame_height)
            .collect();
        assert_eq!(heights, vec![Some(1), Some(2), Some(3)]);
        assert_eq!(source.delivered(), 3);
        drop(source);
        assert_eq!(opens, vec![0, 2]);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let mut attempts = 0;
        let mut source = ReconnectingSource::new(
            |_| {
                attempts += 1;
                Ok(IterSource::new(vec![broken()].into_iter()))
            },
            2,
            Duration::ZERO,
        );
        assert!(matches!(source.next_frame(), Err(CounterError::Source(_))));
        drop(source);
        assert_eq!(attempts, 3);
    }

    #[test]
    fn test_open_failures_count() {
        let mut source = ReconnectingSource::new(
            |_| -> Result<IterSource<std::vec::IntoIter<Result<FrameBatch>>>> {
                Err(CounterError::Source("no route to host".to_string()))
            },
            0,
            Duration::ZERO,
        );
        assert!(source.next_frame().is_err());
    }

    #[test]
    fn test_invalid_utf8_does_not_trigger_reconnect() {
        use crate::input::NdjsonSource;
        use std::io::Cursor;

        let bytes: &[u8] = b"{\"frame_height\": 1}\n\xff\n{\"frame_height\": 2}\n";
        let mut opens = 0;
        let mut source = ReconnectingSource::new(
            |delivered| {
                opens += 1;
                NdjsonSource::new(Cursor::new(bytes)).resume_after(delivered)
            },
            5,
            Duration::ZERO,
        );

        let heights: Vec<Option<u32>> = std::iter::from_fn(|| source.next_frame().unwrap())
            .map(|f| f.frame_height)
            .collect();
        assert_eq!(heights, vec![Some(1), Some(2)]);
        drop(source);
        assert_eq!(opens, 1);
    }
}

// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// NDJSON检测流
/// One JSON frame record per line:
/// `{"frame_height": 720, "detections": [{"track_id": 7, "bbox": [x1, y1, x2, y2], "class_id": 2, "confidence": 0.91}]}`
use super::source::FrameSource;
use crate::detection::{FrameBatch, RawDetection};
use crate::error::{CounterError, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use tracing::warn;

#[derive(Deserialize)]
struct FrameRecord {
    #[serde(default)]
    frame_height: Option<u32>,
    #[serde(default)]
    detections: Vec<serde_json::Value>,
}

/// 解析一行帧记录; 单个检测解析失败只计入 `malformed`
pub fn parse_frame(text: &str) -> Result<FrameBatch> {
    let record: FrameRecord =
        serde_json::from_str(text).map_err(|e| CounterError::MalformedFrame(e.to_string()))?;

    let mut batch = FrameBatch {
        frame_height: record.frame_height,
        detections: Vec::with_capacity(record.detections.len()),
        malformed: 0,
    };
    for value in record.detections {
        match serde_json::from_value::<RawDetection>(value) {
            Ok(detection) => batch.detections.push(detection),
            Err(e) => {
                warn!("⚠️  丢弃无法解析的检测: {}", e);
                batch.malformed += 1;
            }
        }
    }
    Ok(batch)
}

pub struct NdjsonSource<R> {
    reader: R,
    line: Vec<u8>,
    line_no: u64,
}

impl NdjsonSource<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            CounterError::Source(format!("cannot open {}: {}", path.display(), e))
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl NdjsonSource<BufReader<io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(io::stdin()))
    }
}

impl<R: BufRead> NdjsonSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
            line_no: 0,
        }
    }

    /// 已读取的行数
    pub fn line_number(&self) -> u64 {
        self.line_no
    }

    /// 跳过前 `frames` 个有效帧 (重新打开文件后从断点继续)
    pub fn resume_after(mut self, frames: u64) -> Result<Self> {
        for _ in 0..frames {
            if self.next_frame()?.is_none() {
                break;
            }
        }
        Ok(self)
    }
}

impl<R: BufRead> FrameSource for NdjsonSource<R> {
    fn next_frame(&mut self) -> Result<Option<FrameBatch>> {
        loop {
            self.line.clear();
            let n = self.reader.read_until(b'\n', &mut self.line).map_err(|e| {
                CounterError::Source(format!("read failed after line {}: {}", self.line_no, e))
            })?;
            if n == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            // 非UTF-8行与其他非法行一样跳过
            let text = match std::str::from_utf8(&self.line) {
                Ok(text) => text.trim(),
                Err(e) => {
                    let e = CounterError::MalformedFrame(format!("invalid UTF-8: {}", e));
                    warn!("⚠️  丢弃第 {} 行: {}", self.line_no, e);
                    continue;
                }
            };
            if text.is_empty() {
                continue;
            }
            match parse_frame(text) {
                Ok(batch) => return Ok(Some(batch)),
                Err(e) => warn!("⚠️  丢弃第 {} 行: {}", self.line_no, e),
            }
        }
    }
}

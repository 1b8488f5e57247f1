// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 计数文件写入
//! Append-only CSV audit log + atomically replaced JSON snapshot

use super::FlushSink;
use crate::config::CounterConfig;
use crate::counting::Totals;
use crate::error::{CounterError, Result};
use crate::format_timestamp;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 追加日志表头
pub const AUDIT_HEADER: &str = "Timestamp,Entering,Leaving,Total";

/// 最新快照文件内容
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub last_updated: String,
    pub counts: Totals,
    pub total: u64,
}

impl SnapshotDocument {
    pub fn new(at: &NaiveDateTime, totals: Totals) -> Self {
        Self {
            last_updated: format_timestamp(at),
            counts: totals,
            total: totals.total(),
        }
    }
}

/// 读取快照文件
pub fn read_snapshot(path: &Path) -> Result<SnapshotDocument> {
    let json = fs::read_to_string(path).map_err(|e| CounterError::persistence(path, e))?;
    Ok(serde_json::from_str(&json)?)
}

#[derive(Clone, Debug)]
pub struct PersistenceWriter {
    audit_path: PathBuf,
    snapshot_path: PathBuf,
}

impl PersistenceWriter {
    pub fn new(audit_path: impl Into<PathBuf>, snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            audit_path: audit_path.into(),
            snapshot_path: snapshot_path.into(),
        }
    }

    /// 使用默认文件名 (vehicle_counts.csv / current_totals.json)
    pub fn in_dir(storage_location: &Path) -> Self {
        let defaults = CounterConfig::default();
        Self::new(
            storage_location.join(defaults.audit_log_name),
            storage_location.join(defaults.snapshot_name),
        )
    }

    pub fn from_config(config: &CounterConfig) -> Self {
        Self::new(config.audit_log_path(), config.snapshot_path())
    }

    pub fn audit_path(&self) -> &Path {
        &self.audit_path
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// 初始化计数文件: 日志不存在时写表头 (可重复调用), 并写出当前快照
    pub fn initialize(&self, at: NaiveDateTime, totals: Totals) -> Result<()> {
        let file = self.open_audit_log()?;
        drop(file);
        self.write_snapshot(at, totals)?;
        info!(
            "✅ 计数文件就绪: {} | {}",
            self.audit_path.display(),
            self.snapshot_path.display()
        );
        Ok(())
    }

    /// 追加一行 (Timestamp,Entering,Leaving,Total)
    pub fn append_record(&self, at: NaiveDateTime, totals: Totals) -> Result<()> {
        let row = format!(
            "{},{},{},{}\n",
            format_timestamp(&at),
            totals.entering(),
            totals.leaving(),
            totals.total()
        );
        let mut file = self.open_audit_log()?;
        file.write_all(row.as_bytes())
            .and_then(|_| file.sync_data())
            .map_err(|e| CounterError::persistence(&self.audit_path, e))
    }

    /// 整体替换快照: 先写临时文件, 再 rename
    pub fn write_snapshot(&self, at: NaiveDateTime, totals: Totals) -> Result<()> {
        let document = SnapshotDocument::new(&at, totals);
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        document.serialize(&mut ser)?;

        let tmp_path = self.tmp_snapshot_path();
        let written = File::create(&tmp_path)
            .and_then(|mut file| {
                file.write_all(&buf)?;
                file.sync_all()
            })
            .and_then(|_| fs::rename(&tmp_path, &self.snapshot_path));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(CounterError::persistence(&self.snapshot_path, e));
        }
        Ok(())
    }

    /// 追加日志 + 快照, 两者都会尝试, 返回第一个错误
    pub fn flush(&self, at: NaiveDateTime, totals: Totals) -> Result<()> {
        let appended = self.append_record(at, totals);
        let replaced = self.write_snapshot(at, totals);
        debug!(
            "💾 保存计数 进: {} 出: {} 总: {}",
            totals.entering(),
            totals.leaving(),
            totals.total()
        );
        appended.and(replaced)
    }

    fn open_audit_log(&self) -> Result<File> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_path)
            .map_err(|e| CounterError::persistence(&self.audit_path, e))?;
        let len = file
            .metadata()
            .map_err(|e| CounterError::persistence(&self.audit_path, e))?
            .len();
        if len == 0 {
            writeln!(file, "{}", AUDIT_HEADER)
                .and_then(|_| file.sync_data())
                .map_err(|e| CounterError::persistence(&self.audit_path, e))?;
        }
        Ok(file)
    }

    fn tmp_snapshot_path(&self) -> PathBuf {
        let mut name = self
            .snapshot_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.snapshot_path.with_file_name(name)
    }
}

impl FlushSink for PersistenceWriter {
    fn flush(&mut self, at: NaiveDateTime, totals: Totals) -> Result<()> {
        PersistenceWriter::flush(self, at, totals)
    }

    fn close(&mut self, at: NaiveDateTime, totals: Totals) -> Result<()> {
        PersistenceWriter::flush(self, at, totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn ts(sec: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, sec)
            .unwrap()
    }

    fn lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let writer = PersistenceWriter::in_dir(dir.path());
        writer.initialize(ts(0), Totals::default()).unwrap();
        writer.append_record(ts(1), Totals::new(1, 0)).unwrap();
        writer.initialize(ts(2), Totals::default()).unwrap();

        let rows = lines(writer.audit_path());
        assert_eq!(rows, vec![AUDIT_HEADER, "2024-03-09 14:05:01,1,0,1"]);
    }

    #[test]
    fn test_audit_log_append_only() {
        let dir = TempDir::new().unwrap();
        let writer = PersistenceWriter::in_dir(dir.path());
        writer.initialize(ts(0), Totals::default()).unwrap();

        let mut previous = lines(writer.audit_path());
        for n in 1..=5u32 {
            writer.flush(ts(n), Totals::new(u64::from(n), 1)).unwrap();
            let current = lines(writer.audit_path());
            assert_eq!(current.len(), n as usize + 1);
            assert_eq!(&current[..previous.len()], &previous[..]);
            previous = current;
        }
        assert_eq!(previous[5], "2024-03-09 14:05:05,5,1,6");
    }

    #[test]
    fn test_snapshot_document_layout() {
        let dir = TempDir::new().unwrap();
        let writer = PersistenceWriter::in_dir(dir.path());
        writer.write_snapshot(ts(7), Totals::new(3, 2)).unwrap();

        let text = fs::read_to_string(writer.snapshot_path()).unwrap();
        let expected = "{\n    \"last_updated\": \"2024-03-09 14:05:07\",\n    \"counts\": {\n        \"entering\": 3,\n        \"leaving\": 2\n    },\n    \"total\": 5\n}";
        assert_eq!(text, expected);

        let doc = read_snapshot(writer.snapshot_path()).unwrap();
        assert_eq!(doc.counts, Totals::new(3, 2));
        assert_eq!(doc.total, 5);
        assert!(!writer.tmp_snapshot_path().exists());
    }

    #[test]
    fn test_snapshot_idempotent_except_timestamp() {
        let dir = TempDir::new().unwrap();
        let writer = PersistenceWriter::in_dir(dir.path());
        let totals = Totals::new(4, 4);

        writer.write_snapshot(ts(10), totals).unwrap();
        let first = fs::read_to_string(writer.snapshot_path()).unwrap();
        writer.write_snapshot(ts(11), totals).unwrap();
        let second = fs::read_to_string(writer.snapshot_path()).unwrap();

        assert_ne!(first, second);
        assert_eq!(
            first.replace("14:05:10", "<ts>"),
            second.replace("14:05:11", "<ts>")
        );
    }

    #[test]
    fn test_missing_directory_is_reported() {
        let dir = TempDir::new().unwrap();
        let writer = PersistenceWriter::in_dir(&dir.path().join("missing"));
        let err = writer.flush(ts(0), Totals::new(1, 1)).unwrap_err();
        assert!(matches!(err, CounterError::Persistence { .. }));
        assert!(writer.initialize(ts(0), Totals::default()).is_err());
    }
}

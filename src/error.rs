// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 错误类型
//! Error taxonomy for the I/O boundaries (input parsing, persistence, config)

use std::path::PathBuf;

/// Result type alias
pub type Result<T> = std::result::Result<T, CounterError>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum CounterError {
    /// 持久化失败 (磁盘满, 权限不足, 路径不存在)
    #[error("Persistence error at {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 输入源不可恢复 (重连次数耗尽)
    #[error("Source error: {0}")]
    Source(String),

    /// 单个检测框格式错误 (该帧内跳过)
    #[error("Malformed detection: {0}")]
    MalformedDetection(String),

    /// 整帧格式错误 (跳过该帧)
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Config error
    #[error("Config error: {0}")]
    Config(String),

    /// 后台持久化线程已退出
    #[error("Persistence worker disconnected")]
    WorkerDisconnected,

    /// 主循环 panic
    #[error("Counting loop panicked: {0}")]
    Panicked(String),
}

impl CounterError {
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}

// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 计数器配置 - 命令行参数 + JSON文件

use crate::counting::CountingLine;
use crate::detection::{DetectionFilter, VEHICLE_CLASSES};
use crate::error::{CounterError, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

/// 越线车辆计数参数
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about = "越线车辆计数 - Line-crossing vehicle counter", long_about = None)]
pub struct Args {
    /// 检测结果输入 (NDJSON文件/管道路径, "-" 表示标准输入)
    #[arg(short, long, env = "DETECTION_SOURCE", default_value = "-")]
    pub source: String,

    /// 配置文件路径
    #[arg(short, long, default_value = "counter_config.json")]
    pub config: PathBuf,

    /// 计数线位置 (帧高度比例)
    #[arg(long)]
    pub line_position: Option<f64>,

    /// 每隔多少帧保存一次
    #[arg(long)]
    pub flush_interval: Option<u64>,

    /// 输出目录
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// 轨迹多少帧未出现后淘汰
    #[arg(long)]
    pub track_ttl: Option<u64>,

    /// 在后台线程中写文件
    #[arg(long)]
    pub background_flush: bool,
}

/// 计数器参数配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    // === 计数线 ===
    pub line_position: f64, // 计数线位置 (帧高度比例)
    pub line_offset: i32,   // 预留: 滞回带宽度
    pub frame_height: u32,  // 帧记录缺少高度时的默认值

    // === 检测过滤 ===
    pub classes: Vec<u32>,   // 计数的类别, 为空表示全部
    pub min_confidence: f32, // 最低置信度

    // === 轨迹记忆 ===
    pub track_ttl_frames: Option<u64>, // 过期淘汰窗口, null 表示不淘汰

    // === 持久化 ===
    pub flush_interval_frames: u64, // 保存间隔 (帧)
    pub storage_location: PathBuf,  // 输出目录
    pub audit_log_name: String,     // 追加日志文件名
    pub snapshot_name: String,      // 最新快照文件名
    pub background_flush: bool,     // 后台线程写文件

    // === 输入源重连 ===
    pub reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            line_position: 0.5,
            line_offset: 20,
            frame_height: 720,

            classes: VEHICLE_CLASSES.to_vec(),
            min_confidence: 0.5,

            track_ttl_frames: None,

            flush_interval_frames: 30,
            storage_location: PathBuf::from("vehicle_counts"),
            audit_log_name: String::from("vehicle_counts.csv"),
            snapshot_name: String::from("current_totals.json"),
            background_flush: false,

            reconnect_attempts: 5,
            reconnect_delay_ms: 1000,
        }
    }
}

impl CounterConfig {
    /// 从JSON文件加载配置
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                config.save(path);
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    error!("❌ 保存配置失败: {}", e);
                } else {
                    info!("💾 配置已保存到 {}", path.display());
                }
            }
            Err(e) => error!("❌ 序列化配置失败: {}", e),
        }
    }

    /// 命令行参数覆盖文件配置
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(position) = args.line_position {
            self.line_position = position;
        }
        if let Some(interval) = args.flush_interval {
            self.flush_interval_frames = interval;
        }
        if let Some(dir) = &args.output_dir {
            self.storage_location = dir.clone();
        }
        if let Some(ttl) = args.track_ttl {
            self.track_ttl_frames = Some(ttl);
        }
        if args.background_flush {
            self.background_flush = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.line_position) {
            return Err(CounterError::Config(format!(
                "line_position must be within [0, 1], got {}",
                self.line_position
            )));
        }
        if self.flush_interval_frames == 0 {
            return Err(CounterError::Config(
                "flush_interval_frames must be at least 1".to_string(),
            ));
        }
        if self.track_ttl_frames == Some(0) {
            return Err(CounterError::Config(
                "track_ttl_frames must be at least 1".to_string(),
            ));
        }
        if self.audit_log_name.is_empty() || self.snapshot_name.is_empty() {
            return Err(CounterError::Config("output file names must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn counting_line(&self) -> CountingLine {
        CountingLine::new(self.line_position, self.line_offset)
    }

    pub fn detection_filter(&self) -> DetectionFilter {
        DetectionFilter {
            classes: self.classes.clone(),
            min_confidence: self.min_confidence,
        }
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.storage_location.join(&self.audit_log_name)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.storage_location.join(&self.snapshot_name)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!("🎛️  当前计数配置:");
        info!("  计数线位置: {:.2} (预留偏移 {})", self.line_position, self.line_offset);
        info!("  计数类别: {:?} 置信度 >= {:.2}", self.classes, self.min_confidence);
        info!("  保存间隔: 每 {} 帧", self.flush_interval_frames);
        info!("  输出目录: {}", self.storage_location.display());
        match self.track_ttl_frames {
            Some(ttl) => info!("  轨迹淘汰: {} 帧未出现", ttl),
            None => info!("  轨迹淘汰: 关闭"),
        }
        if self.background_flush {
            info!("  持久化: 后台线程");
        }
    }
}

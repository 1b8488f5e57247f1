// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 越线车辆计数 (Line-Crossing Vehicle Counter)
///
/// 读取外部检测/跟踪器输出的逐帧检测结果 (NDJSON),
/// 统计越过水平计数线的进/出数量, 并持续写入:
/// - vehicle_counts.csv:   追加日志
/// - current_totals.json:  最新快照
///
/// 直接运行: cargo run --bin vehicle-counter --release -- --source detections.ndjson
use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vehicle_counter_rs::input::{FrameSource, NdjsonSource, ReconnectingSource};
use vehicle_counter_rs::pipeline::request_stop;
use vehicle_counter_rs::{
    local_now, Args, CounterConfig, CountingLoop, ExitReason, FlushSink, LineCounter,
    PersistenceWorker, PersistenceWriter, RunReport, Totals,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("vehicle_counter_rs=info,vehicle_counter=info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    let mut config = CounterConfig::load(&args.config);
    config.apply_args(&args);
    config.validate()?;
    config.print_summary();

    println!("🚀 越线计数系统启动");
    println!("📹 检测输入: {}", args.source);
    println!("📁 输出目录: {}", config.storage_location.display());
    println!();

    // ========== 输出文件 ==========
    fs::create_dir_all(&config.storage_location).with_context(|| {
        format!("创建输出目录失败: {}", config.storage_location.display())
    })?;
    let writer = PersistenceWriter::from_config(&config);
    writer
        .initialize(local_now(), Totals::default())
        .context("初始化计数文件失败")?;

    // ========== 停止信号 ==========
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        // 重复信号只提示, 不强制退出: 最终保存必须执行
        ctrlc::set_handler(move || {
            if request_stop(&stop) {
                eprintln!("🛑 收到停止信号, 正在保存最终计数...");
            } else {
                eprintln!("⏳ 正在停止, 等待当前帧读取结束后保存最终计数...");
            }
        })
        .context("注册 Ctrl-C 处理器失败")?;
    }

    // ========== 检测输入 ==========
    let mut source = open_source(&args.source, &config);

    // ========== 主循环 ==========
    let counter = LineCounter::from_config(&config);
    let sink: Box<dyn FlushSink> = if config.background_flush {
        Box::new(PersistenceWorker::spawn(writer).context("启动持久化线程失败")?)
    } else {
        Box::new(writer)
    };
    let report = CountingLoop::new(counter, sink, config.flush_interval_frames)
        .with_stop_flag(stop)
        .run(&mut source);

    print_exit(&report);
    if report.is_error() {
        std::process::exit(1);
    }
    Ok(())
}

/// "-" 读标准输入, 否则打开文件/管道并自动重连
fn open_source(source: &str, config: &CounterConfig) -> Box<dyn FrameSource> {
    if source == "-" {
        return Box::new(NdjsonSource::stdin());
    }

    let path = PathBuf::from(source);
    // 普通文件重新打开后从断点继续, 管道/设备直接读取新数据
    let resumable = fs::metadata(&path).map(|m| m.is_file()).unwrap_or(false);
    Box::new(ReconnectingSource::new(
        move |delivered| {
            let reader = NdjsonSource::open(&path)?;
            if resumable {
                reader.resume_after(delivered)
            } else {
                Ok(reader)
            }
        },
        config.reconnect_attempts,
        config.reconnect_delay(),
    ))
}

fn print_exit(report: &RunReport) {
    println!();
    match &report.reason {
        ExitReason::StopRequested => println!("🛑 已按请求停止"),
        ExitReason::EndOfStream => println!("✅ 输入流结束, 正常退出"),
        ExitReason::Failed(e) => println!("❌ 因错误停止: {}", e),
    }
    println!(
        "📊 共处理 {} 帧 | 进: {} 出: {} 总: {}",
        report.frames,
        report.totals.entering(),
        report.totals.leaving(),
        report.totals.total()
    );
    if let Err(e) = &report.final_flush {
        println!("❌ 最终计数未能保存: {}", e);
    }
}

// src/main.rs
mod args;
mod config;
mod drivers;
mod engine;
mod recorder;
mod types;

use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;

use crate::args::Args;
use crate::config::SessionConfig;
use crate::drivers::{
    render_frame_png, DisplayFrame, ManualOpener, PlotStyle, PortOpener, SerialOpener,
};
use crate::types::{EngineMessage, HostCommand};

const REPLAY_PORT: &str = "REPLAY";

// 处理一条来自采集线程的消息; 返回 false 表示线程已停止
fn on_message(msg: EngineMessage, last_frame: &mut Option<DisplayFrame>) -> bool {
    match msg {
        // 引擎线程已经通过 log 输出
        EngineMessage::Log(_) => {}
        EngineMessage::Ports(ports) => log::info!("available ports: {ports:?}"),
        EngineMessage::PortStatus { slot, open } => {
            log::info!("device {}: {}", slot + 1, if open { "open" } else { "closed" })
        }
        EngineMessage::Display(frame) => *last_frame = Some(frame),
        EngineMessage::CalibrationStatus { sensor, state, curve } => {
            log::info!("{sensor}: {state:?} {curve:?}")
        }
        EngineMessage::RecordingStatus(state) => log::info!("recording: {state:?}"),
        EngineMessage::Saved { path, rows } => {
            println!("💾 {rows} rows -> {}", path.display())
        }
        EngineMessage::Stopped => return false,
    }
    true
}

// 入口函数
fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_filter()))
        .init();

    if args.list_ports {
        for port in SerialOpener.available_ports() {
            println!("{port}");
        }
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    args.apply_overrides(&mut config);
    config.validate().context("invalid session config")?;

    let mut ports = args.port.clone();
    let opener: Box<dyn PortOpener> = match &args.replay {
        Some(path) => {
            let capture = std::fs::read(path)
                .with_context(|| format!("failed to read replay {}", path.display()))?;
            let mut manual = ManualOpener::new();
            // 每次读取只交出 max_lines_per_tick 行, 避免积压被裁剪
            let replay = manual.add_port(REPLAY_PORT);
            replay.pace_lines(config.max_lines_per_tick);
            replay.push(&capture);
            ports = vec![REPLAY_PORT.to_string()];
            Box::new(manual)
        }
        None => Box::new(SerialOpener),
    };
    if ports.is_empty() && config.test_mode {
        // 无硬件时用模拟设备
        ports.push("TEST1".to_string());
    }
    if ports.len() > config.port_count {
        log::warn!("only {} device slots, ignoring extra ports", config.port_count);
        ports.truncate(config.port_count);
    }

    let (tx, rx) = mpsc::channel();
    let (tx_cmd, rx_cmd) = mpsc::channel();
    tx_cmd.send(HostCommand::RefreshPorts)?;
    for (slot, port) in ports.iter().enumerate() {
        tx_cmd.send(HostCommand::ActivatePort { slot, port: port.clone() })?;
        for &channel in &args.channels {
            if channel == 0 || channel > config.channel_count_per_port {
                log::warn!("skipping channel {channel}");
                continue;
            }
            tx_cmd.send(HostCommand::ToggleChannel { slot, channel: channel - 1, enabled: true })?;
        }
    }
    if args.recording() {
        tx_cmd.send(HostCommand::StartRecording)?;
    }
    let handle = engine::spawn_thread(config, opener, tx, rx_cmd);

    let mut last_frame = None;
    let mut running = true;
    let deadline = Instant::now() + Duration::from_secs_f64(args.duration.max(0.0));
    while running && Instant::now() < deadline {
        if let Ok(msg) = rx.recv_timeout(Duration::from_millis(50)) {
            running = on_message(msg, &mut last_frame);
        }
    }

    if running {
        if args.recording() {
            tx_cmd.send(HostCommand::StopRecording).ok();
        }
        if let Some(path) = &args.csv {
            tx_cmd.send(HostCommand::SaveCsv(path.clone())).ok();
        }
        tx_cmd.send(HostCommand::Shutdown).ok();
        while let Ok(msg) = rx.recv_timeout(Duration::from_secs(5)) {
            if !on_message(msg, &mut last_frame) {
                break;
            }
        }
    }
    handle
        .join()
        .map_err(|_| anyhow::anyhow!("acquisition thread panicked"))?;

    if let Some(path) = &args.plot {
        match last_frame {
            Some(frame) if !frame.is_empty() => {
                let png = render_frame_png(&frame, PlotStyle::default())?;
                std::fs::write(path, png)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("🖼️ plot -> {}", path.display());
            }
            _ => log::warn!("no samples to plot, skipping {}", path.display()),
        }
    }
    Ok(())
}

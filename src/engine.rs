// src/engine.rs
use crate::config::SessionConfig;
use crate::drivers::{AcquisitionSession, CalibrationState, DisplayFrame, DisplaySink, PortOpener};
use crate::recorder;
use crate::types::*;
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

// 每个 tick 之间最多处理的命令数
const MAX_COMMANDS_PER_TICK: usize = 10;

/// Forwards display refreshes to the host thread.
struct ChannelDisplay<'a> {
    tx: &'a Sender<EngineMessage>,
}

impl DisplaySink for ChannelDisplay<'_> {
    fn refresh(&mut self, frame: DisplayFrame) {
        self.tx.send(EngineMessage::Display(frame)).ok();
    }
}

fn log_to_host(tx: &Sender<EngineMessage>, msg: String) {
    log::info!("{msg}");
    tx.send(EngineMessage::Log(msg)).ok();
}

fn warn_to_host(tx: &Sender<EngineMessage>, msg: String) {
    log::warn!("{msg}");
    tx.send(EngineMessage::Log(msg)).ok();
}

fn send_calibration_status(
    tx: &Sender<EngineMessage>,
    session: &AcquisitionSession,
    sensor: SensorId,
    state: CalibrationState,
) {
    let curve = session.calibration_curve(&sensor);
    tx.send(EngineMessage::CalibrationStatus { sensor, state, curve }).ok();
}

/// Applies one host command. Returns false once the engine should stop.
pub fn handle_command(
    session: &mut AcquisitionSession,
    cmd: HostCommand,
    now: Instant,
    tx: &Sender<EngineMessage>,
) -> bool {
    match cmd {
        HostCommand::RefreshPorts => {
            tx.send(EngineMessage::Ports(session.available_ports())).ok();
        }
        HostCommand::ActivatePort { slot, port } => match session.activate_port(slot, &port) {
            Ok(()) => {
                log_to_host(tx, format!("✅ Device {} on {port}", slot + 1));
                tx.send(EngineMessage::PortStatus { slot, open: session.is_source_open(slot) }).ok();
            }
            Err(e) => warn_to_host(tx, format!("❌ {e}")),
        },
        HostCommand::DeactivatePort(slot) => match session.deactivate_port(slot) {
            Ok(()) => {
                tx.send(EngineMessage::PortStatus { slot, open: false }).ok();
            }
            Err(e) => warn_to_host(tx, format!("❌ {e}")),
        },
        HostCommand::ReopenPort(slot) => match session.reopen_port(slot) {
            Ok(()) => {
                tx.send(EngineMessage::PortStatus { slot, open: true }).ok();
            }
            Err(e) => warn_to_host(tx, format!("❌ {e}")),
        },
        HostCommand::ToggleChannel { slot, channel, enabled } => {
            match session.set_channel(slot, channel, enabled) {
                // 重新启用的通道显示为未校准 (曲线本身保留)
                Ok(sensor) if enabled => send_calibration_status(
                    tx,
                    session,
                    sensor,
                    CalibrationState::Uncalibrated,
                ),
                Ok(_) => {}
                Err(e) => warn_to_host(tx, format!("❌ {e}")),
            }
        }
        HostCommand::SetTestMode(on) => {
            session.set_test_mode(on);
            log_to_host(tx, format!("🧪 Test mode {}", if on { "on" } else { "off" }));
        }
        HostCommand::CapturePoint { slot, channel, point, reference } => {
            match session.capture_point(slot, channel, point, &reference) {
                Ok(_) => {
                    if let Ok(sensor) = session.sensor_id(slot, channel) {
                        let state = session.calibration_state(&sensor);
                        send_calibration_status(tx, session, sensor, state);
                    }
                }
                Err(e) => warn_to_host(tx, format!("⚠️ point {point} not captured: {e}")),
            }
        }
        HostCommand::ConfirmCalibration { slot, channel } => {
            match session.confirm_calibration(slot, channel) {
                Ok(_) => {
                    if let Ok(sensor) = session.sensor_id(slot, channel) {
                        let state = session.calibration_state(&sensor);
                        send_calibration_status(tx, session, sensor, state);
                    }
                }
                Err(e) => warn_to_host(tx, format!("⚠️ calibration not confirmed: {e}")),
            }
        }
        HostCommand::ZeroSensor { slot, channel } => match session.zero_sensor(slot, channel) {
            Ok(offset) => log_to_host(tx, format!("0️⃣ zero offset {offset:.3}")),
            Err(e) => warn_to_host(tx, format!("⚠️ zero not captured: {e}")),
        },
        HostCommand::StartRecording => {
            session.start_recording(now);
            tx.send(EngineMessage::RecordingStatus(session.recording_state())).ok();
        }
        HostCommand::PauseRecording => {
            let state = session.toggle_pause();
            tx.send(EngineMessage::RecordingStatus(state)).ok();
        }
        HostCommand::StopRecording => {
            session.stop_recording();
            tx.send(EngineMessage::RecordingStatus(RecordingState::Idle)).ok();
        }
        HostCommand::ClearDisplay => session.clear_display(),
        HostCommand::SaveCsv(path) => {
            match recorder::save_csv(&path, &session.columns(), session.rows()) {
                Ok(rows) => {
                    tx.send(EngineMessage::Saved { path, rows }).ok();
                }
                Err(e) => warn_to_host(tx, format!("❌ save failed: {e:#}")),
            }
        }
        HostCommand::Shutdown => return false,
    }
    true
}

/// Runs the fixed-period acquisition loop on its own thread.
///
/// Commands are applied between ticks on the same thread, so the session
/// never sees concurrent access.
pub fn spawn_thread(
    config: SessionConfig,
    opener: Box<dyn PortOpener>,
    tx: Sender<EngineMessage>,
    rx_cmd: Receiver<HostCommand>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let period = Duration::from_millis(config.tick_period_ms);
        let mut session = match AcquisitionSession::new(config, opener) {
            Ok(s) => s,
            Err(e) => {
                warn_to_host(&tx, format!("❌ {e}"));
                tx.send(EngineMessage::Stopped).ok();
                return;
            }
        };
        log_to_host(&tx, "⚙️ Acquisition engine ready.".to_owned());
        let mut next_tick = Instant::now();
        'run: loop {
            // 1. 命令处理
            for _ in 0..MAX_COMMANDS_PER_TICK {
                let cmd = match rx_cmd.try_recv() {
                    Ok(cmd) => cmd,
                    Err(TryRecvError::Empty) => break,
                    // 主机已退出
                    Err(TryRecvError::Disconnected) => break 'run,
                };
                if !handle_command(&mut session, cmd, Instant::now(), &tx) {
                    break 'run;
                }
            }
            // 2. 采集
            let report = session.on_tick(Instant::now(), &mut ChannelDisplay { tx: &tx });
            for slot in report.closed {
                tx.send(EngineMessage::PortStatus { slot, open: false }).ok();
            }
            // 3. 固定周期; 落后时不追赶
            next_tick += period;
            let now = Instant::now();
            if next_tick > now {
                thread::sleep(next_tick - now);
            } else {
                next_tick = now;
            }
        }
        session.stop_recording();
        log_to_host(&tx, "🛑 Acquisition engine stopped.".to_owned());
        tx.send(EngineMessage::Stopped).ok();
    })
}

// src/types.rs
use std::fmt;
use std::path::PathBuf;

use crate::drivers::{CalibrationCurve, CalibrationState, DisplayFrame};

/// One (port, channel) pair. Valid while the port stays activated.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SensorId {
    pub port: String,
    pub channel: usize,
}

impl SensorId {
    pub fn new(port: impl Into<String>, channel: usize) -> Self {
        Self { port: port.into(), channel }
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 通道编号对用户从 1 开始
        write!(f, "{}_ch{}", self.port, self.channel + 1)
    }
}

// 录制状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
    Paused,
}

// 主机发给采集线程的命令
#[derive(Clone, Debug)]
pub enum HostCommand {
    RefreshPorts,
    ActivatePort { slot: usize, port: String },
    DeactivatePort(usize),
    ReopenPort(usize),
    ToggleChannel { slot: usize, channel: usize, enabled: bool },
    SetTestMode(bool),
    // 校准: point 取 1..=3, reference 为用户输入的原始文本
    CapturePoint { slot: usize, channel: usize, point: usize, reference: String },
    ConfirmCalibration { slot: usize, channel: usize },
    ZeroSensor { slot: usize, channel: usize },
    StartRecording,
    PauseRecording,
    StopRecording,
    ClearDisplay,
    SaveCsv(PathBuf),
    Shutdown,
}

// 采集线程发给主机的消息
#[derive(Clone, Debug)]
pub enum EngineMessage {
    Log(String),
    Ports(Vec<String>),
    PortStatus { slot: usize, open: bool },
    Display(DisplayFrame),
    CalibrationStatus {
        sensor: SensorId,
        state: CalibrationState,
        curve: Option<CalibrationCurve>,
    },
    RecordingStatus(RecordingState),
    Saved { path: PathBuf, rows: usize },
    Stopped,
}

// src/drivers/mod.rs
// 采集核心: 解析 -> 通道源 -> 校准 -> 环形缓冲 -> 行/显示输出
pub mod buffer;
pub mod calibration;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod plot;
pub mod rows;
pub mod source;
pub mod synth;
pub mod transport;
// 公开导出这些模块里的结构体，方便外部调用
pub use buffer::{DisplayFrame, SeriesSet};
pub use calibration::{
    CalibrationCurve, CalibrationEngine, CalibrationPoint, CalibrationState, ZeroMode,
};
pub use error::AcquisitionError;
pub use parser::LineParser;
pub use pipeline::{AcquisitionSession, DisplaySink};
pub use plot::{render_frame_png, PlotStyle};
pub use rows::{RecordingRow, RowAssembler};
pub use source::ChannelSource;
pub use synth::SyntheticGenerator;
pub use transport::{ManualOpener, PortOpener, SerialOpener, Transport};

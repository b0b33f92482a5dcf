use thiserror::Error;
use crate::types::SensorId;
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("invalid session config: {0}")]
    InvalidConfig(String),
    #[error("port slot {slot} out of range (session has {count} slots)")]
    UnknownSlot { slot: usize, count: usize },
    #[error("port slot {0} is not active")]
    SlotInactive(usize),
    #[error("channel {channel} out of range (ports carry {count} channels)")]
    ChannelOutOfRange { channel: usize, count: usize },
    #[error("failed to open port {port}: {reason}")]
    PortOpen { port: String, reason: String },
    #[error("transport error on {port}: {source}")]
    Transport {
        port: String,
        #[source]
        source: std::io::Error,
    },
    #[error("calibration point must be 1, 2 or 3 (got {0})")]
    InvalidPointSlot(usize),
    #[error("reference value {0:?} is not a number")]
    InvalidReference(String),
    #[error("{0} has no live reading yet")]
    NoLiveValue(SensorId),
    #[error("calibration needs at least 2 complete points, {have} captured")]
    InsufficientPoints { have: usize },
    #[error("failed to render plot: {0}")]
    Plot(String),
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for AcquisitionError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        AcquisitionError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for AcquisitionError {
    fn from(value: image::ImageError) -> Self {
        AcquisitionError::Plot(value.to_string())
    }
}

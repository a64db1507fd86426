use thiserror::Error;

use crate::bus::BusError;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("sample rate must be greater than zero")]
    InvalidSampleRate,
    #[error("window length must be positive")]
    InvalidWindow,
    #[error("moving average length must be at least 1")]
    InvalidMovingAverage,
    #[error("transform size {0} is not a power of two")]
    FftSizeNotPowerOfTwo(usize),
    #[error("analysis window needs {needed} samples but transform size is {fft_size}")]
    WindowExceedsFft { needed: usize, fft_size: usize },
    #[error("analysis window holds {have} of {need} samples")]
    WindowNotFull { have: usize, need: usize },
    #[error("cannot transform an empty window")]
    EmptyWindow,
    #[error("band `{name}` has an empty range {low_hz}..{high_hz}")]
    EmptyBand {
        name: String,
        low_hz: f32,
        high_hz: f32,
    },
    #[error("band `{0}` missing from configuration")]
    MissingBand(&'static str),
    #[error("threshold `{0}` is out of range")]
    InvalidThreshold(&'static str),
    #[error("sample rate {0} Hz is not a supported sensor output data rate")]
    UnsupportedOdr(f32),
    #[error("sensor read failed: {0}")]
    Bus(#[from] BusError),
    #[error("sample source exhausted")]
    SourceExhausted,
    #[error("failed to render plot: {0}")]
    Plot(String),
}

impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for MonitorError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        MonitorError::Plot(format!("{value:?}"))
    }
}

impl From<image::ImageError> for MonitorError {
    fn from(value: image::ImageError) -> Self {
        MonitorError::Plot(value.to_string())
    }
}

pub mod acquisition;
pub mod bands;
pub mod classifier;
pub mod error;
pub mod pipeline;
pub mod plot;
pub mod spectrum;
pub mod tick;
pub mod window;

pub use acquisition::{Acquired, ReadFailurePolicy, SampleAcquisition, SampleSource};
pub use bands::{Band, SensorChannel};
pub use classifier::{ClassificationState, Thresholds};
pub use error::MonitorError;
pub use pipeline::{EpochOutcome, MotionPipeline};
pub use spectrum::{MagnitudeSpectrum, SpectrumBuilder};
pub use tick::SampleTicker;

pub mod fft_stage;
pub mod onset_tracker;
pub mod ring_buffer;
pub mod scaled_spectrum;
pub mod telemetry;
pub mod tempo_estimator;
pub mod trigger_detector;
pub mod trigger_filter;

pub use fft_stage::FftStage;
pub use onset_tracker::OnsetTracker;
pub use ring_buffer::RingBuffer;
pub use scaled_spectrum::ScaledSpectrum;
pub use telemetry::{TickSummary, TickTelemetry};
pub use tempo_estimator::TempoEstimator;
pub use trigger_detector::TriggerDetector;
pub use trigger_filter::{TriggerEvent, TriggerFilter};

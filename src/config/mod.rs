mod settings;

pub use settings::{PreviewConfig, Settings, TelemetryConfig};

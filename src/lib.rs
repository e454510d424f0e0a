pub mod packet;
pub mod error;
pub mod measurement;
pub mod config;
pub mod net;
pub mod traits;
pub mod client;
pub mod monitor;
pub mod simulator;

pub use client::LeoNtpClient;
pub use config::ClientConfig;
pub use error::{ClientError, ErrorKind};
pub use measurement::{DeviceSummary, Measurement, MeasurementKind, MeasurementValue, Measurements};
pub use traits::StatusSource;

use crate::error::ClientError;
use crate::measurement::{DeviceSummary, Measurements};

/// Anything that can be asked for a LeoNTP measurement set.
#[cfg_attr(test, mockall::automock)]
pub trait StatusSource {
    /// Confirm the server answers and report its identity.
    fn validate(&self) -> Result<DeviceSummary, ClientError>;

    /// One full query. Each call is an independent transaction.
    fn fetch(&self) -> Result<Measurements, ClientError>;
}

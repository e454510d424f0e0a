//! Blocking UDP client for the LeoNTP status query.
//!
//! Each call opens its own socket, sends one request, waits for one reply and
//! drops the socket again. Nothing is retried here; retry cadence belongs to
//! whoever is polling.

use crate::config::{ClientConfig, ConfigError};
use crate::error::ClientError;
use crate::measurement::{build_measurements, DeviceInfo, DeviceSummary, Measurements};
use crate::net;
use crate::packet::{self, LeoNtpStatus, PACKET_SIZE};
use crate::traits::StatusSource;
use log::{debug, info, warn};
use std::time::Instant;

/// Receive buffer, one byte larger than a valid reply so an oversized datagram
/// shows up as such instead of being truncated to a plausible 48 bytes.
const RECV_BUFFER_SIZE: usize = PACKET_SIZE + 1;

#[derive(Debug, Clone)]
pub struct LeoNtpClient {
    config: ClientConfig,
}

impl LeoNtpClient {
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(LeoNtpClient { config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Query the server and return the decoded reply.
    pub fn status(&self) -> Result<LeoNtpStatus, ClientError> {
        let label = self.config.label();
        let timeout = self.config.timeout();

        let addr = self
            .config
            .resolve()
            .map_err(|e| ClientError::connection(&label, e))?;
        let socket =
            net::create_query_socket(addr, timeout).map_err(|e| ClientError::connection(addr, e))?;

        let request = packet::encode_request();
        let started = Instant::now();
        socket
            .send(&request)
            .map_err(|e| ClientError::connection(addr, e))?;

        let mut buf = [0u8; RECV_BUFFER_SIZE];
        let size = socket
            .recv(&mut buf)
            .map_err(|e| ClientError::from_recv(addr, timeout, e))?;

        debug!(
            "[LeoNTP] {} bytes from {} in {:.1}ms",
            size,
            addr,
            started.elapsed().as_secs_f64() * 1000.0
        );

        packet::decode_response(&buf[..size])
    }
}

impl StatusSource for LeoNtpClient {
    fn validate(&self) -> Result<DeviceSummary, ClientError> {
        let status = self.status().map_err(|e| {
            warn!("[LeoNTP] Validation of {} failed: {}", self.config.label(), e);
            e
        })?;
        let device = DeviceInfo::from_status(&self.config.label(), &status);

        info!(
            "[LeoNTP] Found {} at {} (firmware {})",
            device.id, device.name, device.firmware
        );

        Ok(DeviceSummary {
            name: device.name,
            id: device.id,
        })
    }

    fn fetch(&self) -> Result<Measurements, ClientError> {
        let status = self.status()?;
        let device = DeviceInfo::from_status(&self.config.label(), &status);

        debug!(
            "[LeoNTP] {}: utc={} sats={} lock={}",
            device.name,
            status.utc_display(),
            status.satellites,
            status.gps_locked()
        );

        Ok(build_measurements(&device, &status))
    }
}

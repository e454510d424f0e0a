//! LeoNTP status packet codec.
//!
//! LeoNTP servers answer a vendor-specific mode-7 query on the NTP port.
//! Both directions use a fixed 48-byte datagram.
//!
//! # Request
//! - `[0]`     0x3F (version 7, mode 7)
//! - `[1]`     0x00
//! - `[2]`     0x10
//! - `[3]`     0x01
//! - `[4-47]`  zero padding
//!
//! # Response (little-endian)
//! - `[16-19]` NTP fractional seconds (u32, units of 2^-32 s)
//! - `[20-23]` NTP whole seconds since 1900-01-01 (u32)
//! - `[24-27]` Uptime in seconds (u32)
//! - `[28-31]` NTP requests served (u32)
//! - `[32-35]` Mode-6 requests served (u32)
//! - `[36-39]` GPS lock duration in seconds (u32)
//! - `[40]`    GPS flags, bit 0 = lock acquired
//! - `[41]`    Active satellites
//! - `[42-43]` Serial number (u16)
//! - `[44-47]` Firmware version, major in bits 8.., minor in bits 0..8

use crate::error::ClientError;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::io::Cursor;
use std::time::{Duration, UNIX_EPOCH};

/// Size of both request and response datagrams.
pub const PACKET_SIZE: usize = 48;

/// NTP epoch offset from Unix epoch (1900-01-01 to 1970-01-01 in seconds)
pub const NTP_EPOCH_OFFSET: i64 = 2_208_988_800;

/// Version 7 in bits 3-5, mode 7 (private) in bits 0-2.
const REQUEST_HEADER: [u8; 4] = [(7 << 3) | 7, 0x00, 0x10, 0x01];

/// Offset of the first meaningful response field.
const STATUS_OFFSET: u64 = 16;

const GPS_FLAG_LOCK: u8 = 0x01;

/// 0.5 s in NTP fraction units.
const HALF_SECOND: u32 = 0x8000_0000;

/// Build the status query datagram.
pub fn encode_request() -> [u8; PACKET_SIZE] {
    let mut request = [0u8; PACKET_SIZE];
    request[..REQUEST_HEADER.len()].copy_from_slice(&REQUEST_HEADER);
    request
}

/// True if `data` is a LeoNTP status query.
pub fn is_status_request(data: &[u8]) -> bool {
    data.len() == PACKET_SIZE && data[..REQUEST_HEADER.len()] == REQUEST_HEADER
}

/// Raw fields of a status reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LeoNtpStatus {
    pub ntp_fraction: u32,
    pub ntp_seconds: u32,
    pub uptime_secs: u32,
    pub ntp_requests: u32,
    /// Mode-6 requests served. Recent firmware always reports zero here.
    pub mode6_requests: u32,
    pub gps_lock_secs: u32,
    pub gps_flags: u8,
    pub satellites: u8,
    pub serial_number: u16,
    pub firmware_version: u32,
}

impl LeoNtpStatus {
    /// Decode a status reply. Anything but exactly [`PACKET_SIZE`] bytes is
    /// rejected before a single field is read.
    pub fn parse(data: &[u8]) -> Result<Self, ClientError> {
        if data.len() != PACKET_SIZE {
            return Err(ClientError::malformed(format!(
                "expected {} bytes, got {}",
                PACKET_SIZE,
                data.len()
            )));
        }

        Self::read_fields(data).map_err(|e| ClientError::malformed(e.to_string()))
    }

    fn read_fields(data: &[u8]) -> std::io::Result<Self> {
        let mut rdr = Cursor::new(data);
        rdr.set_position(STATUS_OFFSET);

        Ok(LeoNtpStatus {
            ntp_fraction: rdr.read_u32::<LittleEndian>()?,
            ntp_seconds: rdr.read_u32::<LittleEndian>()?,
            uptime_secs: rdr.read_u32::<LittleEndian>()?,
            ntp_requests: rdr.read_u32::<LittleEndian>()?,
            mode6_requests: rdr.read_u32::<LittleEndian>()?,
            gps_lock_secs: rdr.read_u32::<LittleEndian>()?,
            gps_flags: rdr.read_u8()?,
            satellites: rdr.read_u8()?,
            serial_number: rdr.read_u16::<LittleEndian>()?,
            firmware_version: rdr.read_u32::<LittleEndian>()?,
        })
    }

    /// Encode into the reply layout. Bytes 0-15 stay zero.
    pub fn to_bytes(&self) -> [u8; PACKET_SIZE] {
        let mut buf = [0u8; PACKET_SIZE];

        LittleEndian::write_u32(&mut buf[16..20], self.ntp_fraction);
        LittleEndian::write_u32(&mut buf[20..24], self.ntp_seconds);
        LittleEndian::write_u32(&mut buf[24..28], self.uptime_secs);
        LittleEndian::write_u32(&mut buf[28..32], self.ntp_requests);
        LittleEndian::write_u32(&mut buf[32..36], self.mode6_requests);
        LittleEndian::write_u32(&mut buf[36..40], self.gps_lock_secs);
        buf[40] = self.gps_flags;
        buf[41] = self.satellites;
        LittleEndian::write_u16(&mut buf[42..44], self.serial_number);
        LittleEndian::write_u32(&mut buf[44..48], self.firmware_version);

        buf
    }

    /// Fractional part of the server clock, in `[0, 1)`.
    pub fn fraction(&self) -> f64 {
        self.ntp_fraction as f64 / 4_294_967_296.0
    }

    /// Server clock as a UTC timestamp, fraction truncated.
    pub fn utc_time(&self) -> DateTime<Utc> {
        let unix_secs = i64::from(self.ntp_seconds) - NTP_EPOCH_OFFSET;
        let time = if unix_secs >= 0 {
            UNIX_EPOCH + Duration::from_secs(unix_secs as u64)
        } else {
            UNIX_EPOCH - Duration::from_secs(unix_secs.unsigned_abs())
        };
        DateTime::<Utc>::from(time)
    }

    /// `YYYY-MM-DD HH:MM:SS` rendering of [`Self::utc_time`].
    pub fn utc_display(&self) -> String {
        self.utc_time().format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// NTP seconds plus fraction, rounded to whole seconds. An exact half
    /// rounds to the even second.
    pub fn ntp_time_display(&self) -> String {
        let secs = u64::from(self.ntp_seconds);
        let rounded = match self.ntp_fraction.cmp(&HALF_SECOND) {
            Ordering::Less => secs,
            Ordering::Greater => secs + 1,
            Ordering::Equal => secs + (secs & 1),
        };
        rounded.to_string()
    }

    pub fn gps_locked(&self) -> bool {
        self.gps_flags & GPS_FLAG_LOCK == GPS_FLAG_LOCK
    }

    pub fn firmware_major(&self) -> u32 {
        self.firmware_version >> 8
    }

    pub fn firmware_minor(&self) -> u32 {
        self.firmware_version & 0xFF
    }

    /// Firmware as printed on the device display, e.g. `2.03`.
    pub fn firmware_display(&self) -> String {
        format!("{:x}.{:02x}", self.firmware_major(), self.firmware_minor())
    }
}

/// Decode a status reply. See [`LeoNtpStatus::parse`].
pub fn decode_response(data: &[u8]) -> Result<LeoNtpStatus, ClientError> {
    LeoNtpStatus::parse(data)
}

/// Build a status reply datagram. See [`LeoNtpStatus::to_bytes`].
pub fn encode_response(status: &LeoNtpStatus) -> [u8; PACKET_SIZE] {
    status.to_bytes()
}

use crate::packet::LeoNtpStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Every observation a status reply produces. The set is fixed; a successful
/// fetch yields exactly one measurement per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementKind {
    UtcTime,
    NtpTime,
    RequestsServed,
    Uptime,
    GpsLock,
    GpsLockTime,
    GpsFlags,
    Satellites,
    FirmwareVersion,
    SerialNumber,
}

impl MeasurementKind {
    pub const ALL: [MeasurementKind; 10] = [
        MeasurementKind::UtcTime,
        MeasurementKind::NtpTime,
        MeasurementKind::RequestsServed,
        MeasurementKind::Uptime,
        MeasurementKind::GpsLock,
        MeasurementKind::GpsLockTime,
        MeasurementKind::GpsFlags,
        MeasurementKind::Satellites,
        MeasurementKind::FirmwareVersion,
        MeasurementKind::SerialNumber,
    ];

    /// Stable machine key, also used as the category tag.
    pub fn key(&self) -> &'static str {
        match self {
            MeasurementKind::UtcTime => "utc_time",
            MeasurementKind::NtpTime => "ntp_time",
            MeasurementKind::RequestsServed => "requests_served",
            MeasurementKind::Uptime => "uptime",
            MeasurementKind::GpsLock => "gps_lock",
            MeasurementKind::GpsLockTime => "gps_lock_time",
            MeasurementKind::GpsFlags => "gps_flags",
            MeasurementKind::Satellites => "satellites",
            MeasurementKind::FirmwareVersion => "firmware_version",
            MeasurementKind::SerialNumber => "serial_number",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MeasurementKind::UtcTime => "UTC Time",
            MeasurementKind::NtpTime => "NTP Time",
            MeasurementKind::RequestsServed => "Requests Served",
            MeasurementKind::Uptime => "Uptime",
            MeasurementKind::GpsLock => "GPS Lock",
            MeasurementKind::GpsLockTime => "GPS Lock Time",
            MeasurementKind::GpsFlags => "GPS Flags",
            MeasurementKind::Satellites => "Satellites",
            MeasurementKind::FirmwareVersion => "Firmware Version",
            MeasurementKind::SerialNumber => "Serial Number",
        }
    }

    /// Unit of the state value, if it has one.
    pub fn unit(&self) -> Option<&'static str> {
        match self {
            MeasurementKind::Uptime | MeasurementKind::GpsLockTime => Some("s"),
            _ => None,
        }
    }

    fn value_from(&self, status: &LeoNtpStatus) -> MeasurementValue {
        match self {
            MeasurementKind::UtcTime => MeasurementValue::Text(status.utc_display()),
            MeasurementKind::NtpTime => MeasurementValue::Text(status.ntp_time_display()),
            MeasurementKind::RequestsServed => status.ntp_requests.into(),
            MeasurementKind::Uptime => status.uptime_secs.into(),
            MeasurementKind::GpsLock => MeasurementValue::Bool(status.gps_locked()),
            MeasurementKind::GpsLockTime => status.gps_lock_secs.into(),
            MeasurementKind::GpsFlags => u32::from(status.gps_flags).into(),
            MeasurementKind::Satellites => u32::from(status.satellites).into(),
            MeasurementKind::FirmwareVersion => {
                MeasurementValue::Text(status.firmware_display())
            }
            MeasurementKind::SerialNumber => u32::from(status.serial_number).into(),
        }
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeasurementValue {
    Bool(bool),
    Integer(u64),
    Text(String),
}

impl From<u32> for MeasurementValue {
    fn from(v: u32) -> Self {
        MeasurementValue::Integer(u64::from(v))
    }
}

impl fmt::Display for MeasurementValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasurementValue::Bool(b) => write!(f, "{}", b),
            MeasurementValue::Integer(n) => write!(f, "{}", n),
            MeasurementValue::Text(s) => f.write_str(s),
        }
    }
}

/// The device a set of measurements belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Serial-derived identity, stable while the same appliance answers.
    pub id: String,
    /// `host:port` the device was queried at.
    pub name: String,
    pub model: String,
    pub firmware: String,
}

impl DeviceInfo {
    pub const MODEL: &'static str = "LeoNTP";

    pub fn from_status(label: &str, status: &LeoNtpStatus) -> Self {
        DeviceInfo {
            id: device_id(status.serial_number),
            name: label.to_string(),
            model: Self::MODEL.to_string(),
            firmware: status.firmware_display(),
        }
    }
}

/// Identity derived from a device serial number.
pub fn device_id(serial_number: u16) -> String {
    format!("leontp_{}", serial_number)
}

/// Result of a reachability check: the label the device was found at and its
/// identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Unique across devices: `<device id>_<kind key>`.
    pub id: String,
    pub label: String,
    pub kind: MeasurementKind,
    pub device: DeviceInfo,
    pub state: MeasurementValue,
}

impl Measurement {
    pub fn unit(&self) -> Option<&'static str> {
        self.kind.unit()
    }
}

/// All measurements from one reply, keyed by kind.
pub type Measurements = BTreeMap<MeasurementKind, Measurement>;

/// Expand a decoded reply into one measurement per [`MeasurementKind`].
pub fn build_measurements(device: &DeviceInfo, status: &LeoNtpStatus) -> Measurements {
    MeasurementKind::ALL
        .iter()
        .map(|&kind| {
            let measurement = Measurement {
                id: format!("{}_{}", device.id, kind.key()),
                label: kind.label().to_string(),
                kind,
                device: device.clone(),
                state: kind.value_from(status),
            };
            (kind, measurement)
        })
        .collect()
}

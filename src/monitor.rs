//! Watch-mode bookkeeping for the command-line front end.
//!
//! Polls a [`StatusSource`] once per call to [`Monitor::poll`], tracks which
//! measurement ids are known and when each was last refreshed, and reports
//! ids that appeared or vanished since the previous successful cycle. A failed
//! cycle is "no data this time"; known ids are left untouched.

use crate::measurement::{Measurement, Measurements};
use crate::traits::StatusSource;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default, PartialEq)]
pub struct PollOutcome {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// Empty when the cycle failed.
    pub measurements: Measurements,
}

impl PollOutcome {
    pub fn has_data(&self) -> bool {
        !self.measurements.is_empty()
    }
}

pub struct Monitor<S: StatusSource> {
    source: S,
    last_synced: BTreeMap<String, DateTime<Utc>>,
    consecutive_failures: u32,
}

impl<S: StatusSource> Monitor<S> {
    pub fn new(source: S) -> Self {
        Monitor {
            source,
            last_synced: BTreeMap::new(),
            consecutive_failures: 0,
        }
    }

    pub fn known_ids(&self) -> impl Iterator<Item = &str> {
        self.last_synced.keys().map(String::as_str)
    }

    pub fn last_synced(&self, measurement: &Measurement) -> Option<DateTime<Utc>> {
        self.last_synced.get(&measurement.id).copied()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn poll(&mut self) -> PollOutcome {
        let measurements = match self.source.fetch() {
            Ok(m) => m,
            Err(e) => {
                self.consecutive_failures += 1;
                if e.is_connectivity() {
                    warn!(
                        "[Monitor] Server unreachable ({} in a row): {}",
                        self.consecutive_failures, e
                    );
                } else {
                    warn!("[Monitor] Bad reply, skipping cycle: {}", e);
                }
                return PollOutcome::default();
            }
        };

        if self.consecutive_failures > 0 {
            info!(
                "[Monitor] Server back after {} failed cycle(s)",
                self.consecutive_failures
            );
            self.consecutive_failures = 0;
        }

        let now = Utc::now();
        let current: BTreeSet<String> = measurements.values().map(|m| m.id.clone()).collect();

        let removed: Vec<String> = self
            .last_synced
            .keys()
            .filter(|id| !current.contains(*id))
            .cloned()
            .collect();
        for id in &removed {
            self.last_synced.remove(id);
            info!("[Monitor] Measurement {} disappeared", id);
        }

        let mut added = Vec::new();
        for id in current {
            if self.last_synced.insert(id.clone(), now).is_none() {
                debug!("[Monitor] New measurement {}", id);
                added.push(id);
            }
        }

        PollOutcome {
            added,
            removed,
            measurements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::measurement::{build_measurements, DeviceInfo};
    use crate::packet::LeoNtpStatus;
    use crate::traits::MockStatusSource;
    use mockall::Sequence;

    fn measurements_for(serial: u16) -> Measurements {
        let status = LeoNtpStatus {
            serial_number: serial,
            ..Default::default()
        };
        build_measurements(&DeviceInfo::from_status("10.0.0.5:123", &status), &status)
    }

    #[test]
    fn test_first_poll_adds_everything() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut source = MockStatusSource::new();
        source
            .expect_fetch()
            .times(1)
            .returning(|| Ok(measurements_for(1)));

        let mut monitor = Monitor::new(source);
        let outcome = monitor.poll();

        assert!(outcome.has_data());
        assert_eq!(outcome.added.len(), 10);
        assert!(outcome.removed.is_empty());
        assert_eq!(monitor.known_ids().count(), 10);
        let m = outcome.measurements.values().next().unwrap();
        assert!(monitor.last_synced(m).is_some());
    }

    #[test]
    fn test_steady_state_reports_no_changes() {
        let mut source = MockStatusSource::new();
        source
            .expect_fetch()
            .times(2)
            .returning(|| Ok(measurements_for(1)));

        let mut monitor = Monitor::new(source);
        monitor.poll();
        let outcome = monitor.poll();

        assert!(outcome.added.is_empty());
        assert!(outcome.removed.is_empty());
    }

    #[test]
    fn test_device_swap_replaces_ids() {
        let mut source = MockStatusSource::new();
        let mut seq = Sequence::new();
        source
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(measurements_for(1)));
        source
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(measurements_for(2)));

        let mut monitor = Monitor::new(source);
        monitor.poll();
        let outcome = monitor.poll();

        assert_eq!(outcome.added.len(), 10);
        assert_eq!(outcome.removed.len(), 10);
        assert!(outcome.removed.iter().all(|id| id.starts_with("leontp_1_")));
        assert!(monitor.known_ids().all(|id| id.starts_with("leontp_2_")));
    }

    #[test]
    fn test_failure_is_empty_cycle() {
        let mut source = MockStatusSource::new();
        let mut seq = Sequence::new();
        source
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(measurements_for(1)));
        source
            .expect_fetch()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|| Err(ClientError::malformed("expected 48 bytes, got 12")));
        source
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(measurements_for(1)));

        let mut monitor = Monitor::new(source);
        monitor.poll();

        let outcome = monitor.poll();
        assert!(!outcome.has_data());
        assert!(outcome.removed.is_empty());
        monitor.poll();
        assert_eq!(monitor.consecutive_failures(), 2);
        assert_eq!(monitor.known_ids().count(), 10);

        let outcome = monitor.poll();
        assert!(outcome.has_data());
        assert!(outcome.added.is_empty());
        assert_eq!(monitor.consecutive_failures(), 0);
    }
}

//! Software stand-in for a LeoNTP appliance.
//!
//! Answers status queries on a UDP port with a configurable status, so the
//! client can be exercised without hardware. Anything that is not a status
//! query (plain SNTP included) is ignored.

use crate::net;
use crate::packet::{self, LeoNtpStatus, NTP_EPOCH_OFFSET, PACKET_SIZE};
use anyhow::{anyhow, Result};
use log::{debug, error, info, warn};
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// How often the serve loop checks the running flag.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct LeoNtpSimulator {
    socket: UdpSocket,
    template: LeoNtpStatus,
    /// Stamp replies with the host clock and a real uptime instead of the
    /// template values.
    live_clock: bool,
    started: Instant,
    served: AtomicU32,
}

impl LeoNtpSimulator {
    pub fn new(bind: SocketAddr, template: LeoNtpStatus) -> Result<Self> {
        let socket = net::create_listen_socket(bind, POLL_INTERVAL)
            .map_err(|e| anyhow!("Failed to bind simulator to {}: {}", bind, e))?;

        info!(
            "[Simulator] Listening on {} (serial {})",
            socket.local_addr()?,
            template.serial_number
        );

        Ok(LeoNtpSimulator {
            socket,
            template,
            live_clock: false,
            started: Instant::now(),
            served: AtomicU32::new(template.ntp_requests),
        })
    }

    pub fn with_live_clock(mut self, live_clock: bool) -> Self {
        self.live_clock = live_clock;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Serve until the running flag is cleared.
    pub fn run(&self, running: Arc<AtomicBool>) -> Result<()> {
        // One spare byte so oversized datagrams are not silently truncated to 48
        let mut buf = [0u8; PACKET_SIZE + 1];

        while running.load(Ordering::SeqCst) {
            match self.socket.recv_from(&mut buf) {
                Ok((size, src)) => {
                    if let Err(e) = self.handle_request(&buf[..size], src) {
                        warn!("[Simulator] Error handling request from {}: {}", src, e);
                    }
                }
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => {
                    error!("[Simulator] Socket error: {}", e);
                    thread::sleep(POLL_INTERVAL);
                }
            }
        }

        info!("[Simulator] Shutting down");
        Ok(())
    }

    /// Move the simulator onto its own thread.
    pub fn spawn(self) -> Result<SimulatorHandle> {
        let addr = self.local_addr()?;
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let thread = thread::Builder::new()
            .name("leontp-sim".into())
            .spawn(move || self.run(flag))?;

        Ok(SimulatorHandle {
            addr,
            running,
            thread: Some(thread),
        })
    }

    fn handle_request(&self, request: &[u8], src: SocketAddr) -> Result<()> {
        if !packet::is_status_request(request) {
            debug!(
                "[Simulator] Ignoring {}-byte non-status packet from {}",
                request.len(),
                src
            );
            return Ok(());
        }

        let response = self.build_response();
        self.socket.send_to(&response, src)?;
        debug!("[Simulator] Responded to {}", src);
        Ok(())
    }

    fn build_response(&self) -> [u8; PACKET_SIZE] {
        let mut status = self.template;
        status.ntp_requests = self.served.fetch_add(1, Ordering::SeqCst).wrapping_add(1);

        if self.live_clock {
            let (secs, frac) = system_time_to_ntp(SystemTime::now());
            let uptime = self.started.elapsed().as_secs() as u32;
            status.ntp_seconds = secs;
            status.ntp_fraction = frac;
            status.uptime_secs = self.template.uptime_secs.wrapping_add(uptime);
            if status.gps_locked() {
                status.gps_lock_secs = self.template.gps_lock_secs.wrapping_add(uptime);
            }
        }

        packet::encode_response(&status)
    }
}

/// A simulator running on a background thread. Stops on drop.
pub struct SimulatorHandle {
    addr: SocketAddr,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<()>>>,
}

impl SimulatorHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn stop(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| anyhow!("Simulator thread panicked"))?,
            None => Ok(()),
        }
    }
}

impl Drop for SimulatorHandle {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("[Simulator] {}", e);
        }
    }
}

/// Convert SystemTime to NTP timestamp (seconds since 1900, fractional seconds).
fn system_time_to_ntp(time: SystemTime) -> (u32, u32) {
    let duration = time.duration_since(UNIX_EPOCH).unwrap_or_default();
    let ntp_secs = duration.as_secs() + NTP_EPOCH_OFFSET as u64;

    // frac = nanos * 2^32 / 10^9
    let nanos = duration.subsec_nanos() as u64;
    let frac = ((nanos << 32) / 1_000_000_000) as u32;

    (ntp_secs as u32, frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> LeoNtpStatus {
        LeoNtpStatus {
            ntp_seconds: 3_786_825_600,
            uptime_secs: 500,
            ntp_requests: 10,
            gps_lock_secs: 400,
            gps_flags: 0x01,
            satellites: 7,
            serial_number: 4660,
            firmware_version: 0x0203,
            ..Default::default()
        }
    }

    fn simulator() -> LeoNtpSimulator {
        LeoNtpSimulator::new("127.0.0.1:0".parse().unwrap(), template()).unwrap()
    }

    #[test]
    fn test_system_time_to_ntp_epoch() {
        let (secs, frac) = system_time_to_ntp(UNIX_EPOCH);
        assert_eq!(secs as i64, NTP_EPOCH_OFFSET);
        assert_eq!(frac, 0);
    }

    #[test]
    fn test_ntp_fractional_conversion() {
        let (_, frac) = system_time_to_ntp(UNIX_EPOCH + Duration::new(0, 500_000_000));
        assert!((frac as i64 - 2_147_483_648).abs() < 1000, "frac {}", frac);
    }

    #[test]
    fn test_build_response_counts_requests() {
        let sim = simulator();
        let first = packet::decode_response(&sim.build_response()).unwrap();
        let second = packet::decode_response(&sim.build_response()).unwrap();

        assert_eq!(first.ntp_requests, 11);
        assert_eq!(second.ntp_requests, 12);
        assert_eq!(first.serial_number, 4660);
        assert_eq!(first.ntp_seconds, 3_786_825_600);
    }

    #[test]
    fn test_live_clock_uses_host_time() {
        let sim = simulator().with_live_clock(true);
        let status = packet::decode_response(&sim.build_response()).unwrap();
        let (now_secs, _) = system_time_to_ntp(SystemTime::now());

        assert!(now_secs.wrapping_sub(status.ntp_seconds) <= 1);
        assert!(status.uptime_secs >= 500);
    }

    #[test]
    fn test_answers_status_query_and_ignores_sntp() {
        let handle = simulator().spawn().unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").unwrap();
        client
            .set_read_timeout(Some(Duration::from_millis(300)))
            .unwrap();
        let mut buf = [0u8; 64];

        let mut sntp = [0u8; PACKET_SIZE];
        sntp[0] = 0x1B;
        client.send_to(&sntp, handle.addr()).unwrap();
        assert!(client.recv_from(&mut buf).is_err());

        client.send_to(&packet::encode_request(), handle.addr()).unwrap();
        let (n, _) = client.recv_from(&mut buf).unwrap();
        assert_eq!(n, PACKET_SIZE);
        assert_eq!(packet::decode_response(&buf[..n]).unwrap().satellites, 7);

        handle.stop().unwrap();
    }
}

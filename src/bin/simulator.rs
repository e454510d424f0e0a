//! Answer LeoNTP status queries from a fake appliance.

use anyhow::Result;
use clap::Parser;
use leontp::packet::LeoNtpStatus;
use leontp::simulator::LeoNtpSimulator;
use log::info;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about = "Simulate a LeoNTP time server", long_about = None)]
struct Args {
    /// Address to listen on (port 123 requires root/admin)
    #[arg(short, long, default_value = "127.0.0.1:12300")]
    bind: SocketAddr,

    /// Serial number to report
    #[arg(long, default_value_t = 4660)]
    serial: u16,

    /// Satellites in view
    #[arg(long, default_value_t = 9)]
    satellites: u8,

    /// Firmware version word (major << 8 | minor)
    #[arg(long, default_value_t = 0x0203)]
    firmware: u32,

    /// Report no GPS lock
    #[arg(long)]
    no_lock: bool,
}

fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    let args = Args::parse();

    let template = LeoNtpStatus {
        gps_flags: if args.no_lock { 0x00 } else { 0x01 },
        satellites: args.satellites,
        serial_number: args.serial,
        firmware_version: args.firmware,
        ..Default::default()
    };
    let simulator = LeoNtpSimulator::new(args.bind, template)?.with_live_clock(true);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Ctrl+C received. Shutting down...");
        r.store(false, Ordering::SeqCst);
    })?;

    simulator.run(running)
}

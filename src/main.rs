use anyhow::{anyhow, Context, Result};
use clap::Parser;
use leontp::config::ClientConfig;
use leontp::measurement::Measurements;
use leontp::monitor::Monitor;
use leontp::{LeoNtpClient, StatusSource};
use log::info;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about = "Query a LeoNTP time server", long_about = None)]
struct Args {
    /// Server host name or IP address
    host: Option<String>,

    /// UDP port of the server
    #[arg(short, long)]
    port: Option<u16>,

    /// Receive timeout in seconds
    #[arg(short, long)]
    timeout: Option<f64>,

    /// Poll interval in seconds for --watch (1-3600)
    #[arg(short, long)]
    interval: Option<u64>,

    /// JSON config file; command-line flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only check that the server answers and print its identity
    #[arg(long, conflicts_with = "watch")]
    validate: bool,

    /// Keep polling until Ctrl+C
    #[arg(long)]
    watch: bool,

    /// Print measurements as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn client_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load(path)?,
            None => ClientConfig::default(),
        };

        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(secs) = self.timeout {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(anyhow!("Timeout must be a positive number of seconds"));
            }
            config.timeout_ms = (secs * 1000.0).ceil() as u64;
        }
        if let Some(interval) = self.interval {
            config.update_interval_secs = interval;
        }

        Ok(config)
    }
}

fn print_measurements(measurements: &Measurements, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(measurements)?);
        return Ok(());
    }

    for m in measurements.values() {
        match m.unit() {
            Some(unit) => println!("{:<18} {} {}", m.label, m.state, unit),
            None => println!("{:<18} {}", m.label, m.state),
        }
    }
    Ok(())
}

fn watch(client: LeoNtpClient, json: bool) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        info!("Ctrl+C received. Shutting down...");
        r.store(false, Ordering::SeqCst);
    })?;

    let interval = client.config().update_interval();
    info!(
        "Watching {} every {}s",
        client.config().label(),
        interval.as_secs()
    );

    let mut monitor = Monitor::new(client);
    while running.load(Ordering::SeqCst) {
        let cycle_start = Instant::now();
        let outcome = monitor.poll();

        if !outcome.added.is_empty() || !outcome.removed.is_empty() {
            info!(
                "Measurement set changed: {} added, {} removed",
                outcome.added.len(),
                outcome.removed.len()
            );
        }
        if outcome.has_data() {
            print_measurements(&outcome.measurements, json)?;
            if !json {
                println!();
            }
        }

        // Sleep in short slices so Ctrl+C is honoured promptly
        while running.load(Ordering::SeqCst) && cycle_start.elapsed() < interval {
            thread::sleep(Duration::from_millis(100));
        }
    }

    info!("Exiting.");
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    let args = Args::parse();

    let config = args.client_config()?;
    let client = LeoNtpClient::new(config).context("Invalid configuration")?;

    if args.validate {
        let summary = client.validate()?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            println!("{} ({})", summary.name, summary.id);
        }
        return Ok(());
    }

    if args.watch {
        return watch(client, args.json);
    }

    let measurements = client.fetch()?;
    print_measurements(&measurements, args.json)
}

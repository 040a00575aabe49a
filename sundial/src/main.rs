#![forbid(unsafe_code)]

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{mpsc, Mutex};
use std::time::{Duration, SystemTime};

use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use config::{Config, ServerConfig};
use sundial_client::{Client, QueryResult};
use sundial_datetime::DateTime;
use sundial_proto::EPOCH_OFFSET;

const DEFAULT_FORMAT: &str = "yyyy-MM-dd hh:mm:ss.fff";

#[derive(Parser, Debug)]
#[command(version, about = "Query NTP servers and report clock offsets")]
struct CmdArgs {
    /// NTP servers to query, as host[:port]; overrides the config file
    #[arg(value_name = "SERVER")]
    servers: Vec<String>,

    /// Configuration file to read instead of the default locations
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Total per-query timeout in milliseconds
    #[arg(short, long, value_name = "MS")]
    timeout: Option<u64>,

    /// Pattern for printing server time, e.g. "ddd dd MMM yyyy hh:mm:ss"
    #[arg(short, long, value_name = "PATTERN")]
    format: Option<String>,

    /// Log filter directives, e.g. "sundial_client=debug"
    #[arg(long, env = "SUNDIAL_LOG")]
    log_filter: Option<String>,
}

fn main() -> ExitCode {
    let args = CmdArgs::parse();

    let servers: Vec<ServerConfig> = args
        .servers
        .iter()
        .map(|server| ServerConfig::from(server.as_str()))
        .collect();
    let (config, config_error) = match Config::from_args(args.config.as_ref(), servers) {
        Ok(config) => (config, None),
        Err(err) => (Config::default(), Some(err)),
    };

    let filter = args
        .log_filter
        .as_deref()
        .or(config.log_filter.as_deref())
        .unwrap_or("info");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();
    if let Some(err) = config_error {
        warn!("unable to load configuration file: {err}");
    }

    if config.servers.is_empty() {
        eprintln!("no servers to query; name one on the command line or in sundial.toml");
        return ExitCode::from(2);
    }

    let timeout = Duration::from_millis(args.timeout.unwrap_or(config.query.timeout_ms));
    let pattern = args.format.unwrap_or_else(|| DEFAULT_FORMAT.to_string());

    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let client = match Client::new(move |result| {
        let _ = tx.lock().unwrap().send(result);
    }) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("could not start the query runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    for server in &config.servers {
        client.query_with_timeout(&server.addr, timeout);
    }

    let mut failures = 0;
    for _ in 0..config.servers.len() {
        match rx.recv() {
            Ok(result) => {
                if !result.status.is_success() {
                    failures += 1;
                }
                report(&result, &pattern);
            }
            Err(_) => break,
        }
    }

    if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn report(result: &QueryResult, pattern: &str) {
    let address = result
        .address
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| String::from("-"));
    if result.status.is_success() {
        let offset = result.packet.offset(SystemTime::now());
        // The transmit timestamp, rebased from the NTP prime epoch onto the
        // Unix epoch for display.
        let since_prime = result.packet.transmit_timestamp().duration();
        let server_time = DateTime::from_nanos_since_epoch(
            since_prime.as_nanos() - EPOCH_OFFSET as i64 * 1_000_000_000,
        );
        println!(
            "{} ({}) offset {:+.6} s, rtt {} ms, server time {}",
            result.server,
            address,
            offset.to_seconds(),
            result.rtt.as_millis(),
            server_time.format(pattern),
        );
    } else {
        println!("{} ({}) {}", result.server, address, result.status);
    }
}

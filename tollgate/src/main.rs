#![feature(impl_trait_in_assoc_type)]

use std::process::ExitCode;

use clap::Parser;
use tollgate_core::config::Config;
use tracing::{info, warn};

mod runtimes;
mod signals;

use runtimes::Fleet;

/// Exit codes: `0` normal shutdown, `1` unexpected error, `2`
/// invalid config, `3` startup failure.
const EXIT_OK: u8 = 0;
const EXIT_UNEXPECTED: u8 = 1;
const EXIT_CONFIG_INVALID: u8 = 2;
const EXIT_STARTUP_FAILURE: u8 = 3;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
 /// Path of the config file
 #[clap(short, long, value_parser)]
 config: String,

 /// Validate the configuration and exit without starting anything.
 #[clap(long)]
 check: bool,
}

fn main() -> ExitCode {
 tracing_subscriber::fmt()
 .with_env_filter(
 tracing_subscriber::EnvFilter::try_from_default_env()
 .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
 )
 .init();

 let args = Args::parse();
 run(args)
}

fn run(args: Args) -> ExitCode {
 let config = match load_and_validate(&args.config) {
 Ok(config) => config,
 Err(e) => {
 eprintln!("invalid configuration: {e}");
 return ExitCode::from(EXIT_CONFIG_INVALID);
 }
 };

 if args.check {
 println!("configuration valid");
 return ExitCode::from(EXIT_OK);
 }

 signals::install();

 let fleet = match Fleet::spawn(config) {
 Ok(fleet) => fleet,
 Err(e) => {
 eprintln!("startup failed: {e}");
 return ExitCode::from(EXIT_STARTUP_FAILURE);
 }
 };

 info!("tollgate started");
 main_loop(&args.config, fleet)
}

/// Polls the signal flags until a shutdown is requested, dispatching a
/// reload to the fleet on every `SIGHUP` in between.
fn main_loop(config_path: &str, fleet: Fleet) -> ExitCode {
 loop {
 std::thread::sleep(signals::POLL_INTERVAL);

 if signals::take_reload_requested() {
 match load_and_validate(config_path) {
 Ok(config) => {
 info!("reloading configuration");
 fleet.broadcast_reload(config);
 }
 Err(e) => warn!("reload aborted, configuration invalid: {e}"),
 }
 }

 if signals::shutdown_requested() {
 break;
 }
 }

 if signals::abort_requested() {
 warn!("second interrupt received, aborting immediately");
 return ExitCode::from(EXIT_UNEXPECTED);
 }

 info!("shutting down");
 fleet.shutdown();
 fleet.join();
 ExitCode::from(EXIT_OK)
}

/// Parses the configuration file and runs every element's
/// configuration-struct binding, reused on every reload too so a
/// malformed reload is caught before ever reaching a worker.
fn load_and_validate(path: &str) -> anyhow::Result<Config> {
 let config = std::fs::read(path).map_err(|e| anyhow::anyhow!("reading {path:?}: {e}"))?;
 let config: Config = tollgate_core::config::parse_sniffed(&config)?;
 tollgate_services::warehouse::validate(&config)?;
 Ok(config)
}

//! Station Gateway entry point.
//!
//! ## CLI Subcommands
//!
//! - `station-gateway` or `station-gateway serve` - Run the station server (default)
//! - `station-gateway discover` - Find a station and persist it
//! - `station-gateway status` - Show the station's status
//! - `station-gateway config show|defaults|validate` - Inspect configuration

use std::process::ExitCode;
use std::sync::Arc;

use station_gateway::cli::{self, config_cmd};
use station_gateway::config::{self as station_config, Config};
use station_gateway::engine::MockEngine;
use station_gateway::server::StationServer;
use station_gateway::station::StationMode;
use station_gateway::telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("serve");

    match command {
        "serve" | "" => {
            let Some(config) = load_config() else {
                return ExitCode::from(cli::EXIT_CONFIG as u8);
            };
            if let Err(e) = telemetry::init_logging(&config.log) {
                eprintln!("Logging setup failed: {e}");
                return ExitCode::from(cli::EXIT_CONFIG as u8);
            }
            telemetry::init_metrics();
            match run_server(config).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("Server error: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        "discover" => {
            let Some(config) = load_config() else {
                return ExitCode::from(cli::EXIT_CONFIG as u8);
            };
            init_cli_logging(&config);
            let code = cli::run_discover(&config).await;
            ExitCode::from(code as u8)
        }
        "status" => {
            let Some(config) = load_config() else {
                return ExitCode::from(cli::EXIT_CONFIG as u8);
            };
            init_cli_logging(&config);
            let json_output = args.get(2).map(|s| s.as_str()) == Some("--json");
            let code = cli::run_status(&config, json_output).await;
            ExitCode::from(code as u8)
        }
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => ExitCode::from(config_cmd::run_show() as u8),
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                "validate" => ExitCode::from(config_cmd::run_validate() as u8),
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_command_help("config");
                    ExitCode::FAILURE
                }
            }
        }
        "help" | "--help" | "-h" => {
            if let Some(subcommand) = args.get(2) {
                print_command_help(subcommand);
            } else {
                print_usage();
            }
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("station-gateway {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn load_config() -> Option<Config> {
    match station_config::load() {
        Ok(config) => {
            for warning in station_config::invalid_env_values() {
                eprintln!("WARNING: {warning}");
            }
            Some(config)
        }
        Err(e) => {
            eprintln!("Configuration error: {e}");
            None
        }
    }
}

/// Client commands log warnings only unless `RUST_LOG` says otherwise.
fn init_cli_logging(config: &Config) {
    let mut log = config.log.clone();
    log.level = "warn".to_string();
    log.format = telemetry::LogFormat::Pretty;
    let _ = telemetry::init_logging(&log);
}

async fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let server_config = &config.server;
    if server_config.tier.mode() == StationMode::Production {
        tracing::warn!(
            tier = %server_config.tier,
            "no production model backend is bundled; serving the mock engine"
        );
    }
    let engine = Arc::new(MockEngine::new(server_config.mock_latency));
    let server = StationServer::new(server_config, engine);

    let listener = tokio::net::TcpListener::bind(server_config.bind).await?;
    let signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "could not listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };
    server.serve(listener, signal).await?;
    tracing::info!("station server stopped");
    Ok(())
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "station-gateway v{}

USAGE:
    station-gateway [COMMAND] [OPTIONS]

COMMANDS:
    serve        Run the station server (default when no command given)
    discover     Find a station on the network and remember it
    status       Show the station's status and queue
    config       Inspect configuration (show, defaults, validate)
    version      Show version information
    help         Show this help message

OPTIONS:
    -h, --help     Show help for command
    -V, --version  Show version information

EXAMPLES:
    station-gateway                     # Run the station server
    STATION_TIER=clinic station-gateway serve
    station-gateway discover            # Probe candidates, persist the first reachable
    station-gateway status --json       # Raw status document
    station-gateway config validate     # Check configuration

ENVIRONMENT:
    STATION_CONFIG     TOML config file overlaid beneath environment variables
    STATION_TIER       development, production, emergency, camp, clinic, auto
    STATION_STATE_DIR  Persisted station and result cache (default: .station)
    RUST_LOG           Log filter, overrides STATION_LOG_LEVEL

    Run 'station-gateway config defaults' for the full list.

EXIT CODES:
    0  Success
    1  Failure
    2  Configuration error
    3  Connection error
",
        version
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "serve" => {
            eprintln!(
                "station-gateway serve - Run the station server

USAGE:
    station-gateway serve

DESCRIPTION:
    Serves the station HTTP API on STATION_BIND. Requests are admitted
    under the deployment tier's concurrency ceiling and queue bound.
    Ctrl+C stops accepting work and drains in-flight requests for up to
    STATION_SHUTDOWN_TIMEOUT seconds.
"
            );
        }
        "discover" => {
            eprintln!(
                "station-gateway discover - Find a station

USAGE:
    station-gateway discover

DESCRIPTION:
    Probes the persisted station, STATION_ADDRESS, STATION_CANDIDATES and
    STATION_HOSTNAMES in that order. The first station that reports ready
    is saved under STATION_STATE_DIR.

EXIT CODES:
    0  Station found
    3  No station reachable
"
            );
        }
        "status" => {
            eprintln!(
                "station-gateway status - Show station status

USAGE:
    station-gateway status [--json]

OPTIONS:
    --json  Print the raw status document

EXIT CODES:
    0  Station reachable
    3  Connection error
"
            );
        }
        "config" => {
            eprintln!(
                "station-gateway config - Inspect configuration

USAGE:
    station-gateway config <SUBCOMMAND>

SUBCOMMANDS:
    show      Print effective configuration as KEY=VALUE
    defaults  Print built-in defaults and tier presets
    validate  Report invalid or conflicting settings (exit 1 on warnings)
"
            );
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
        }
    }
}

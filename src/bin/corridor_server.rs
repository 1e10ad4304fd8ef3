//! Corridor NDJSON server
//!
//! Accepts requesters, ambulances and monitoring stations over TCP and runs
//! the gateway until Ctrl+C.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use corridor::config::CorridorConfig;
use corridor::gateway::GatewayRuntime;
use corridor::logging::init_logging;
use corridor::transport::serve;

const DEFAULT_PORT: u16 = 5000;

/// Server configuration
struct Args {
    /// Address to bind to
    addr: SocketAddr,
    /// Optional JSON configuration file
    config: Option<PathBuf>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT),
            config: None,
        }
    }
}

fn value_for<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i + 1) {
        Some(value) => value.as_str(),
        None => {
            eprintln!("error: {flag} requires a value");
            std::process::exit(1);
        }
    }
}

/// Listening port from a `PORT` value; unset or blank means the default.
fn port_from_env(raw: Option<&str>) -> Result<u16, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(DEFAULT_PORT),
        Some(value) => value
            .parse()
            .map_err(|_| format!("invalid PORT environment variable: {value}")),
    }
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args::default();

    let env_port = std::env::var("PORT").ok();
    let port = port_from_env(env_port.as_deref()).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    });
    parsed.addr.set_port(port);

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--host" | "-H" => {
                let raw = value_for(&args, i, "--host");
                let ip: IpAddr = raw.parse().unwrap_or_else(|_| {
                    eprintln!("error: invalid host address: {raw}");
                    std::process::exit(1);
                });
                parsed.addr.set_ip(ip);
                i += 2;
            }
            "--port" | "-p" => {
                let raw = value_for(&args, i, "--port");
                let port: u16 = raw.parse().unwrap_or_else(|_| {
                    eprintln!("error: invalid port number: {raw}");
                    std::process::exit(1);
                });
                parsed.addr.set_port(port);
                i += 2;
            }
            "--config" | "-c" => {
                parsed.config = Some(PathBuf::from(value_for(&args, i, "--config")));
                i += 2;
            }
            "--help" | "-h" => {
                println!("corridor-server - ambulance tracking and proximity alerting");
                println!();
                println!("USAGE:");
                println!("    corridor-server [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -H, --host <IP>           Address to bind [default: 127.0.0.1]");
                println!("    -p, --port <PORT>         Port to listen on [default: $PORT or 5000]");
                println!("    -c, --config <FILE>       JSON configuration file");
                println!("    -h, --help                Print help information");
                println!();
                println!("Log verbosity follows RUST_LOG [default: info].");
                std::process::exit(0);
            }
            arg => {
                eprintln!("error: unknown argument: {arg}");
                std::process::exit(1);
            }
        }
    }

    parsed
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = parse_args();
    init_logging("info")?;

    let config = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            CorridorConfig::from_json_file(path)?
        }
        None => CorridorConfig::default(),
    };
    info!(
        monitors = config.monitors.len(),
        threshold_km = config.alert_threshold_km,
        "configuration ready"
    );

    let runtime = Arc::new(GatewayRuntime::start(config)?);
    let listener = TcpListener::bind(args.addr).await?;
    info!(addr = %listener.local_addr()?, version = env!("CARGO_PKG_VERSION"), "corridor server listening");

    serve(Arc::clone(&runtime), listener, async {
        let _ = signal::ctrl_c().await;
    })
    .await?;

    info!("shut down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_defaults_when_env_unset_or_blank() {
        assert_eq!(port_from_env(None), Ok(DEFAULT_PORT));
        assert_eq!(port_from_env(Some("")), Ok(DEFAULT_PORT));
        assert_eq!(port_from_env(Some("  ")), Ok(DEFAULT_PORT));
    }

    #[test]
    fn port_env_overrides_default() {
        assert_eq!(port_from_env(Some("8080")), Ok(8080));
        assert_eq!(port_from_env(Some(" 3000\n")), Ok(3000));
    }

    #[test]
    fn bad_port_env_is_an_error() {
        let err = port_from_env(Some("eighty")).unwrap_err();
        assert!(err.contains("PORT"));
        assert!(port_from_env(Some("70000")).is_err());
    }
}

use clap::Parser;
use futures_util::StreamExt;
use ssdp_discovery::{Builder, DiscoveryEvent, Interface, SearchRequest, SSDP_PORT};
use std::collections::HashSet;
use std::time::Duration;

/// Search the local network for UPnP devices and services
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Seconds to listen for replies
    #[arg(short, long, default_value_t = 5)]
    duration: u64,

    /// Search target, e.g. "upnp:rootdevice"
    #[arg(short, long, default_value = "ssdp:all")]
    target: String,

    /// Destination port
    #[arg(short, long, default_value_t = SSDP_PORT)]
    port: u16,

    /// Local address to search from ("default" for the OS's choice,
    /// "fe80::1%2" for an IPv6 address on interface 2); may be repeated
    #[arg(short, long = "interface", default_value = "default")]
    interfaces: Vec<Interface>,

    /// Show every reply, including repeats
    #[arg(short, long)]
    all: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ssdp_discovery=info".into()),
        )
        .init();

    let args = Args::parse();
    println!(
        "ssdp-discover from {} {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let (service, mut events) = Builder::new().spawn_with_events();
    let request = SearchRequest::new()
        .with_duration(Duration::from_secs(args.duration))
        .with_search_target(args.target)
        .with_port(args.port)
        .with_interfaces(args.interfaces);

    let sockets = service.discover(request).await?;
    println!("searching on {sockets} socket(s)");

    let mut seen = HashSet::new();
    while let Some(event) = events.next().await {
        match event {
            DiscoveryEvent::Started => {}
            DiscoveryEvent::Discovered(s) => {
                let usn = s.unique_service_name().unwrap_or("").to_string();
                if !args.all && !seen.insert((s.host(), usn.clone())) {
                    continue;
                }
                println!("+ {} from {}", s.search_target().unwrap_or("?"), s.host());
                println!("  {usn}");
                if let Some(location) = s.location() {
                    println!("  at {location}");
                }
                if let Some(server) = s.server() {
                    println!("  server {server}");
                }
            }
            DiscoveryEvent::Finished {
                no_sockets_available,
            } => {
                if no_sockets_available {
                    eprintln!("no interface could be used for searching");
                }
                break;
            }
        }
    }

    Ok(())
}

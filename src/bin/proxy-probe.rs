use clap::Parser;

use keepalive_proxy::config::{ProxyConfig, UpstreamConfig};
use keepalive_proxy::net::connection::ProxyStats;
use keepalive_proxy::observability::logging;
use keepalive_proxy::upstream::{Link, Target};

/// Drive repeated keep-alive GETs over one connection and print each response head.
///
/// Point it at a running proxy to check that it holds the downstream
/// connection open across requests.
#[derive(Parser)]
#[command(name = "proxy-probe")]
#[command(about = "Keep-alive probe for an HTTP/1.1 server or proxy", long_about = None)]
struct Cli {
    /// Value sent in the Host header.
    hostname: String,

    /// Request path.
    path: String,

    /// Server IP address.
    server: String,

    /// Server port.
    port: u16,

    /// Number of requests to send.
    #[arg(short, long, default_value_t = 10_000)]
    cycles: u64,

    /// Per-exchange deadline in milliseconds.
    #[arg(short, long, default_value_t = 1_000)]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging("warn");

    let mut config = ProxyConfig::default();
    config.upstream = UpstreamConfig {
        host: cli.hostname,
        path: cli.path,
        address: cli.server,
        port: cli.port,
        ..UpstreamConfig::default()
    };
    config.timeouts.exchange_ms = cli.timeout_ms;
    let target = Target::from_config(&config)?;

    let stats = ProxyStats::new();
    let mut link = Link::new(&stats);

    for cycle in 1..=cli.cycles {
        let exchange = match link.exchange(&target).await {
            Ok(exchange) => exchange,
            Err(e) => {
                eprintln!("cycle {cycle}: {e}");
                break;
            }
        };

        let head = &exchange.head;
        println!(
            "cycle {cycle}: {} {} {}",
            head.version, head.status_code, head.status_message
        );
        for (name, value) in head.headers.iter() {
            println!("  {name}: {value}");
        }

        if head.status_code == 500 {
            eprintln!("cycle {cycle}: server answered 500, stopping");
            break;
        }
        if !exchange.reusable {
            println!("cycle {cycle}: connection not kept alive, reconnecting");
        }
    }

    let snapshot = stats.snapshot();
    println!(
        "exchanges={} failures={} timeouts={}",
        snapshot.exchanges, snapshot.failures, snapshot.timeouts
    );
    Ok(())
}

use anyhow::{Context, Result};
use clap::Parser;

use arena::{ServerConfig, ServerCore, TickDriver, UdpConfig, UdpTransport};

#[derive(Parser)]
#[command(name = "arena-server")]
#[command(about = "Arena session server")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, env = "ARENA_PORT", default_value_t = arena::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value_t = arena::DEFAULT_TICK_RATE)]
    tick_rate: u32,

    #[arg(short, long, default_value_t = 64)]
    max_peers: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig {
        port: args.port,
        tick_rate: args.tick_rate,
        max_peers: args.max_peers,
    };
    let bind_addr = format!("{}:{}", args.bind, config.port);

    let udp_config = UdpConfig {
        max_peers: config.max_peers,
        ..Default::default()
    };
    let transport = UdpTransport::listen(&bind_addr, udp_config)
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    log::info!(
        "Server started on {} at {} Hz",
        transport.local_addr(),
        config.tick_rate
    );

    let running = arena::shutdown::install().context("failed to install Ctrl+C handler")?;
    let mut driver = TickDriver::new(ServerCore::new(transport), config.tick_rate);
    driver.run(&running);

    let stats = driver.core().transport().stats();
    log::info!(
        "Server shutting down ({} packets in, {} out, {} dropped)",
        stats.packets_received,
        stats.packets_sent,
        stats.packets_dropped
    );

    Ok(())
}

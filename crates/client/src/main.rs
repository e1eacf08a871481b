mod console;

use std::net::ToSocketAddrs;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;

use arena::{ClientConfig, ClientEvent, ClientSession, UdpConfig, UdpTransport};

use console::Console;

#[derive(Parser)]
#[command(name = "arena-client")]
#[command(about = "Arena headless client")]
struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(short, long, env = "ARENA_PORT", default_value_t = arena::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value = "Wally")]
    name: String,

    #[arg(long, default_value = "0.1.0")]
    client_version: String,

    #[arg(long, default_value_t = 2.0, help = "Seconds between keepalive pings")]
    ping_interval: f64,

    #[arg(long, default_value_t = 60)]
    frame_rate: u32,

    #[arg(long, help = "Exit after this many seconds")]
    run_for: Option<f64>,
}

fn main() -> Result<()> {
    let console = Console::install();
    let args = Args::parse();

    let server_addr = (args.host.as_str(), args.port)
        .to_socket_addrs()
        .with_context(|| format!("failed to resolve {}:{}", args.host, args.port))?
        .next()
        .with_context(|| format!("no address for {}:{}", args.host, args.port))?;

    let config = ClientConfig {
        player_name: args.name,
        client_version: args.client_version,
        ping_interval: Duration::from_secs_f64(args.ping_interval.max(0.01)),
    };
    config.validate().context("invalid client settings")?;

    let transport = UdpTransport::bind("0.0.0.0:0", UdpConfig::default())
        .context("failed to bind client socket")?;
    let mut session = ClientSession::new(transport, config);
    session.connect(server_addr)?;

    let running = arena::shutdown::install().context("failed to install Ctrl+C handler")?;
    let frame = Duration::from_secs_f64(1.0 / args.frame_rate.max(1) as f64);
    let stop_at = args
        .run_for
        .map(|secs| Instant::now() + Duration::from_secs_f64(secs.max(0.0)));

    'frames: while running.load(Ordering::SeqCst) {
        let frame_start = Instant::now();

        for event in session.poll_once() {
            match event {
                ClientEvent::Connected => log::info!("Connected to {}", server_addr),
                ClientEvent::SessionEstablished { session_id } => {
                    log::info!("Session established: {}", session_id);
                }
                ClientEvent::Pong { rtt_ms } => log::info!("Pong: rtt {} ms", rtt_ms),
                ClientEvent::Disconnected { reason } => {
                    log::warn!("Disconnected: {}", reason);
                    console.drain();
                    break 'frames;
                }
            }
        }

        console.drain();

        if stop_at.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }

        let elapsed = frame_start.elapsed();
        if elapsed < frame {
            std::thread::sleep(frame - elapsed);
        }
    }

    if session.is_active() {
        session.disconnect();
        session.poll_once();
    }
    log::info!("Client exiting");
    console.drain();

    Ok(())
}

//! # MAGSYNC Client
//!
//! The follower: fires one shot per tick until its magazine is empty and
//! every shot is acknowledged, reconciling against the server's count.
//!
//! ## Usage
//!
//! ```bash
//! magsync_client --server 127.0.0.1:8000 --mode event --initial-count 30
//! ```

use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use magsync_networking::cli::{init_logging, CommonArgs, RunFlag};
use magsync_networking::{
    Endpoint, LocalAction, ReliableEndpoint, Role, Session, TickLoop, UdpTransport,
};
use magsync_shared::{SERVER_ADDR, TICK_RATE};
use tracing::{info, warn};

/// MAGSYNC follower client
#[derive(Parser, Debug)]
#[command(name = "magsync_client")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Server address
    #[arg(short, long, default_value = SERVER_ADDR)]
    server: SocketAddr,

    /// Local UDP address to bind
    #[arg(short, long, default_value = "0.0.0.0:0")]
    bind: SocketAddr,

    /// Ticks per second
    #[arg(short, long, default_value_t = TICK_RATE)]
    tick_rate: u32,

    /// Give up after this many ticks
    #[arg(long, default_value_t = 2000)]
    max_ticks: u64,

    #[command(flatten)]
    common: CommonArgs,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.common.log_level);

    let mut config = cli
        .common
        .resolve_config()
        .context("loading configuration")?;
    config.endpoint.name = "client".to_string();

    let endpoint =
        ReliableEndpoint::create(config.endpoint.clone(), 0.0).context("creating endpoint")?;
    let mut transport =
        UdpTransport::bind(cli.bind).with_context(|| format!("binding {}", cli.bind))?;
    transport.set_peer(cli.server);
    let mut session = Session::new(&config.session, Role::Follower, endpoint);
    let mut tick_loop = TickLoop::new(cli.tick_rate);
    let running = RunFlag::on_ctrlc().context("installing Ctrl+C handler")?;

    info!(
        server = %cli.server,
        mode = ?config.session.mode,
        magazine = config.session.initial_count,
        "Client started"
    );

    while running.is_running() && !session.is_finished() {
        if tick_loop.tick_count() >= cli.max_ticks {
            warn!(
                ticks = cli.max_ticks,
                outstanding = session.store().len(),
                "Tick limit reached before the magazine drained"
            );
            break;
        }

        let now = tick_loop.begin_tick();
        let inbound = transport.recv_from_peer();
        let action = (!session.counter().is_exhausted()).then_some(LocalAction::Fire);
        let report = session.tick(now, inbound, action);
        if let Some(sequence) = report.originated {
            info!(sequence, bullets = report.counter, "Fired");
        }
        while let Some(datagram) = session.poll_transmit() {
            transport.send(&datagram);
        }
        tick_loop.end_tick();
        tick_loop.wait_for_next_tick();
    }

    let counter = session.counter().value();
    let rtt = session.endpoint().rtt();
    let loss = session.endpoint().packet_loss();
    let finished = session.is_finished();
    let stats = session.shutdown();
    drop(transport);

    println!();
    println!("┌─ SUMMARY ──────────────────────────────────┐");
    println!("│ Ticks:           {:>10}                │", tick_loop.tick_count());
    println!("│ Bullets left:    {counter:>10}                │");
    println!("│ Shots fired:     {:>10}                │", stats.originated);
    println!("│ Retransmits:     {:>10}                │", stats.retransmits);
    println!("│ Corrections:     {:>10}                │", stats.corrections);
    println!("│ Probes sent:     {:>10}                │", stats.probes_sent);
    println!("│ RTT (ms):        {:>10.1}                │", rtt * 1000.0);
    println!("│ Packet loss (%): {:>10.1}                │", loss * 100.0);
    println!("└────────────────────────────────────────────┘");

    if !running.is_running() {
        warn!("Interrupted before the magazine drained");
        return Ok(());
    }
    if !finished {
        anyhow::bail!("magazine did not drain within {} ticks", cli.max_ticks);
    }
    Ok(())
}

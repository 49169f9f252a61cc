//! # MAGSYNC Server
//!
//! The authority: owns the magazine count for the first client it hears
//! from and answers every shot with the count that remains.
//!
//! ## Usage
//!
//! ```bash
//! magsync_server --bind 0.0.0.0:8000 --mode bare --duration 60
//! ```

use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use magsync_networking::cli::{init_logging, CommonArgs, RunFlag};
use magsync_networking::{Endpoint, ReliableEndpoint, Role, Session, TickLoop, UdpTransport};
use magsync_shared::{SERVER_BIND, TICK_RATE};
use tracing::info;

/// MAGSYNC authority server
#[derive(Parser, Debug)]
#[command(name = "magsync_server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// UDP address to bind
    #[arg(short, long, default_value = SERVER_BIND)]
    bind: SocketAddr,

    /// Ticks per second
    #[arg(short, long, default_value_t = TICK_RATE)]
    tick_rate: u32,

    /// Stop after this many seconds (runs until Ctrl+C when omitted)
    #[arg(short, long)]
    duration: Option<u64>,

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
    config.endpoint.name = "server".to_string();

    let endpoint =
        ReliableEndpoint::create(config.endpoint.clone(), 0.0).context("creating endpoint")?;
    let mut transport =
        UdpTransport::bind(cli.bind).with_context(|| format!("binding {}", cli.bind))?;
    let mut session = Session::new(&config.session, Role::Authority, endpoint);
    let mut tick_loop = TickLoop::new(cli.tick_rate);
    let running = RunFlag::on_ctrlc().context("installing Ctrl+C handler")?;

    info!(
        addr = %transport.local_addr(),
        mode = ?config.session.mode,
        magazine = config.session.initial_count,
        tick_rate = cli.tick_rate,
        "Server listening"
    );

    let tick_budget = cli.duration.map(|secs| secs * u64::from(cli.tick_rate.max(1)));
    let within_budget = |ticks: u64| tick_budget.map_or(true, |budget| ticks < budget);
    while running.is_running() && within_budget(tick_loop.tick_count()) {
        let now = tick_loop.begin_tick();
        let inbound = transport.recv_from_peer();
        session.tick(now, inbound, None);
        while let Some(datagram) = session.poll_transmit() {
            transport.send(&datagram);
        }
        tick_loop.end_tick();
        tick_loop.wait_for_next_tick();
    }

    let rtt = session.endpoint().rtt();
    let stats = session.shutdown();
    let transport_stats = *transport.stats();
    drop(transport);
    info!(
        replies = stats.replies,
        duplicate_events = stats.duplicate_events,
        format_errors = stats.format_errors,
        rtt_ms = rtt * 1000.0,
        sent = transport_stats.packets_sent,
        received = transport_stats.packets_received,
        late_ticks = tick_loop.stats().late_ticks,
        "Server stopped"
    );
    Ok(())
}

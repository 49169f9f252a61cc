//! # Bullet Sync
//!
//! Runs a client and a server in one process over simulated lossy links
//! and prints every shot, ack and correction as it happens.
//!
//! ## Usage
//!
//! ```bash
//! bullet_sync --loss 10 --latency 1 --seed 42 --mode bare
//! ```

use anyhow::Context;
use clap::Parser;
use magsync_networking::cli::{init_logging, CommonArgs};
use magsync_networking::simulation::TickRecord;
use magsync_networking::{BulletSyncScenario, LinkConditions, ScenarioConfig};

/// In-process bullet-sync simulation
#[derive(Parser, Debug)]
#[command(name = "bullet_sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Packet loss percentage on each direction (0-100)
    #[arg(short, long, default_value_t = 10, value_parser = clap::value_parser!(u8).range(0..=100))]
    loss: u8,

    /// One-way latency in ticks
    #[arg(long, default_value_t = 1)]
    latency: u64,

    /// Random seed for the loss pattern
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Give up after this many ticks
    #[arg(long, default_value_t = 1000)]
    max_ticks: u64,

    /// Only print the summary
    #[arg(short, long)]
    quiet: bool,

    #[command(flatten)]
    common: CommonArgs,
}

fn print_record(record: &TickRecord) {
    let client = &record.client;
    if let Some(sequence) = client.originated {
        println!(
            "{}: client sent packet {sequence}, bullets left: {}",
            record.tick, client.counter
        );
    }
    if client.acks.retired > 0 {
        println!(" --> server acked {} packet(s)", client.acks.retired);
    }
    if client.retransmits.resent > 0 {
        println!(
            " --> client resent {} packet(s), rto {:.3}s",
            client.retransmits.resent, client.retransmits.rto
        );
    }
    if record.server.delivered > 0 {
        println!(
            "     server received {} packet(s), bullets left: {}",
            record.server.delivered, record.server.counter
        );
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.common.log_level);

    let config = cli
        .common
        .resolve_config()
        .context("loading configuration")?;

    println!("\nbullet sync ({:?} mode, {}% loss)\n", config.session.mode, cli.loss);

    let scenario_config = ScenarioConfig {
        session: config.session,
        conditions: LinkConditions {
            packet_loss_percent: cli.loss,
            latency_ticks: cli.latency,
        },
        seed: cli.seed,
        max_ticks: cli.max_ticks,
        ..ScenarioConfig::default()
    };
    let mut scenario =
        BulletSyncScenario::new(scenario_config, &config.endpoint).context("creating endpoints")?;

    let quiet = cli.quiet;
    scenario.run_with(|record| {
        if !quiet {
            print_record(record);
        }
    });
    let summary = scenario.finish();

    println!();
    println!("ticks:        {}", summary.ticks);
    println!("client:       {}", summary.client_counter);
    println!("server:       {}", summary.server_counter);
    println!("shots:        {}", summary.client_stats.originated);
    println!("retransmits:  {}", summary.client_stats.retransmits);
    println!("corrections:  {}", summary.client_stats.corrections);
    println!(
        "dropped:      {} up, {} down",
        summary.uplink.dropped, summary.downlink.dropped
    );

    if !(summary.finished && summary.converged()) {
        anyhow::bail!(
            "counters did not converge: client {}, server {}",
            summary.client_counter,
            summary.server_counter
        );
    }
    println!("\nSuccess\n");
    Ok(())
}

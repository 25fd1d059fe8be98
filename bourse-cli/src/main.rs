//! Bourse CLI — run deterministic market simulations and export results.
//!
//! Commands:
//! - `run` — simulate N cycles from a TOML profile (or defaults), print a
//!   closing summary, and export trades/climate history as CSV
//! - `snapshot` — run a simulation and write the full state snapshot JSON

use anyhow::{Context, Result};
use bourse_core::config::SimConfig;
use bourse_core::domain::{NoNotifications, OrderAction};
use bourse_core::{default_roster, MarketSim, OrderDraft};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "bourse", about = "Bourse — single-player market simulation engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate cycles and export trade/climate history as CSV.
    Run {
        /// Number of cycles to simulate.
        #[arg(long, default_value_t = 250)]
        cycles: u32,

        /// Master seed; identical seeds replay identical runs.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Starting cash for the player.
        #[arg(long, default_value_t = 100_000.0)]
        cash: f64,

        /// Path to a TOML configuration profile.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output directory for CSV artifacts.
        #[arg(long, default_value = "results")]
        out: PathBuf,

        /// Place a small scripted set of demo orders into the run.
        #[arg(long, default_value_t = false)]
        demo_orders: bool,
    },
    /// Simulate cycles and write the full state snapshot as JSON.
    Snapshot {
        #[arg(long, default_value_t = 250)]
        cycles: u32,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long, default_value_t = 100_000.0)]
        cash: f64,

        #[arg(long)]
        config: Option<PathBuf>,

        /// Output file for the snapshot JSON.
        #[arg(long, default_value = "results/snapshot.json")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            cycles,
            seed,
            cash,
            config,
            out,
            demo_orders,
        } => run_command(cycles, seed, cash, config.as_deref(), &out, demo_orders),
        Commands::Snapshot {
            cycles,
            seed,
            cash,
            config,
            out,
        } => snapshot_command(cycles, seed, cash, config.as_deref(), &out),
    }
}

fn load_config(path: Option<&Path>) -> Result<SimConfig> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config profile {}", path.display()))?;
            SimConfig::from_toml_str(&text)
                .with_context(|| format!("parsing config profile {}", path.display()))
        }
        None => Ok(SimConfig::default()),
    }
}

fn build_sim(seed: u64, cash: f64, config: Option<&Path>) -> Result<MarketSim> {
    let config = load_config(config)?;
    Ok(MarketSim::new(config, seed, default_roster(), cash))
}

fn place_demo_orders(sim: &mut MarketSim) -> Result<()> {
    sim.place_order(OrderDraft::market("NYMN", OrderAction::Buy, 40))?;
    sim.place_order(OrderDraft::limit("MERC", OrderAction::Buy, 60, 80.0, 40))?;
    sim.place_order(OrderDraft::market("PETR", OrderAction::ShortSell, 30))?;
    Ok(())
}

fn run_command(
    cycles: u32,
    seed: u64,
    cash: f64,
    config: Option<&Path>,
    out: &Path,
    demo_orders: bool,
) -> Result<()> {
    let started = Utc::now();
    let mut sim = build_sim(seed, cash, config)?;
    if demo_orders {
        place_demo_orders(&mut sim)?;
    }

    let mut trades = Vec::new();
    let mut crash_count = 0usize;
    for _ in 0..cycles {
        let report = sim.run_cycle(&NoNotifications)?;
        crash_count += report.crashes.len();
        trades.extend(report.trades);
    }

    fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
    export_trades(&trades, &out.join("trades.csv"))?;
    export_climate(&sim, &out.join("climate.csv"))?;

    let climate = sim.climate_history().last();
    println!("bourse run — {} cycles, seed {seed}", cycles);
    println!("  started: {}", started.to_rfc3339());
    println!(
        "  index:   {:.1}",
        sim.index().composite.latest().map(|c| c.close).unwrap_or(0.0)
    );
    println!(
        "  phase:   {} (fear & greed {:.0})",
        climate.map(|c| c.phase.label()).unwrap_or("-"),
        climate.map(|c| c.fear_greed).unwrap_or(0.0)
    );
    println!("  crashes: {crash_count}");
    println!("  cash:    {:.2}", sim.portfolio().cash);
    println!("  trades:  {} (exported to {})", trades.len(), out.display());
    Ok(())
}

fn snapshot_command(
    cycles: u32,
    seed: u64,
    cash: f64,
    config: Option<&Path>,
    out: &Path,
) -> Result<()> {
    let mut sim = build_sim(seed, cash, config)?;
    for _ in 0..cycles {
        sim.run_cycle(&NoNotifications)?;
    }
    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = sim.snapshot().to_json()?;
    fs::write(out, json).with_context(|| format!("writing {}", out.display()))?;
    println!("snapshot after {cycles} cycles written to {}", out.display());
    Ok(())
}

fn export_trades(trades: &[bourse_core::domain::TradeRecord], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["cycle", "order_id", "symbol", "action", "shares", "price", "fee", "total"])?;
    for trade in trades {
        writer.write_record([
            trade.cycle.to_string(),
            trade
                .order_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            trade.symbol.clone(),
            trade.action.label().to_string(),
            trade.shares.to_string(),
            format!("{:.4}", trade.price),
            format!("{:.4}", trade.fee),
            format!("{:.4}", trade.total),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn export_climate(sim: &MarketSim, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["cycle", "phase", "fear_greed", "index_close"])?;
    let index_candles = sim.index().composite.candles();
    for entry in sim.climate_history() {
        let close = index_candles
            .iter()
            .find(|c| c.cycle == entry.cycle)
            .map(|c| c.close)
            .unwrap_or(0.0);
        writer.write_record([
            entry.cycle.to_string(),
            entry.phase.label().to_string(),
            format!("{:.2}", entry.fear_greed),
            format!("{:.2}", close),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

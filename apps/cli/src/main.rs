#![deny(warnings)]

//! Headless CLI: load or start a game, apply scripted actions, then advance
//! time offline or with the real-time scheduler and print the snapshot.

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use persistence::{default_save_dir, FileStore, Gateway};
use rust_decimal::Decimal;
use sim_core::{AssetId, EconomyConfig, EquipmentId};
use sim_econ::SeededRng;
use sim_runtime::{run_seconds, Action, Notice, Scheduler, SchedulerConfig, SimulationEngine};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Subscriber};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    save_dir: Option<PathBuf>,
    seconds: u64,
    realtime: Option<u64>,
    seed: Option<u64>,
    actions: Vec<Action>,
}

fn parse_withdraw(arg: &str) -> Result<Action> {
    let (amount, address) = arg
        .split_once(':')
        .ok_or_else(|| anyhow!("--withdraw expects <amount>:<address>, got {arg:?}"))?;
    Ok(Action::withdraw_from_input(amount, address))
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        let mut value = || it.next().ok_or_else(|| anyhow!("{arg} needs a value"));
        match arg.as_str() {
            "--config" => args.config = Some(value()?.into()),
            "--save-dir" => args.save_dir = Some(value()?.into()),
            "--seconds" => args.seconds = value()?.parse().context("--seconds")?,
            "--realtime" => args.realtime = Some(value()?.parse().context("--realtime")?),
            "--seed" => args.seed = Some(value()?.parse().context("--seed")?),
            "--buy" => {
                let equipment: EquipmentId = value()?.parse()?;
                args.actions.push(Action::BuyEquipment {
                    equipment,
                    displayed_price: Decimal::ZERO,
                });
            }
            "--mine" | "--stop" => {
                let asset: AssetId = value()?.parse()?;
                args.actions.push(Action::SetMining {
                    asset,
                    enabled: arg == "--mine",
                });
            }
            "--convert" => {
                let asset: AssetId = value()?.parse()?;
                args.actions.push(Action::Convert { asset });
            }
            "--withdraw" => args.actions.push(parse_withdraw(&value()?)?),
            other => bail!("unknown argument {other}"),
        }
    }
    Ok(args)
}

/// Scripted purchases quote the catalog price, as a player clicking the
/// shop button would.
fn quote_prices(actions: &mut [Action], economy: &EconomyConfig) {
    for action in actions {
        if let Action::BuyEquipment {
            equipment,
            displayed_price,
        } = action
        {
            if let Some(spec) = economy.equipment_spec(*equipment) {
                *displayed_price = spec.price;
            }
        }
    }
}

/// Log output filtered only by `filter`, so `RUST_LOG` decides the level.
fn log_subscriber(filter: EnvFilter) -> impl Subscriber + Send + Sync + 'static {
    tracing_subscriber::fmt().with_env_filter(filter).finish()
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing::subscriber::set_global_default(log_subscriber(filter))
        .context("failed to install log subscriber")?;

    let mut args = parse_args()?;
    info!(config = ?args.config, save_dir = ?args.save_dir, seconds = args.seconds, realtime = ?args.realtime, "starting CLI");

    let economy = match &args.config {
        Some(path) => EconomyConfig::load_yaml(path)?,
        None => EconomyConfig::default(),
    };
    quote_prices(&mut args.actions, &economy);

    let save_dir = args.save_dir.clone().unwrap_or_else(default_save_dir);
    let gateway = Gateway::new(FileStore::new(&save_dir));
    let seed = args
        .seed
        .unwrap_or_else(|| Utc::now().timestamp_millis().unsigned_abs());
    let (mut engine, startup) = SimulationEngine::initialize(economy, gateway, SeededRng::new(seed));
    println!("{}", Notice::startup(&startup, engine.config()));

    for action in args.actions {
        let result = engine.dispatch(action, Utc::now());
        println!("{}", Notice::for_result(&result));
    }

    let sched_cfg = SchedulerConfig::default();
    if args.seconds > 0 {
        let summary = run_seconds(&mut engine, &sched_cfg, args.seconds, Utc::now());
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    if let Some(secs) = args.realtime {
        let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
        engine = runtime.block_on(async move {
            let scheduler = Scheduler::start(engine, sched_cfg)?;
            tokio::time::sleep(Duration::from_secs(secs)).await;
            let engine = scheduler.shutdown().await?;
            Ok::<_, anyhow::Error>(engine)
        })?;
    } else {
        engine.save();
    }

    println!("{}", serde_json::to_string_pretty(&engine.snapshot())?);
    Ok(())
}

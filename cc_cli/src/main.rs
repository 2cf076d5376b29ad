use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use tokio::sync::watch;
use wrldbot_config::ConfigStore;
use wrldbot_engine::{AgentTelemetry, DecisionEngine, TickRunner};
use wrldbot_feed::FileFeedWriter;
use wrldbot_logging::LogLevel;
use wrldbot_panel::{BroadcastMonitor, ControlPanel};
use wrldbot_surface::{ActionSink, Component, RestartTrigger, SimWorld, SnapshotSource};

#[derive(Parser, Debug)]
#[command(name = "ccbot", version, about = "hackwrld command-center automation agent")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs the agent loop against the in-memory simulator.
    Run(RunArgs),
    /// Prints the current panel view once.
    Panel {
        #[arg(long, default_value = "ccbot.config.json")]
        config: PathBuf,
    },
    /// Shows or edits the persisted configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Tick budget before the run stops on its own.
    #[arg(long, default_value_t = 240)]
    ticks: u64,
    #[arg(long, default_value = "ccbot.config.json")]
    config: PathBuf,
    /// JSON log file for engine decisions.
    #[arg(long)]
    log: Option<PathBuf>,
    /// Durable JSONL trace of notable agent events.
    #[arg(long)]
    activity_log: Option<PathBuf>,
    /// Agent handle other players see in steal broadcasts.
    #[arg(long, default_value = "Wrldbot")]
    handle: String,
    /// Log decision traces down to debug level.
    #[arg(long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Prints the persisted configuration as JSON.
    Show {
        #[arg(long, default_value = "ccbot.config.json")]
        config: PathBuf,
    },
    /// Sets one configuration key. Keys: control-mode-active,
    /// stealing-mode-active, transfer-threshold-ratio, panel-minimized,
    /// target.<component>.
    Set {
        #[arg(long, default_value = "ccbot.config.json")]
        config: PathBuf,
        key: String,
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Panel { config } => {
            let panel = headless_panel(&config)?;
            print!("{}", panel.view().render());
            Ok(())
        }
        Commands::Config { command } => match command {
            ConfigCommand::Show { config } => {
                let store = ConfigStore::open(&config)?;
                println!("{}", serde_json::to_string_pretty(&*store.current())?);
                Ok(())
            }
            ConfigCommand::Set { config, key, value } => set_config(&config, &key, &value),
        },
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let world = Arc::new(SimWorld::new(&args.handle));
    let store = Arc::new(ConfigStore::open(&args.config)?);

    let mut engine = DecisionEngine::new(
        Arc::clone(&world) as Arc<dyn SnapshotSource>,
        Arc::clone(&world) as Arc<dyn ActionSink>,
        Arc::clone(&world) as Arc<dyn RestartTrigger>,
        Arc::clone(&store),
    );
    if let Some(telemetry) = build_telemetry(&args)? {
        engine = engine.with_telemetry(telemetry);
    }
    let engine = Arc::new(engine);

    let monitor = Arc::new(BroadcastMonitor::new(&args.handle)?);
    let panel = ControlPanel::new(Arc::clone(&store), engine.levels(), monitor.watch());
    let feed = world.feed();
    let monitor_task = tokio::spawn({
        let monitor = Arc::clone(&monitor);
        async move { monitor.run(&feed).await }
    });

    let summary = TickRunner::new(Arc::clone(&engine))
        .with_budget(args.ticks)
        .run()
        .await;
    monitor_task.abort();

    print!("{}", panel.view().render());
    println!(
        "ticks {} | skipped {} | upgrades {} | transfers {} | restarted {}",
        summary.ticks, summary.skipped, summary.upgrades, summary.transfers, summary.restarted
    );
    if summary.restarted {
        println!("session went stale and was restarted; rerun to continue");
    }
    Ok(())
}

fn build_telemetry(args: &RunArgs) -> Result<Option<AgentTelemetry>> {
    if args.log.is_none() && args.activity_log.is_none() {
        return Ok(None);
    }
    let mut builder = AgentTelemetry::builder("engine").min_level(if args.debug {
        LogLevel::Debug
    } else {
        LogLevel::Info
    });
    if let Some(path) = &args.log {
        builder = builder.log_path(path);
    }
    if let Some(path) = &args.activity_log {
        builder = builder.activity_feed(Arc::new(FileFeedWriter::new(path)?));
    }
    Ok(Some(builder.build()?))
}

/// Panel wired to the store only: level and victim channels stay at their
/// initial values when no engine is running.
fn headless_panel(config: &Path) -> Result<ControlPanel> {
    let store = Arc::new(ConfigStore::open(config)?);
    let (_levels_tx, levels) = watch::channel(IndexMap::new());
    let (_victim_tx, victim) = watch::channel(None);
    Ok(ControlPanel::new(store, levels, victim))
}

fn set_config(config: &Path, key: &str, value: &str) -> Result<()> {
    let store = Arc::new(ConfigStore::open(config)?);
    let (_levels_tx, levels) = watch::channel(IndexMap::new());
    let (_victim_tx, victim) = watch::channel(None);
    let panel = ControlPanel::new(Arc::clone(&store), levels, victim);

    let updated = if let Some(label) = key.strip_prefix("target.") {
        let component = component_by_label(label)?;
        panel.set_target(component, value)?
    } else {
        match key {
            "control-mode-active" => {
                panel.set_control_mode(parse_flag(value)?)?
            }
            "stealing-mode-active" => {
                panel.set_stealing_mode(parse_flag(value)?)?
            }
            "panel-minimized" => panel.set_minimized(parse_flag(value)?)?,
            "transfer-threshold-ratio" => panel.set_ratio(value)?,
            other => bail!("unknown configuration key {other:?}"),
        }
    };
    println!("{}", serde_json::to_string_pretty(&*updated)?);
    Ok(())
}

fn component_by_label(label: &str) -> Result<Component> {
    Component::ALL
        .into_iter()
        .find(|component| component.label() == label)
        .with_context(|| format!("unknown component {label:?}"))
}

fn parse_flag(value: &str) -> Result<bool> {
    value
        .parse::<bool>()
        .with_context(|| format!("expected true or false, got {value:?}"))
}

//! Command-line harness for exercising the autoload engine end-to-end
//! against the reference [`autoloader::host::local::LocalHostRuntime`].
//!
//! Not part of the engine's core specification: a real embedding wires
//! [`autoloader::Engine`] into its own host runtime directly. This binary
//! exists so the engine can be driven and observed from a shell.

use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use serde::{Deserialize, Serialize};

use autoloader::{host::local::LocalHostRuntime, Engine, Registry};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(
        long,
        help = "Path to configuration file in TOML format",
        default_value_t = String::from("./autoload.toml"),
    )]
    config_path: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan the configured roots and print every registered logical name.
    Scan,
    /// Scan, then load exactly one logical name through the reference host.
    Load { name: String },
    /// Scan, then eagerly load every registered name.
    EagerLoad,
    /// Scan, install the hook, and watch the configured roots for changes
    /// until interrupted.
    Watch,
}

#[derive(Serialize, Deserialize, Default)]
struct Config {
    roots: Vec<PathBuf>,
    #[serde(default)]
    ignore: Vec<String>,
    #[serde(default)]
    top_level: Option<String>,
    #[serde(default)]
    unit_ext: Option<String>,
    #[serde(default)]
    init_stem: Option<String>,
    #[serde(default)]
    debounce_ms: Option<u64>,
}

fn main() {
    let status = run();
    if let Err(ref err) = status {
        error!("{:?}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    log4rs::init_file("log4rs.yml", Default::default()).with_context(|| "failed to init logger")?;
    info!("init logger");

    info!("read configuration from '{}'", args.config_path);
    let raw = fs::read_to_string(&args.config_path)
        .with_context(|| format!("failed to read configuration file '{}'", args.config_path))?;
    let config: Config = toml::from_str(&raw).with_context(|| "failed to parse configuration")?;

    let registry = Arc::new(Registry::new());
    let host = Arc::new(LocalHostRuntime::new(registry.clone()));
    let mut engine = Engine::new(host.clone(), registry);
    for root in &config.roots {
        engine.add_root(root.clone());
    }
    engine.ignore(config.ignore.clone());
    if let Some(top_level) = &config.top_level {
        engine.top_level(top_level.clone());
    }
    engine.setup().with_context(|| "engine setup failed")?;

    match args.command {
        Command::Scan => {
            let mut names = engine.registry().names();
            names.sort();
            for name in names {
                println!("{name}");
            }
        }
        Command::Load { name } => {
            host.reference(&name)
                .map_err(|message| anyhow::anyhow!(message))
                .with_context(|| format!("failed to load '{name}'"))?;
            println!("loaded '{name}'");
        }
        Command::EagerLoad => {
            let errors = engine.eager_load();
            for (name, err) in &errors {
                error!("'{}' failed: {}", name, err);
            }
            if !errors.is_empty() {
                anyhow::bail!("{} unit(s) failed to load", errors.len());
            }
            println!("eagerly loaded {} unit(s)", engine.registry().names().len());
        }
        Command::Watch => {
            engine
                .enable_reloading(Some(Box::new(|name: &str| info!("reloaded '{name}'"))))
                .with_context(|| "failed to start watcher")?;
            println!("watching for changes, press Ctrl+C to stop");
            loop {
                std::thread::sleep(std::time::Duration::from_secs(3600));
            }
        }
    }

    engine.teardown();
    Ok(())
}

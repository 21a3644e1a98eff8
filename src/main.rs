use std::sync::Arc;

use clap::Parser;
use log::{error, info};

use adventures::{AdventureStore, App, Cli, Config, Persistence, Result, SimulatedPlatform};

pub fn initialize_logger(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_secs()
        .format_module_path(true)
        .init();

    info!("Logger initialized");
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if cli.memory {
        config.persistence = Persistence::Memory;
    }

    let store = Arc::new(AdventureStore::open(config.repository())?);
    let platform = SimulatedPlatform::standard(cli.command.device_position()?);

    let app = App::new(store, config, platform, cli.verbose);
    app.run(cli.command).await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    initialize_logger(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

//! Binary entrypoint for the TextSmith CLI.
//!
//! Commands:
//! - `start` - run the world server
//! - `init` - create a starter `config.toml` and seed the world snapshot
//! - `add-user <username>` - create a user account (argon2 hashed password)
//! - `status` - print a summary of the configured world snapshot
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};

use textsmith::config::Config;
use textsmith::persist::{self, Snapshotter};
use textsmith::server::Server;
use textsmith::world::WorldStore;

#[derive(Parser)]
#[command(name = "textsmith")]
#[command(about = "A multi-user textual world server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the world server
    Start,
    /// Initialize a new configuration and an empty world
    Init,
    /// Create a user account, prompting for a password
    AddUser {
        /// Username (alphanumeric)
        username: String,
        /// Short self-description shown to other users
        #[arg(short, long, default_value = "A newcomer.")]
        description: String,
    },
    /// Show a summary of the world snapshot
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Start => {
            let config = Config::load(&cli.config).await?;
            start_server(config).await
        }
        Commands::Init => init(&cli.config).await,
        Commands::AddUser {
            username,
            description,
        } => {
            let config = Config::load(&cli.config).await?;
            add_user(&config, &username, &description)
        }
        Commands::Status => {
            let config = Config::load(&cli.config).await?;
            status(&config)
        }
    }
}

async fn start_server(config: Config) -> Result<()> {
    info!("Starting TextSmith v{}", env!("CARGO_PKG_VERSION"));
    let snapshot_path = std::path::PathBuf::from(&config.world.snapshot_path);
    let store = Arc::new(persist::load(&snapshot_path).context("failed to load world snapshot")?);
    if store.seed_if_empty(&config.world.default_room_fqn)? {
        info!("seeded empty world with {}", config.world.default_room_fqn);
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let snapshotter = Snapshotter::new(
        Arc::clone(&store),
        snapshot_path,
        config.world.snapshot_interval_secs,
        shutdown_rx.clone(),
    );
    let snapshot_task = tokio::spawn(snapshotter.run());

    let server = Server::new(config, Arc::clone(&store));
    let server_task = tokio::spawn(server.run(shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("shutdown requested");
    shutdown_tx.send(true).ok();

    if let Err(err) = server_task.await? {
        error!("server error: {}", err);
    }
    snapshot_task.await.ok();
    Ok(())
}

async fn init(config_path: &str) -> Result<()> {
    if tokio::fs::try_exists(config_path).await.unwrap_or(false) {
        anyhow::bail!("{} already exists, refusing to overwrite", config_path);
    }
    Config::create_default(config_path).await?;
    let config = Config::load(config_path).await?;

    let store = WorldStore::new();
    store.seed_if_empty(&config.world.default_room_fqn)?;
    persist::save(&store, std::path::Path::new(&config.world.snapshot_path))?;

    println!("Wrote {} and {}.", config_path, config.world.snapshot_path);
    println!("Next: textsmith add-user <name>, then textsmith start.");
    Ok(())
}

fn add_user(config: &Config, username: &str, description: &str) -> Result<()> {
    let snapshot_path = std::path::Path::new(&config.world.snapshot_path);
    let store = persist::load(snapshot_path)?;
    store.seed_if_empty(&config.world.default_room_fqn)?;

    let password = rpassword::prompt_password(format!("Password for {}: ", username))?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if password != confirm {
        anyhow::bail!("passwords do not match");
    }
    if password.len() < 4 {
        anyhow::bail!("password must be at least 4 characters");
    }

    let user = store.create_user(username, description, &password)?;
    persist::save(&store, snapshot_path)?;
    println!("Created user {} ({}).", user.name, user.fqn);
    Ok(())
}

fn status(config: &Config) -> Result<()> {
    let snapshot_path = std::path::Path::new(&config.world.snapshot_path);
    let store = persist::load(snapshot_path)?;
    println!("Snapshot:  {}", config.world.snapshot_path);
    println!("Entities:  {}", store.entity_count());
    println!("Listen on: {}", config.server.bind);
    println!("Home room: {}", config.world.default_room_fqn);
    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let level = match (verbosity, config) {
        (1, _) => log::LevelFilter::Debug,
        (v, _) if v >= 2 => log::LevelFilter::Trace,
        (0, Some(cfg)) => cfg
            .logging
            .level
            .parse()
            .unwrap_or(log::LevelFilter::Info),
        (0, None) => log::LevelFilter::Info,
        _ => log::LevelFilter::Info,
    };
    builder.filter_level(level);
    builder.format(|fmt, record| {
        writeln!(
            fmt,
            "{} [{}] {}",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
            record.level(),
            record.args()
        )
    });
    let _ = builder.try_init();
}

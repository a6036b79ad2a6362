//! git-identity - Keep your commit identity correct in every repository
//!
//! Run with `git-identity show` or `git-identity --help` for usage.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use git_identity::{
    APP_NAME, AssignmentState, Config, Git, IdentityGuard, Repository, VERSION,
    git::{ConfigScope, locate},
    watch::IdentityWatcher,
};

#[derive(Parser)]
#[command(name = APP_NAME)]
#[command(version = VERSION)]
#[command(about = "Keep your git user.name and user.email correct in every repository")]
#[command(long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// git binary to try before searching for one
    #[arg(long)]
    git: Option<PathBuf>,

    /// Repository to operate on
    #[arg(short = 'C', long = "repo", default_value = ".")]
    repo: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which git binary would be used
    Locate {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the identity in effect and whether it is the right one
    Show,

    /// List configured identities
    List,

    /// Apply a configured identity to the repository
    Use {
        /// Identity label
        label: String,

        /// Config scope to write to (default from config file)
        #[arg(short, long)]
        scope: Option<ConfigScope>,
    },

    /// List changed files (`git status`)
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-check the identity periodically until interrupted
    Watch {
        /// Seconds between checks (default from config file)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Show configuration
    Config {
        /// Initialize config file with defaults
        #[arg(long)]
        init: bool,
    },
}

fn setup_logging(debug: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        // Use info level for our crate, warn for dependencies
        EnvFilter::new("info").add_directive("tokio=warn".parse()?)
    };

    if let Some(path) = log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(file).with_target(false))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .with(filter)
            .init();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install color-eyre error hooks
    color_eyre::install()?;

    let cli = Cli::parse();

    let config_file = match cli.config.clone() {
        Some(path) => path,
        None => Config::config_file_path()?,
    };

    // Load configuration
    let config = Config::load_from(&config_file).unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config, using defaults: {}", e);
        Config::default()
    });

    setup_logging(cli.debug || config.debug, config.log_file.as_deref())?;

    if let Commands::Config { init } = cli.command {
        if init {
            config.save_to(&config_file)?;
            println!("Configuration initialized at {:?}", config_file);
        } else {
            println!("Configuration:");
            println!("{}", toml::to_string_pretty(&config)?);
            println!("\nConfig file: {:?}", config_file);
            println!("State file: {:?}", Config::state_file_path()?);
        }
        return Ok(());
    }

    let hint = cli.git.or_else(|| config.git_path.clone());
    let binary = locate(hint.as_deref()).await?;

    if let Commands::Locate { json } = cli.command {
        if json {
            let value = serde_json::json!({
                "path": binary.path,
                "version": binary.version,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        } else {
            println!("git {} at {}", binary.version, binary.path.display());
        }
        return Ok(());
    }

    let git = Git::new(binary);
    let repo = git.open(&cli.repo);
    let guard = IdentityGuard::new(config.identities.clone())?;

    match cli.command {
        Commands::Show => {
            let current = guard.current(&repo).await?;
            let status = guard.check(&repo).await?;

            println!("Identity: {}", current);
            println!("Status:   {}", status);

            let root = repo.root().await?;
            let state = AssignmentState::load().unwrap_or_else(|e| {
                warn!("Ignoring assignments: {}", e);
                AssignmentState::new()
            });
            if let Some(assignment) = state.get(&root) {
                println!(
                    "Assigned: '{}' on {}",
                    assignment.identity,
                    assignment.assigned_at.format("%Y-%m-%d %H:%M UTC")
                );
            }
        }

        Commands::List => {
            if guard.identities().is_empty() {
                println!("No identities configured.");
                println!("Add [[identities]] entries to {:?}", config_file);
                return Ok(());
            }

            let current = guard.current(&repo).await.unwrap_or_default();
            for identity in guard.identities() {
                let marker = if identity.matches(&current) { "●" } else { "○" };
                println!("  {} {:<12} {}", marker, identity.label, identity);
                for remote in &identity.remotes {
                    println!("      remote: {}", remote);
                }
            }
        }

        Commands::Use { label, scope } => {
            let scope = scope.unwrap_or(config.scope);
            let identity = guard.apply(&repo, &label, Some(scope)).await?;
            println!("Now committing as {} ({} scope)", identity, scope);

            record_assignment(&repo, &guard, &label).await?;
        }

        Commands::Status { json } => {
            let entries = repo.status().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("Nothing to commit, working tree clean");
            } else {
                for entry in entries {
                    match &entry.rename {
                        Some(to) => println!("{} {} -> {}", entry.code(), entry.path, to),
                        None => println!("{} {}", entry.code(), entry.path),
                    }
                }
            }
        }

        Commands::Watch { interval } => {
            let period = interval
                .map(|secs| std::time::Duration::from_secs(secs.max(1)))
                .unwrap_or_else(|| config.poll_interval());

            let mut watcher = IdentityWatcher::new(guard, repo);
            watcher.start(period);

            tokio::signal::ctrl_c().await?;
            info!("Interrupted, stopping watcher");
            watcher.stop().await;
        }

        Commands::Locate { .. } | Commands::Config { .. } => unreachable!("handled above"),
    }

    Ok(())
}

/// Remember which identity was applied to the repository
async fn record_assignment(repo: &Repository, guard: &IdentityGuard, label: &str) -> Result<()> {
    let root = repo.root().await?;

    let mut state = AssignmentState::load_or_reset_default()?;
    state.retain_identities(guard.identities().iter().map(|i| i.label.as_str()));
    state.record(root, label);
    state.save()?;

    Ok(())
}

//! Battery rental back office: operator commands
//!
//! ```sh
//! # Fix stored battery statuses (default config path)
//! battery-rental fix-battery-status
//!
//! # Show what would change without writing
//! battery-rental fix-battery-status --dry-run
//!
//! # Make a user an active moderator of Kraków
//! battery-rental sync-moderator anna --city KRK
//!
//! # Validate the configuration
//! battery-rental --config /etc/battery-rental/config.toml check
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use battery_rental::config::AppConfig;
use battery_rental::domain::DomainError;
use battery_rental::{init_tracing, Runtime};

#[derive(Parser, Debug)]
#[command(
    name = "battery-rental",
    version,
    about = "Operator commands for the battery rental back office",
    long_about = "Operator commands for the battery rental back office.\n\n\
                  Default config: ~/.config/battery-rental/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "BATTERY_RENTAL_CONFIG")]
    config: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bring stored battery statuses in line with assignments and repairs.
    FixBatteryStatus {
        /// Report the fixes without writing them.
        #[arg(long)]
        dry_run: bool,
    },
    /// Ensure a user has an active moderator record.
    SyncModerator {
        username: String,
        /// City code, required when the user has no partner record yet.
        #[arg(long)]
        city: Option<String>,
    },
    /// Apply database migrations and exit.
    Migrate,
    /// Validate the configuration file and exit.
    Check,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // ── Load configuration ─────────────────────────────────────
    let config_path = cli
        .config
        .unwrap_or_else(battery_rental::default_config_path);

    let config = match AppConfig::load(&config_path) {
        Ok(cfg) => {
            init_tracing(&cfg, cli.log_level.as_deref());
            info!("Configuration loaded from {}", config_path.display());
            cfg
        }
        Err(e) => {
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
                .init();
            error!("Failed to load config from {}: {}", config_path.display(), e);
            return Err(e.into());
        }
    };

    if let Command::Check = cli.command {
        config.validate()?;
        println!("Configuration is valid");
        println!("   Config file : {}", config_path.display());
        println!("   Database    : {}", config.database.url);
        println!("   Timezone    : {}", config.calendar.timezone);
        println!(
            "   Cutoff      : {}",
            config
                .settlement
                .cutoff_date
                .map_or_else(|| "all history".to_string(), |d| d.to_string())
        );
        println!("   Log level   : {}", config.logging.level);
        return Ok(());
    }

    let runtime = Runtime::start(config).await?;

    match cli.command {
        Command::FixBatteryStatus { dry_run } => {
            let report = runtime
                .back_office
                .reconcile_battery_status(None, dry_run)
                .await?;
            if report.is_empty() {
                info!("All battery statuses are consistent");
            }
            for (status, codes) in report.groups() {
                let verb = if dry_run { "would set" } else { "set" };
                println!("{} {} -> {}: {}", verb, codes.len(), status, codes.join(", "));
            }
        }
        Command::SyncModerator { username, city } => {
            let city_id = match city {
                Some(code) => Some(
                    runtime
                        .repos
                        .cities()
                        .find_by_code(&code)
                        .await?
                        .ok_or_else(|| DomainError::Validation(format!("unknown city {}", code)))?
                        .id,
                ),
                None => None,
            };
            let outcome = runtime
                .back_office
                .partners()
                .sync_moderator(&username, city_id)
                .await?;
            let partner = outcome.partner();
            println!(
                "{}: moderator {} (partner {}, city {})",
                outcome.label(),
                username,
                partner.id,
                partner
                    .city_id
                    .map_or_else(|| "-".to_string(), |c| c.to_string())
            );
        }
        Command::Migrate => {
            println!("Database is up to date");
        }
        Command::Check => {}
    }

    Ok(())
}

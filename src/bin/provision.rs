//! Account provisioning for the skeptic bot.
//!
//! ```bash
//! # Create the secret if needed, the admin account and 30 users
//! skeptic-provision init --count 30
//!
//! # Print the invite token of one account
//! skeptic-provision token happy-otter-204
//! ```

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use skeptic_bot::core::config::defaults::DEFAULT_MAX_TOKENS;
use skeptic_bot::core::config::{AppPaths, ConfigService};
use skeptic_bot::core::logging;
use skeptic_bot::core::security::InviteSecret;
use skeptic_bot::provisioning::{create_invites, provision_users, ADMIN_USER_ID};
use skeptic_bot::users::UserStore;

#[derive(Parser)]
#[command(
    name = "skeptic-provision",
    about = "Invite and account provisioning for the skeptic bot",
    long_about = "Creates the shared invite secret, user accounts and invite tokens"
)]
struct Cli {
    /// Data directory override (defaults to SKEPTIC_DATA_DIR or the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ensure the admin account exists and add new user accounts
    Init {
        #[arg(long, default_value_t = 30)]
        count: usize,
    },
    /// Write a flat `{id: token}` invite file
    Invites {
        #[arg(long, default_value_t = 20)]
        count: usize,
        #[arg(long, default_value = "valid_users.json")]
        out: PathBuf,
    },
    /// Create the invite secret if it does not exist yet
    Secret,
    /// Print the invite token for an identifier
    Token { user_id: String },
}

fn main() -> Result<()> {
    logging::init_cli();
    let cli = Cli::parse();

    let paths = match cli.data_dir {
        Some(dir) => AppPaths::from_data_dir(AppPaths::new().project_root, dir),
        None => AppPaths::new(),
    };

    match cli.command {
        Command::Init { count } => {
            let secret = load_or_create_secret(&paths)?;
            let max_tokens = default_max_tokens(&paths);
            let store = UserStore::new(paths.users_path.clone());
            let report = store
                .update(|table| {
                    provision_users(table, &secret, count, max_tokens, &mut rand::rng())
                })
                .context("Failed to provision users")?;

            if report.admin_created {
                println!("Created admin user: {}", ADMIN_USER_ID);
            }
            println!(
                "Added {} users with tag: {}",
                report.added.len(),
                report.created_date
            );
            for user_id in &report.added {
                println!("  {}", user_id);
            }
        }
        Command::Invites { count, out } => {
            let secret = load_or_create_secret(&paths)?;
            let invites = create_invites(&secret, count, &mut rand::rng())?;
            let payload = serde_json::to_string_pretty(&invites)?;
            fs::write(&out, payload)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            println!("Generated {} invites in {}", invites.len(), out.display());
        }
        Command::Secret => {
            let secret = load_or_create_secret(&paths)?;
            println!(
                "Secret key tag: {}",
                secret.created().unwrap_or("unknown")
            );
        }
        Command::Token { user_id } => {
            let secret = InviteSecret::load(&paths.secret_path)?;
            println!("{}", secret.derive_token(&user_id)?);
        }
    }

    Ok(())
}

/// `chat.default_max_tokens` from the server config, if it loads.
fn default_max_tokens(paths: &AppPaths) -> u64 {
    let config = ConfigService::new(Arc::new(paths.clone()));
    match config.load_app_config() {
        Ok(settings) => settings.chat.default_max_tokens,
        Err(err) => {
            tracing::warn!("Using built-in token budget, config failed to load: {}", err);
            DEFAULT_MAX_TOKENS
        }
    }
}

fn load_or_create_secret(paths: &AppPaths) -> Result<InviteSecret> {
    let (secret, created) = InviteSecret::load_or_create(&paths.secret_path)
        .with_context(|| format!("Failed to load {}", paths.secret_path.display()))?;
    if created {
        println!(
            "Secret key created with tag: {}",
            secret.created().unwrap_or("unknown")
        );
    }
    Ok(secret)
}

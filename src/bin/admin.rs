//! CLI administration tool for snaplink.
//!
//! Issues and revokes the API tokens that identify link owners, prints link statistics
//! and checks the database connection without going through the HTTP API.
//!
//! # Usage
//!
//! ```bash
//! # Issue a token for an owner
//! cargo run --bin admin -- token create --owner alice --tier premium
//!
//! # List all tokens
//! cargo run --bin admin -- token list
//!
//! # Revoke a token by name or id
//! cargo run --bin admin -- token revoke "alice-laptop"
//!
//! # Link statistics
//! cargo run --bin admin -- stats
//!
//! # Check database connection
//! cargo run --bin admin -- db check
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` or `DB_*` components (required)
//! - `TOKEN_SIGNING_SECRET` (required for `token create`): must match the server's

use snaplink::application::services::auth_service::hash_token;
use snaplink::config::Config;
use snaplink::domain::entities::Tier;
use snaplink::domain::repositories::{ApiToken, NewApiToken, StoreError, TokenRepository};
use snaplink::infrastructure::persistence::{PgLinkRepository, PgTokenRepository};

use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use dialoguer::{Confirm, Input};
use sqlx::PgPool;
use std::sync::Arc;

/// Random bytes per token; encodes to 48 URL-safe characters.
const TOKEN_BYTES: usize = 36;

/// CLI tool for managing snaplink.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage API tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },

    /// Show link statistics
    Stats,

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Issue a new API token
    Create {
        /// Owner id the token authenticates as
        #[arg(short, long)]
        owner: Option<String>,

        /// Rate limit tier
        #[arg(long, value_enum, default_value_t = TierArg::Authenticated)]
        tier: TierArg,

        /// Token name (e.g., "alice-laptop"); defaults to the owner id
        #[arg(short, long)]
        name: Option<String>,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// List all tokens
    List,

    /// Revoke a token
    Revoke {
        /// Token name or id
        name_or_id: String,
    },
}

#[derive(Subcommand)]
enum DbAction {
    /// Check database connection
    Check,
}

#[derive(Clone, Copy, ValueEnum)]
enum TierArg {
    Authenticated,
    Premium,
}

impl From<TierArg> for Tier {
    fn from(tier: TierArg) -> Self {
        match tier {
            TierArg::Authenticated => Tier::Authenticated,
            TierArg::Premium => Tier::Premium,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let database_url = Config::load_database_url()?;
    let pool = PgPool::connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    match cli.command {
        Commands::Token { action } => handle_token_action(action, &pool).await?,
        Commands::Stats => handle_stats(&pool).await?,
        Commands::Db { action } => handle_db_action(action, &pool).await?,
    }

    Ok(())
}

async fn handle_token_action(action: TokenAction, pool: &PgPool) -> Result<()> {
    let repo = PgTokenRepository::new(Arc::new(pool.clone()));

    match action {
        TokenAction::Create {
            owner,
            tier,
            name,
            yes,
        } => create_token(&repo, owner, tier.into(), name, yes).await,
        TokenAction::List => list_tokens(&repo).await,
        TokenAction::Revoke { name_or_id } => revoke_token(&repo, &name_or_id).await,
    }
}

/// Issues a token.
///
/// Only the HMAC-SHA256 hash (keyed with `TOKEN_SIGNING_SECRET`) is stored; the raw
/// token is printed once.
async fn create_token(
    repo: &PgTokenRepository,
    owner: Option<String>,
    tier: Tier,
    name: Option<String>,
    skip_confirm: bool,
) -> Result<()> {
    let signing_secret =
        std::env::var("TOKEN_SIGNING_SECRET").context("TOKEN_SIGNING_SECRET must be set")?;

    println!("{}", "Create API Token".bright_blue().bold());
    println!();

    let owner_id = match owner {
        Some(owner) => owner,
        None => Input::new().with_prompt("Owner id").interact_text()?,
    };
    let owner_id = owner_id.trim().to_string();
    if owner_id.is_empty() {
        anyhow::bail!("Owner id must not be empty");
    }

    let name = name.unwrap_or_else(|| owner_id.clone());
    let token = generate_token()?;

    println!("{}", "Token details:".bright_white().bold());
    println!("  Name:  {}", name.cyan());
    println!("  Owner: {}", owner_id.cyan());
    println!("  Tier:  {}", tier.to_string().cyan());
    println!();

    if !skip_confirm {
        let confirmed = Confirm::new()
            .with_prompt("Create this token?")
            .default(true)
            .interact()?;

        if !confirmed {
            println!("{}", "Cancelled".red());
            return Ok(());
        }
    }

    let new_token = NewApiToken {
        name,
        owner_id,
        tier,
        token_hash: hash_token(&signing_secret, &token),
    };

    match repo.create_token(new_token).await {
        Ok(_) => {}
        Err(StoreError::UniqueViolation) => {
            anyhow::bail!("A token with this name already exists")
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to create token: {e}")),
    }

    println!("{}", "Token created.".green().bold());
    println!(
        "{}",
        "Save it now, it cannot be shown again:".red().bold()
    );
    println!();
    println!(
        "  {}: Bearer {}",
        "Authorization".bright_cyan(),
        token.bright_yellow()
    );
    println!();

    Ok(())
}

async fn list_tokens(repo: &PgTokenRepository) -> Result<()> {
    let tokens = repo
        .list_tokens()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list tokens: {e}"))?;

    if tokens.is_empty() {
        println!("{}", "  No tokens found".yellow());
        println!(
            "  Create one with: {} admin -- token create",
            "cargo run --bin".bright_cyan()
        );
        return Ok(());
    }

    println!(
        "  {:<5} {:<24} {:<20} {:<14} {:<17} {:<10}",
        "ID".bright_white().bold(),
        "Name".bright_white().bold(),
        "Owner".bright_white().bold(),
        "Tier".bright_white().bold(),
        "Last used".bright_white().bold(),
        "Status".bright_white().bold()
    );
    println!("  {}", "-".repeat(92).bright_black());

    for token in &tokens {
        let status = if token.is_revoked() {
            "REVOKED".red()
        } else {
            "ACTIVE".green()
        };
        let last_used = token
            .last_used_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());

        println!(
            "  {:<5} {:<24} {:<20} {:<14} {:<17} {}",
            token.id.to_string().bright_black(),
            token.name.cyan(),
            token.owner_id,
            token.tier.as_str(),
            last_used.bright_black(),
            status
        );
    }

    println!();
    println!("  Total: {}", tokens.len().to_string().bright_white().bold());

    Ok(())
}

/// Revokes a token by id (numeric input) or exact name, after confirmation.
async fn revoke_token(repo: &PgTokenRepository, name_or_id: &str) -> Result<()> {
    let tokens = repo
        .list_tokens()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list tokens: {e}"))?;

    let token = find_token(&tokens, name_or_id).context("Token not found")?;

    if token.is_revoked() {
        println!("{}", "This token is already revoked".yellow());
        return Ok(());
    }

    println!("  Token: {}", token.name.cyan());
    println!("  Owner: {}", token.owner_id.cyan());
    println!("  ID:    {}", token.id.to_string().bright_black());
    println!();

    let confirmed = Confirm::new()
        .with_prompt("Revoke this token?")
        .default(false)
        .interact()?;

    if !confirmed {
        println!("{}", "Cancelled".red());
        return Ok(());
    }

    let revoked = repo
        .revoke_token(token.id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to revoke token: {e}"))?;

    if revoked {
        println!("{}", "Token revoked.".green().bold());
    } else {
        println!("{}", "Token was revoked concurrently".yellow());
    }

    Ok(())
}

fn find_token<'a>(tokens: &'a [ApiToken], name_or_id: &str) -> Option<&'a ApiToken> {
    match name_or_id.parse::<i64>() {
        Ok(id) => tokens.iter().find(|t| t.id == id),
        Err(_) => tokens.iter().find(|t| t.name == name_or_id),
    }
}

async fn handle_stats(pool: &PgPool) -> Result<()> {
    let repo = PgLinkRepository::new(Arc::new(pool.clone()));
    let summary = repo
        .summary()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load statistics: {e}"))?;

    let tokens_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM api_tokens WHERE revoked_at IS NULL")
            .fetch_one(pool)
            .await?;

    println!("{}", "Statistics".bright_blue().bold());
    println!();
    println!("  Links:         {}", summary.links.to_string().bright_green().bold());
    println!("    anonymous:   {}", summary.anonymous);
    println!("    private:     {}", summary.private);
    println!("  Clicks:        {}", summary.clicks.to_string().bright_green().bold());
    println!("  Active tokens: {}", tokens_count.to_string().bright_green().bold());

    Ok(())
}

async fn handle_db_action(action: DbAction, pool: &PgPool) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "Checking database connection...".bright_blue());

            let version: String = sqlx::query_scalar("SELECT version()")
                .fetch_one(pool)
                .await?;

            println!("{}", "Database connection OK".green().bold());
            println!("  PostgreSQL: {}", version.bright_white());
        }
    }

    Ok(())
}

/// 36 random bytes from the OS, URL-safe base64 without padding.
fn generate_token() -> Result<String> {
    let mut buffer = [0u8; TOKEN_BYTES];
    getrandom::fill(&mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to generate random bytes: {e}"))?;
    Ok(URL_SAFE_NO_PAD.encode(buffer))
}

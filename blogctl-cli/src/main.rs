//! blogctl - blog API server
//!
//! - `serve`: run the HTTP API (migrations first unless skipped)
//! - `migrate`: create or update the schema and exit
//!
//! Settings come from the environment (a `.env` file is loaded first);
//! flags override individual values.

use std::net::SocketAddr;

use anyhow::{bail, Context, Result};
use blogctl_server::db::migrations;
use blogctl_server::{create_lazy_pool, create_pool, run_server, Database, ServerConfig};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

mod tracing_setup;

use tracing_setup::TracingConfig;

#[derive(Parser, Debug)]
#[command(name = "blogctl", version, about = "Blog API server with posts, comments, votes, search and calendar")]
struct Cli {
    /// Debug logging (RUST_LOG still wins when set)
    #[arg(long, global = true)]
    debug: bool,

    /// Export traces over OTLP (needs the telemetry feature)
    #[arg(long, global = true)]
    otel: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve(ServeArgs),
    /// Apply the database schema and exit
    Migrate(MigrateArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to bind, overriding HOST and PORT
    #[arg(long, env = "BLOGCTL_BIND")]
    bind: Option<SocketAddr>,

    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Start without running migrations
    #[arg(long)]
    skip_migrations: bool,
}

#[derive(Args, Debug)]
struct MigrateArgs {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
}

/// Environment config with flag overrides applied.
fn load_config(args: &ServeArgs) -> Result<ServerConfig> {
    let mut config = ServerConfig::from_lookup(|key| match key {
        "DATABASE_URL" => args
            .database_url
            .clone()
            .or_else(|| std::env::var(key).ok()),
        _ => std::env::var(key).ok(),
    })
    .context("invalid server configuration")?;

    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    Ok(config)
}

async fn serve(args: ServeArgs) -> Result<()> {
    let config = load_config(&args)?;

    let pool = create_lazy_pool(&config.database_url, config.db_max_connections)
        .context("invalid DATABASE_URL")?;
    let db = Database::with_policy(pool, config.retry_policy());

    // The pool connects lazily, so a failed check here still lets a
    // development server come up and recover once the database does.
    let connected = match db.ping().await {
        Ok(()) => {
            info!("database connection established");
            true
        }
        Err(err) if config.env.is_production() => {
            return Err(err).context("database unreachable at startup");
        }
        Err(err) => {
            warn!(error = %err, "database unreachable, continuing in {} mode", config.env.as_str());
            false
        }
    };

    if args.skip_migrations {
        info!("skipping migrations");
    } else if connected {
        migrations::run(&db).await.context("migrations failed")?;
    } else {
        warn!("migrations not run: no database connection");
    }

    run_server(db, config).await.context("server error")?;
    Ok(())
}

async fn migrate(args: MigrateArgs) -> Result<()> {
    if args.database_url.trim().is_empty() {
        bail!("DATABASE_URL is empty");
    }
    let pool = create_pool(&args.database_url, 1)
        .await
        .context("could not connect to the database")?;
    migrations::run(&Database::new(pool))
        .await
        .context("migrations failed")?;
    info!("schema is up to date");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_setup::init(&TracingConfig {
        debug: cli.debug,
        otel: cli.otel,
    })
    .context("failed to initialize logging")?;

    let result = match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Migrate(args) => migrate(args).await,
    };

    tracing_setup::shutdown_otel();
    result
}

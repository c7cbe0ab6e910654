use anyhow::Context;
use clap::Args;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

/// Log filter used when `RUST_LOG` is unset or blank.
pub const DEFAULT_LOG_FILTER: &str = "faculty_evaluation=info";

/// Builds the log filter from the `RUST_LOG` directives, falling back to
/// `DEFAULT_LOG_FILTER` when they are absent or do not parse.
pub fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

#[derive(Debug, Clone, Args)]
pub struct StoreConfig {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    pub database_url: Option<String>,

    /// Size of the connection pool
    #[arg(long, env = "EVALUATION_MAX_CONNECTIONS", global = true, default_value_t = 5)]
    pub max_connections: u32,

    /// How often a save is retried after a concurrent write
    #[arg(long, env = "EVALUATION_SAVE_ATTEMPTS", global = true, default_value_t = 3)]
    pub save_attempts: usize,
}

impl StoreConfig {
    pub async fn connect(&self) -> anyhow::Result<PgPool> {
        let database_url = self
            .database_url
            .as_deref()
            .context("DATABASE_URL must be set to the evaluation Postgres instance")?;

        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(database_url)
            .await
            .context("failed to connect to Postgres")
    }
}

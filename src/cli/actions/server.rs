use crate::{
    api::{self, AuthConfig, AuthState},
    store::{Store, memory::MemoryStore, postgres::PgStore},
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub auth_config: AuthConfig,
    pub cors_origin: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the token configuration is invalid, the database
/// cannot be reached or migrated, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_state = Arc::new(AuthState::new(args.auth_config)?);

    let store: Arc<dyn Store> = match &args.dsn {
        Some(dsn) => {
            let store = PgStore::connect(dsn).await?;
            store
                .apply_schema()
                .await
                .context("Failed to apply database schema")?;
            info!("Connected to PostgreSQL");
            Arc::new(store)
        }
        None => {
            warn!("No --dsn given: using the in-memory store, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    api::new(args.port, store, auth_state, &args.cors_origin).await
}

//! Puppet numbering: every X account that completes the handshake gets a
//! sequential number, assigned the first time we see it and stable afterwards.
//!
//! Whether numbers survive a restart is a deployment choice. The in-memory store
//! resets on every cold start; the SQLite store keeps them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use color_eyre::eyre::{eyre, WrapErr as _};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

/// A puppet number, always at least 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ordinal(u64);

impl Ordinal {
    pub const FIRST: Ordinal = Ordinal(1);

    pub fn new(value: u64) -> Option<Self> {
        (value >= 1).then_some(Ordinal(value))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Ordinal(self.0 + 1)
    }
}

/// Zero padded to four digits, wider numbers are printed in full
impl fmt::Display for Ordinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuppetAssignment {
    pub provider_user_id: String,
    pub ordinal: Ordinal,
}

impl PuppetAssignment {
    pub fn display_name(&self) -> String {
        format!("Herta Puppet #{}", self.ordinal)
    }
}

#[async_trait::async_trait]
pub trait PuppetStore: Send + Sync {
    /// Look up the puppet number for an account, assigning the next one if it is new
    async fn resolve(&self, provider_user_id: &str) -> color_eyre::Result<PuppetAssignment>;
}

/// Process local numbering, lost on restart
#[derive(Default)]
pub struct InMemoryPuppetStore {
    assignments: parking_lot::Mutex<HashMap<String, Ordinal>>,
}

impl InMemoryPuppetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PuppetStore for InMemoryPuppetStore {
    async fn resolve(&self, provider_user_id: &str) -> color_eyre::Result<PuppetAssignment> {
        let mut assignments = self.assignments.lock();

        let ordinal = match assignments.get(provider_user_id) {
            Some(ordinal) => *ordinal,
            None => {
                let next = assignments
                    .values()
                    .max()
                    .map(|highest| highest.next())
                    .unwrap_or(Ordinal::FIRST);
                assignments.insert(provider_user_id.to_string(), next);
                info!(ordinal = %next, "Assigned new puppet number");
                next
            }
        };

        Ok(PuppetAssignment {
            provider_user_id: provider_user_id.to_string(),
            ordinal,
        })
    }
}

/// Durable numbering in SQLite
pub struct SqlitePuppetStore {
    pool: SqlitePool,
    assign_lock: tokio::sync::Mutex<()>,
}

impl SqlitePuppetStore {
    #[tracing::instrument(err)]
    pub async fn connect(url: &str) -> color_eyre::Result<Self> {
        use std::str::FromStr as _;

        let options = SqliteConnectOptions::from_str(url)
            .wrap_err_with(|| format!("Invalid puppet store URL: {url}"))?
            .create_if_missing(true);

        let pool = pool_options(url)
            .connect_with(options)
            .await
            .wrap_err("Failed to open puppet store")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .wrap_err("Failed to migrate puppet store")?;

        Ok(Self {
            pool,
            assign_lock: tokio::sync::Mutex::new(()),
        })
    }
}

/// In-memory SQLite databases live and die with their connection, so the pool
/// holds exactly one and never reaps it.
fn pool_options(url: &str) -> SqlitePoolOptions {
    if url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    }
}

#[async_trait::async_trait]
impl PuppetStore for SqlitePuppetStore {
    async fn resolve(&self, provider_user_id: &str) -> color_eyre::Result<PuppetAssignment> {
        let _guard = self.assign_lock.lock().await;

        let inserted = sqlx::query(
            r#"
            INSERT INTO puppets (provider_user_id, ordinal)
            SELECT ?1, COALESCE(MAX(ordinal), 0) + 1 FROM puppets WHERE true
            ON CONFLICT (provider_user_id) DO NOTHING
            "#,
        )
        .bind(provider_user_id)
        .execute(&self.pool)
        .await
        .wrap_err("Failed to assign puppet number")?;

        let ordinal: i64 = sqlx::query_scalar("SELECT ordinal FROM puppets WHERE provider_user_id = ?1")
            .bind(provider_user_id)
            .fetch_one(&self.pool)
            .await
            .wrap_err("Failed to read puppet number")?;

        let ordinal = u64::try_from(ordinal)
            .ok()
            .and_then(Ordinal::new)
            .ok_or_else(|| eyre!("Puppet store returned invalid ordinal {ordinal}"))?;

        if inserted.rows_affected() > 0 {
            info!(ordinal = %ordinal, "Assigned new puppet number");
        }

        Ok(PuppetAssignment {
            provider_user_id: provider_user_id.to_string(),
            ordinal,
        })
    }
}

/// Pick the store from `PUPPET_STORE_URL`, in memory when unset
pub async fn store_from_url(url: Option<&str>) -> color_eyre::Result<Arc<dyn PuppetStore>> {
    match url {
        Some(url) => {
            info!("Using durable puppet store");
            Ok(Arc::new(SqlitePuppetStore::connect(url).await?))
        }
        None => {
            info!("Using in-memory puppet store, numbers reset on restart");
            Ok(Arc::new(InMemoryPuppetStore::new()))
        }
    }
}

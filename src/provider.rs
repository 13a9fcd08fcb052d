use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, PoisonError};

use deadpool_sqlite::{Config as PoolConfig, Object, Pool, Runtime};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SessionError;

/// Named connection profiles, e.g. `"dev"` and `"production"`.
///
/// Connection strings are supplied by the surrounding application, never
/// hard-coded. A lookup for an unrecognized environment name falls back to
/// the default profile instead of failing; that permissive policy is kept
/// deliberately and logged when it triggers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profiles {
    entries: HashMap<String, String>,
    default_env: String,
}

impl Profiles {
    /// Create an empty profile set whose fallback is `default_env`.
    #[must_use]
    pub fn new(default_env: impl Into<String>) -> Self {
        Self {
            entries: HashMap::new(),
            default_env: default_env.into(),
        }
    }

    /// Builder-style insert of one environment entry.
    #[must_use]
    pub fn with_entry(
        mut self,
        env: impl Into<String>,
        connection_string: impl Into<String>,
    ) -> Self {
        self.insert(env, connection_string);
        self
    }

    /// Add or replace one environment entry.
    pub fn insert(&mut self, env: impl Into<String>, connection_string: impl Into<String>) {
        self.entries.insert(env.into(), connection_string.into());
    }

    /// Deserialize profiles from JSON.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ConfigError` if the document does not parse or
    /// the default environment has no entry.
    pub fn from_json(text: &str) -> Result<Self, SessionError> {
        let profiles: Profiles = serde_json::from_str(text)
            .map_err(|e| SessionError::ConfigError(format!("invalid profiles document: {e}")))?;
        if !profiles.entries.contains_key(&profiles.default_env) {
            return Err(SessionError::ConfigError(format!(
                "default environment {:?} has no profile entry",
                profiles.default_env
            )));
        }
        Ok(profiles)
    }

    /// The environment name used when a lookup does not match.
    #[must_use]
    pub fn default_env(&self) -> &str {
        &self.default_env
    }

    /// Resolve an environment name to its connection string.
    ///
    /// Unknown names resolve to the default profile's connection string.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ConfigError` if neither the requested
    /// environment nor the default has an entry.
    pub fn resolve(&self, env: &str) -> Result<&str, SessionError> {
        if let Some(connection_string) = self.entries.get(env) {
            return Ok(connection_string);
        }

        warn!(
            env,
            default = %self.default_env,
            "unknown environment, falling back to default profile"
        );
        self.entries
            .get(&self.default_env)
            .map(String::as_str)
            .ok_or_else(|| {
                SessionError::ConfigError(format!(
                    "no profile for environment {env:?} and no default entry"
                ))
            })
    }
}

// One bounded pool per connection string, shared process-wide. Checkout,
// checkin, recycling, and internal synchronization all come from the pool;
// the registry itself is only touched under the mutex.
static POOLS: LazyLock<Mutex<HashMap<String, Pool>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Resolves an environment name to a live, pooled database connection.
#[derive(Debug, Clone)]
pub struct ConnectionProvider {
    profiles: Profiles,
}

impl ConnectionProvider {
    #[must_use]
    pub fn new(profiles: Profiles) -> Self {
        Self { profiles }
    }

    /// The profile set this provider resolves against.
    #[must_use]
    pub fn profiles(&self) -> &Profiles {
        &self.profiles
    }

    /// Check a connection out of the pool for `env`.
    ///
    /// The pool for a given connection string is created on first use and
    /// reused afterwards. Opening a connection is the only network/disk I/O
    /// in this component.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ConfigError` for unresolvable environments,
    /// `SessionError::ConnectionError` if the pool cannot be created, and
    /// `SessionError::PoolError` if checkout fails.
    pub async fn acquire(&self, env: &str) -> Result<Object, SessionError> {
        let connection_string = self.profiles.resolve(env)?.to_string();
        let pool = pool_for(&connection_string)?;
        let conn = pool.get().await?;
        debug!(env, "checked out pooled connection");
        Ok(conn)
    }

    /// Drop every pool from the process-wide registry.
    ///
    /// Outstanding checked-out connections stay valid until released; new
    /// acquisitions build fresh pools.
    pub fn clear() {
        POOLS
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

fn pool_for(connection_string: &str) -> Result<Pool, SessionError> {
    let mut pools = POOLS.lock().unwrap_or_else(PoisonError::into_inner);

    if let Some(pool) = pools.get(connection_string) {
        return Ok(pool.clone());
    }

    let cfg = PoolConfig::new(connection_string);
    let pool = cfg.create_pool(Runtime::Tokio1).map_err(|e| {
        SessionError::ConnectionError(format!("failed to create SQLite pool: {e}"))
    })?;
    pools.insert(connection_string.to_string(), pool.clone());
    Ok(pool)
}

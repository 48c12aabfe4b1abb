use log::info;
use tokio::sync::OnceCell;

use crate::error_handling::types::StorageError;
use crate::storage::{HoneypotRecord, RecordStore};

/// Name and protocol tag the honeypot is registered under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoneypotIdentity {
    pub name: String,
    pub protocol: String,
}

impl HoneypotIdentity {
    pub fn new<N: Into<String>, P: Into<String>>(name: N, protocol: P) -> Self {
        Self {
            name: name.into(),
            protocol: protocol.into(),
        }
    }
}

/// Process-wide ingestion state.
///
/// Holds the record store and the honeypot id. The id is resolved once, on
/// first use, by looking the configured name up and registering it when
/// absent; it is never changed afterwards.
pub struct IngestContext<S> {
    store: S,
    identity: HoneypotIdentity,
    honeypot_id: OnceCell<String>,
}

impl<S: RecordStore> IngestContext<S> {
    /// Builds the context and resolves the honeypot id eagerly, so a broken
    /// datastore surfaces at startup.
    pub async fn init(store: S, identity: HoneypotIdentity) -> Result<Self, StorageError> {
        let context = Self::new(store, identity);
        context.honeypot_id().await?;
        Ok(context)
    }

    /// Builds the context without touching the store.
    pub fn new(store: S, identity: HoneypotIdentity) -> Self {
        Self {
            store,
            identity,
            honeypot_id: OnceCell::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn protocol(&self) -> &str {
        &self.identity.protocol
    }

    pub async fn honeypot_id(&self) -> Result<&str, StorageError> {
        self.honeypot_id
            .get_or_try_init(|| self.resolve_honeypot())
            .await
            .map(String::as_str)
    }

    async fn resolve_honeypot(&self) -> Result<String, StorageError> {
        if let Some(existing) = self.store.find_honeypot(&self.identity.name).await? {
            info!("Using honeypot '{}' ({})", existing.name, existing.id);
            return Ok(existing.id);
        }
        let record = HoneypotRecord::new(&self.identity.name, &self.identity.protocol);
        self.store.insert_honeypot(&record).await?;
        info!("Registered honeypot '{}' ({})", record.name, record.id);
        Ok(record.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DatabaseStorage;
    use tempfile::TempDir;

    #[tokio::test]
    async fn registration_is_created_once_and_reused() {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("ctx.sqlite3").display());
        let identity = HoneypotIdentity::new("ssh-honeypot", "ssh");

        let first = IngestContext::init(DatabaseStorage::connect(&url).await.unwrap(), identity.clone())
            .await
            .unwrap();
        let first_id = first.honeypot_id().await.unwrap().to_string();
        // Cached: asking again does not register anything new.
        assert_eq!(first.honeypot_id().await.unwrap(), first_id);
        drop(first);

        let restarted = IngestContext::init(DatabaseStorage::connect(&url).await.unwrap(), identity)
            .await
            .unwrap();
        assert_eq!(restarted.honeypot_id().await.unwrap(), first_id);
        assert_eq!(restarted.store().count_rows().await.0, 1);
    }
}

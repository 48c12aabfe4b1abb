use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};
use sea_orm::{
    ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, Set,
};

use crate::error_handling::types::StorageError;
use crate::storage::db_entities::{events, honeypots, raw_logs};
use crate::storage::storage_trait::RecordStore;
use crate::storage::types::{HoneypotRecord, RawLogRecord, SessionEvent};

const SCHEMA: [&str; 5] = [
    "CREATE TABLE IF NOT EXISTS honeypots (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        protocol TEXT NOT NULL,
        kind TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS raw_logs (
        id TEXT PRIMARY KEY,
        honeypot_id TEXT NOT NULL,
        protocol TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        source_address TEXT,
        raw_data TEXT NOT NULL,
        filename TEXT NOT NULL,
        parser_version TEXT NOT NULL,
        FOREIGN KEY(honeypot_id) REFERENCES honeypots(id)
    );",
    "CREATE UNIQUE INDEX IF NOT EXISTS raw_logs_honeypot_filename
        ON raw_logs (honeypot_id, filename);",
    "CREATE TABLE IF NOT EXISTS events (
        id TEXT PRIMARY KEY,
        honeypot_id TEXT NOT NULL,
        protocol TEXT NOT NULL,
        event_type TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        source_address TEXT,
        session_id TEXT NOT NULL,
        start_time TEXT NOT NULL,
        end_time TEXT NOT NULL,
        duration_seconds INTEGER NOT NULL,
        commands TEXT NOT NULL,
        terminal_info TEXT NOT NULL,
        exit_code INTEGER NOT NULL,
        raw_log_id TEXT NOT NULL,
        FOREIGN KEY(honeypot_id) REFERENCES honeypots(id),
        FOREIGN KEY(raw_log_id) REFERENCES raw_logs(id)
    );",
    "CREATE UNIQUE INDEX IF NOT EXISTS events_honeypot_session
        ON events (honeypot_id, session_id);",
];

fn write_failed(e: DbErr) -> StorageError {
    StorageError::WriteFailed(e.to_string())
}

fn read_failed(e: DbErr) -> StorageError {
    StorageError::ReadFailed(e.to_string())
}

/// SeaORM-backed [`RecordStore`].
///
/// The connection string selects the database, e.g.
/// `sqlite:///data/honeytrace.sqlite3?mode=rwc`. The schema is created on
/// connect when missing.
pub struct DatabaseStorage {
    db: DatabaseConnection,
}

impl DatabaseStorage {
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let mut options = ConnectOptions::new(url.to_owned());
        options
            .max_connections(5)
            .connect_timeout(Duration::from_secs(10))
            .sqlx_logging(false);

        let db = Database::connect(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        for statement in SCHEMA {
            db.execute_unprepared(statement)
                .await
                .map_err(write_failed)?;
        }
        info!("DatabaseStorage connected, schema ready");

        Ok(Self { db })
    }

    #[cfg(test)]
    pub(crate) async fn count_rows(&self) -> (u64, u64, u64) {
        use sea_orm::PaginatorTrait;
        let honeypots = honeypots::Entity::find().count(&self.db).await.unwrap();
        let raw_logs = raw_logs::Entity::find().count(&self.db).await.unwrap();
        let events = events::Entity::find().count(&self.db).await.unwrap();
        (honeypots, raw_logs, events)
    }

    #[cfg(test)]
    pub(crate) async fn event_for(&self, session_id: &str) -> Option<events::Model> {
        events::Entity::find()
            .filter(events::Column::SessionId.eq(session_id))
            .one(&self.db)
            .await
            .unwrap()
    }
}

fn parse_utc(value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::ReadFailed(format!("invalid timestamp '{}': {}", value, e)))
}

impl honeypots::Model {
    fn into_record(self) -> Result<HoneypotRecord, StorageError> {
        Ok(HoneypotRecord {
            created_at: parse_utc(&self.created_at)?,
            updated_at: parse_utc(&self.updated_at)?,
            id: self.id,
            name: self.name,
            protocol: self.protocol,
            kind: self.kind,
            status: self.status,
        })
    }
}

impl RecordStore for DatabaseStorage {
    async fn find_honeypot(&self, name: &str) -> Result<Option<HoneypotRecord>, StorageError> {
        honeypots::Entity::find()
            .filter(honeypots::Column::Name.eq(name))
            .one(&self.db)
            .await
            .map_err(read_failed)?
            .map(honeypots::Model::into_record)
            .transpose()
    }

    async fn insert_honeypot(&self, honeypot: &HoneypotRecord) -> Result<(), StorageError> {
        let model = honeypots::ActiveModel {
            id: Set(honeypot.id.clone()),
            name: Set(honeypot.name.clone()),
            protocol: Set(honeypot.protocol.clone()),
            kind: Set(honeypot.kind.clone()),
            status: Set(honeypot.status.clone()),
            created_at: Set(honeypot.created_at.to_rfc3339()),
            updated_at: Set(honeypot.updated_at.to_rfc3339()),
        };
        honeypots::Entity::insert(model)
            .exec_without_returning(&self.db)
            .await
            .map_err(write_failed)?;
        debug!("Registered honeypot {} as {}", honeypot.name, honeypot.id);
        Ok(())
    }

    async fn upsert_raw_log(&self, raw_log: &RawLogRecord) -> Result<String, StorageError> {
        let existing = raw_logs::Entity::find()
            .filter(raw_logs::Column::HoneypotId.eq(raw_log.honeypot_id.as_str()))
            .filter(raw_logs::Column::Filename.eq(raw_log.meta.filename.as_str()))
            .one(&self.db)
            .await
            .map_err(read_failed)?;
        if let Some(row) = existing {
            debug!("Raw log for {} already stored as {}", raw_log.meta.filename, row.id);
            return Ok(row.id);
        }

        let model = raw_logs::ActiveModel {
            id: Set(raw_log.id.clone()),
            honeypot_id: Set(raw_log.honeypot_id.clone()),
            protocol: Set(raw_log.protocol.clone()),
            timestamp: Set(raw_log.timestamp.to_rfc3339()),
            source_address: Set(raw_log.source_address.clone()),
            raw_data: Set(raw_log.raw_data.clone()),
            filename: Set(raw_log.meta.filename.clone()),
            parser_version: Set(raw_log.meta.parser_version.clone()),
        };
        raw_logs::Entity::insert(model)
            .exec_without_returning(&self.db)
            .await
            .map_err(write_failed)?;
        Ok(raw_log.id.clone())
    }

    async fn upsert_event(&self, event: &SessionEvent) -> Result<String, StorageError> {
        let existing = events::Entity::find()
            .filter(events::Column::HoneypotId.eq(event.honeypot_id.as_str()))
            .filter(events::Column::SessionId.eq(event.session_id.as_str()))
            .one(&self.db)
            .await
            .map_err(read_failed)?;
        if let Some(row) = existing {
            debug!("[{}] Event already stored as {}", event.session_id, row.id);
            return Ok(row.id);
        }

        let commands = serde_json::to_string(&event.commands)
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        let terminal_info = serde_json::to_string(&event.terminal_info)
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        let model = events::ActiveModel {
            id: Set(event.id.clone()),
            honeypot_id: Set(event.honeypot_id.clone()),
            protocol: Set(event.protocol.clone()),
            event_type: Set(event.event_type.clone()),
            timestamp: Set(event.timestamp.to_rfc3339()),
            source_address: Set(event.source_address.clone()),
            session_id: Set(event.session_id.clone()),
            start_time: Set(event.start_time.to_rfc3339()),
            end_time: Set(event.end_time.to_rfc3339()),
            duration_seconds: Set(event.duration_seconds),
            commands: Set(commands),
            terminal_info: Set(terminal_info),
            exit_code: Set(event.exit_code),
            raw_log_id: Set(event.raw_log_id.clone()),
        };
        events::Entity::insert(model)
            .exec_without_returning(&self.db)
            .await
            .map_err(write_failed)?;
        Ok(event.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_parser::parse_transcript;
    use tempfile::TempDir;

    const TRANSCRIPT: &str = concat!(
        "Script started on 2024-01-01 10:00:00+0000 [TERM=\"xterm\" TTY=\"pts/0\" COLUMNS=\"80\" LINES=\"24\" SOURCE_IP=\"203.0.113.5\"]\n",
        "root@host:~# whoami\n",
        "Script done on 2024-01-01 10:00:05+0000 [COMMAND_EXIT_CODE=\"0\"]\n",
    );

    async fn temp_db() -> (TempDir, DatabaseStorage) {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.sqlite3").display());
        let storage = DatabaseStorage::connect(&url).await.unwrap();
        (dir, storage)
    }

    #[tokio::test]
    async fn honeypot_insert_and_find() {
        let (_dir, storage) = temp_db().await;
        assert!(storage.find_honeypot("ssh-honeypot").await.unwrap().is_none());

        let honeypot = HoneypotRecord::new("ssh-honeypot", "ssh");
        storage.insert_honeypot(&honeypot).await.unwrap();

        let found = storage.find_honeypot("ssh-honeypot").await.unwrap().unwrap();
        assert_eq!(found.id, honeypot.id);
        assert_eq!(found.kind, "IT");
        assert_eq!(found.status, "running");
        // Second registration under the same name violates the unique index.
        let duplicate = HoneypotRecord::new("ssh-honeypot", "ssh");
        assert!(storage.insert_honeypot(&duplicate).await.is_err());
    }

    #[tokio::test]
    async fn repeated_upserts_keep_a_single_row() {
        let (_dir, storage) = temp_db().await;
        let honeypot = HoneypotRecord::new("hp", "ssh");
        storage.insert_honeypot(&honeypot).await.unwrap();
        let session = parse_transcript("abc123", TRANSCRIPT.as_bytes()).unwrap();

        let first = RawLogRecord::for_session(&honeypot.id, "ssh", &session, "abc123.tty", "/raw/abc123.tty");
        let retry = RawLogRecord::for_session(&honeypot.id, "ssh", &session, "abc123.tty", "/raw/abc123.tty");
        let raw_id = storage.upsert_raw_log(&first).await.unwrap();
        assert_eq!(storage.upsert_raw_log(&retry).await.unwrap(), raw_id);

        let event = SessionEvent::for_session(&honeypot.id, "ssh", &session, &raw_id);
        let event_retry = SessionEvent::for_session(&honeypot.id, "ssh", &session, &raw_id);
        let event_id = storage.upsert_event(&event).await.unwrap();
        assert_eq!(storage.upsert_event(&event_retry).await.unwrap(), event_id);

        assert_eq!(storage.count_rows().await, (1, 1, 1));
    }

    #[tokio::test]
    async fn event_row_carries_session_fields() {
        let (_dir, storage) = temp_db().await;
        let honeypot = HoneypotRecord::new("hp", "ssh");
        storage.insert_honeypot(&honeypot).await.unwrap();
        let session = parse_transcript("abc123", TRANSCRIPT.as_bytes()).unwrap();
        let raw = RawLogRecord::for_session(&honeypot.id, "ssh", &session, "abc123.tty", "/raw/abc123.tty");
        let raw_id = storage.upsert_raw_log(&raw).await.unwrap();
        storage
            .upsert_event(&SessionEvent::for_session(&honeypot.id, "ssh", &session, &raw_id))
            .await
            .unwrap();

        let row = storage.event_for("abc123").await.unwrap();
        assert_eq!(row.event_type, "session");
        assert_eq!(row.duration_seconds, 5);
        assert_eq!(row.raw_log_id, raw_id);
        assert_eq!(row.source_address.as_deref(), Some("203.0.113.5"));
        let commands: Vec<String> = serde_json::from_str(&row.commands).unwrap();
        assert_eq!(commands, vec!["whoami"]);
    }

    #[tokio::test]
    async fn schema_creation_is_repeatable() {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("again.sqlite3").display());
        let first = DatabaseStorage::connect(&url).await.unwrap();
        first.insert_honeypot(&HoneypotRecord::new("hp", "ssh")).await.unwrap();
        drop(first);

        let reopened = DatabaseStorage::connect(&url).await.unwrap();
        assert!(reopened.find_honeypot("hp").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unreachable_database_is_a_connection_failure() {
        let dir = TempDir::new().unwrap();
        let url = format!(
            "sqlite://{}?mode=ro",
            dir.path().join("missing").join("db.sqlite3").display()
        );
        assert!(matches!(
            DatabaseStorage::connect(&url).await,
            Err(StorageError::ConnectionFailed(_))
        ));
    }
}

//! SeaORM entity models used by the database storage backend.
//!
//! These structs map to the SQLite tables created by `database_storage`:
//! - `honeypots`: one registration row per configured honeypot name
//! - `raw_logs`: pointers to archived raw transcripts
//! - `events`: structured session events

/// Honeypots table entity models.
pub mod honeypots {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "honeypots")]
    pub struct Model {
        /// UUID as string primary key
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: String,
        #[sea_orm(unique)]
        pub name: String,
        pub protocol: String,
        pub kind: String,
        pub status: String,
        /// RFC3339 timestamps
        pub created_at: String,
        pub updated_at: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::raw_logs::Entity")]
        RawLogs,
        #[sea_orm(has_many = "super::events::Entity")]
        Events,
    }

    impl Related<super::raw_logs::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::RawLogs.def()
        }
    }

    impl Related<super::events::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Events.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// Raw log references table entity models.
pub mod raw_logs {
    use sea_orm::entity::prelude::*;

    /// Archived transcript pointer, unique per (honeypot, file name).
    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "raw_logs")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: String,
        /// Foreign key to `honeypots.id`
        pub honeypot_id: String,
        pub protocol: String,
        /// RFC3339 session start
        pub timestamp: String,
        pub source_address: Option<String>,
        /// Path of the archived copy
        pub raw_data: String,
        pub filename: String,
        pub parser_version: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        /// Belongs to a honeypot
        #[sea_orm(
            belongs_to = "super::honeypots::Entity",
            from = "Column::HoneypotId",
            to = "super::honeypots::Column::Id"
        )]
        Honeypot,
    }

    impl Related<super::honeypots::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Honeypot.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// Structured events table entity models.
pub mod events {
    use sea_orm::entity::prelude::*;

    /// Parsed session event, unique per (honeypot, session id).
    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "events")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: String,
        pub honeypot_id: String,
        pub protocol: String,
        pub event_type: String,
        pub timestamp: String,
        pub source_address: Option<String>,
        pub session_id: String,
        pub start_time: String,
        pub end_time: String,
        pub duration_seconds: i64,
        /// JSON array of commands
        pub commands: String,
        /// JSON-serialized `TerminalInfo`
        pub terminal_info: String,
        pub exit_code: i32,
        /// Foreign key to `raw_logs.id`
        pub raw_log_id: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::honeypots::Entity",
            from = "Column::HoneypotId",
            to = "super::honeypots::Column::Id"
        )]
        Honeypot,
        #[sea_orm(
            belongs_to = "super::raw_logs::Entity",
            from = "Column::RawLogId",
            to = "super::raw_logs::Column::Id"
        )]
        RawLog,
    }

    impl Related<super::honeypots::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Honeypot.def()
        }
    }

    impl Related<super::raw_logs::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::RawLog.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod change_source;
pub mod configuration;
pub mod controller;
pub mod error_handling;
pub mod ingestion;
pub mod session_parser;
pub mod storage;

//! SQLite database layer.
//!
//! Provides connection management and versioned schema migrations for the
//! key-value tables that back session persistence and the shared URL slot.
//!
//! # Usage
//!
//! ```no_run
//! use eigo_browser::database::Database;
//!
//! // Open a persistent database
//! let db = Database::open("eigo.db").expect("failed to open database");
//!
//! // Or use an in-memory database for testing
//! let db = Database::open_in_memory().expect("failed to open in-memory database");
//!
//! let conn = db.connection();
//! ```

pub mod connection;
pub mod migrations;

pub use connection::Database;

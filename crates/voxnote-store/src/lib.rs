pub mod database;
pub mod error;
pub mod postgrest;
pub mod record;
pub mod schema;
pub mod sqlite;

pub use database::Database;
pub use error::StoreError;
pub use postgrest::PostgrestRecordStore;
pub use record::{NewRecording, RecordStore, Recording};
pub use sqlite::SqliteRecordStore;

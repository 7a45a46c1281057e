pub mod operations;
pub mod schema;


pub use operations::{Database, DbError, ProgressStore};
pub use schema::{initialize_schema, run_migrations, SCHEMA_VERSION};

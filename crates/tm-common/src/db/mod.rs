pub mod entities;
pub mod migrations;
pub mod pool;

// Keep re-exports unique so downstream crates see a single symbol per helper.
pub use entities::{CoverageReport, PgEntityStore};
pub use migrations::{MigrationError, run_migrations};
pub use pool::{DbPoolError, PgPool, create_pool_from_url, create_pool_from_url_checked};

pub mod analytics;
pub mod jobs;
pub mod migrations;
pub mod pool;
pub mod util;

pub use analytics::fetch_analytics_rows;
pub use jobs::{JobStore, MemoryJobStore, PersistOutcome, PgJobStore, StoreError};
pub use migrations::{run_migrations, MigrationError};
pub use pool::{connect_pool, create_pool_from_url, DbPoolError, PgPool};

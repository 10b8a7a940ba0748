//! Rentora DB - storage for the subscription engine
//!
//! SQLx repositories over PostgreSQL, plus an in-memory store implementing the
//! same traits.
//!
//! # Example
//!
//! ```rust,ignore
//! use rentora_db::{create_pool, run_migrations, Repositories};
//!
//! let pool = create_pool("postgres://localhost/rentora").await?;
//! run_migrations(&pool).await?;
//! let repos = Repositories::new(pool);
//!
//! let plans = repos.plans.list_active().await?;
//! ```

pub mod error;
pub mod memory;
pub mod models;
pub mod pg;
pub mod pool;
pub mod repo;

pub use error::{DbError, DbResult};
pub use memory::MemoryStore;
pub use models::*;
pub use pg::Repositories;
pub use pool::{create_pool, create_pool_with_options, run_migrations, DbPool, PoolOptions};
pub use repo::*;

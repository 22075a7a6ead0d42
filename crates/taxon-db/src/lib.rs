//! # taxon-db
//!
//! Store layer for taxon.
//!
//! This crate provides:
//! - Connection pool management
//! - PostgreSQL repositories implementing the `taxon-core` store traits
//! - An in-memory store with the same natural-key semantics, used for dry
//!   runs and tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use taxon_db::Database;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/taxon").await?;
//!     db.migrate().await?;
//!     Ok(())
//! }
//! ```

pub mod lexicon;
pub mod memory;
pub mod ontology;
pub mod pool;
pub mod tags;
pub mod taxonomy;

// Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use taxon_core::*;

pub use lexicon::{PgLexiconRepository, PgRegionRepository};
pub use memory::{MemoryStore, StoreCall};
pub use ontology::{PgConceptRepository, PgRelationRepository};
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use tags::PgTagRepository;
pub use taxonomy::PgTaxonomyRepository;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Taxonomy node repository.
    pub taxonomy: PgTaxonomyRepository,
    /// Lexicon term repository.
    pub lexicon: PgLexiconRepository,
    /// Region repository holding regional pronunciations.
    pub regions: PgRegionRepository,
    /// Ontology concept repository.
    pub concepts: PgConceptRepository,
    /// Ontology relation repository.
    pub relations: PgRelationRepository,
    /// Tag graph repository used by the unification engine.
    pub tags: PgTagRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            taxonomy: PgTaxonomyRepository::new(pool.clone()),
            lexicon: PgLexiconRepository::new(pool.clone()),
            regions: PgRegionRepository::new(pool.clone()),
            concepts: PgConceptRepository::new(pool.clone()),
            relations: PgRelationRepository::new(pool.clone()),
            tags: PgTagRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

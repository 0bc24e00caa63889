//! PostgreSQL repository implementations.
//!
//! Queries use SQLx's runtime-checked `query_as` with `FromRow` row types, so the crate
//! builds without a live database.
//!
//! - [`PgLinkRepository`] - Link storage and retrieval
//! - [`PgTokenRepository`] - API token storage and validation

pub mod pg_link_repository;
pub mod pg_token_repository;

pub use pg_link_repository::{LinkSummary, PgLinkRepository};
pub use pg_token_repository::PgTokenRepository;

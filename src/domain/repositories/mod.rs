//! Repository trait definitions for the domain layer.
//!
//! Traits define the storage contract; implementations live in
//! `crate::infrastructure::persistence`. Mock implementations are generated via `mockall`
//! for unit tests.

pub mod link_repository;
pub mod token_repository;

pub use link_repository::{LinkRepository, StoreError, StoreResult};
pub use token_repository::{ApiToken, NewApiToken, TokenRepository};

#[cfg(test)]
pub use link_repository::MockLinkRepository;
#[cfg(test)]
pub use token_repository::MockTokenRepository;

//! Helpers shared across layers.
//!
//! - [`code_generator`] - Short code generation and validation
//! - [`url_validator`] - Destination URL policy (SSRF and open-redirect blocking)
//! - [`client_ip`] - Client IP resolution behind proxies
//! - [`db_error`] - sqlx error classification

pub mod client_ip;
pub mod code_generator;
pub mod db_error;
pub mod url_validator;

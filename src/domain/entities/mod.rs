//! Core domain entities.
//!
//! Entities are plain data; creation inputs are separate structs (`NewLink`) so that
//! store-assigned fields never have to be faked by callers.

pub mod caller;
pub mod link;

pub use caller::{Caller, Tier};
pub use link::{Link, NewLink, Visibility};

//! Domain layer: entities, repository contracts and click processing.
//!
//! - [`entities`] - Core business data structures
//! - [`repositories`] - Data access trait definitions
//! - [`click_event`] - Click events and the bounded click queue
//! - [`click_worker`] - Background worker applying click increments
//!
//! The domain layer has no dependency on infrastructure or HTTP; repository traits are
//! implemented in `crate::infrastructure::persistence`.
//!
//! # Click Processing Flow
//!
//! 1. The redirect handler resolves a code and answers immediately
//! 2. A [`click_event::ClickEvent`] is pushed with `try_send`
//! 3. [`click_worker::run_click_worker`] applies it with bounded concurrency and retries

pub mod click_event;
pub mod click_worker;
pub mod entities;
pub mod repositories;

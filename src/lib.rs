//! Client-side data access for the fitness trainer API.
//!
//! [`api::Dispatcher`] sends requests, caches reads and retries on network
//! failure. [`trainer::TrainerClient`] layers typed resource operations on top.

pub mod api;
pub mod cache;
pub mod commands;
pub mod config;
pub mod logging;
pub mod trainer;

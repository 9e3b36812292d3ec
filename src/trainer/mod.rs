//! Typed access to the trainer API: clients, workouts, OCR scans,
//! nutrition and AI analysis.

pub mod api_types;
pub mod client;
pub mod session;
pub mod types;

pub use client::TrainerClient;

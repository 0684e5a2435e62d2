//! Core services for the school registrar: identifier allocation for students
//! and staff, and class ranking, transcript and export generation over
//! recorded results.

pub mod config;
pub mod error;
pub mod store;
pub mod telemetry;
pub mod workflows;

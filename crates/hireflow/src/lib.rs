//! Document intake and AI-assisted review pipeline for job applications.

pub mod config;
pub mod error;
pub mod intake;
pub mod telemetry;

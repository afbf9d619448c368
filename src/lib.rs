//! Face Verification Service Library

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod gallery;
pub mod utils;
pub mod verify;

pub use config::Config;

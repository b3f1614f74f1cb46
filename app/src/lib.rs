//! Wiring for the terminal front end: configuration and the file-based capture UI.

pub mod capture;
pub mod config;

pub use capture::FileCaptureUi;
pub use config::{AppConfig, AppConfigOverrides};

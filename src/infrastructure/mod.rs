//! Infrastructure layer: configuration, crew files, credentials and logging.

pub mod config;
pub mod credentials;
pub mod crew;
pub mod logging;

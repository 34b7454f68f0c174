/// Re-export `Config` from `atelier-core` for use within this crate.
///
/// All environment-variable parsing lives in `atelier-core` so the CLI
/// commands and integration tests share it without depending on the server.
pub use atelier_core::config::{Config, SmtpConfig};

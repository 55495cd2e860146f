//! Error types for service startup.
//!
//! Anything that fails here is fatal: `main` logs the report and exits.

use std::fmt;

/// Errors raised while bringing the service up.
#[derive(Debug)]
pub enum StartupError {
    /// Configuration could not be loaded or is inconsistent.
    Config { details: String },
    /// The database is unreachable.
    Database { details: String },
    /// Migrations failed.
    Migration { details: String },
    /// A provider client could not be built, or the default is missing.
    Provider { details: String },
    /// The conversation store could not be opened.
    Store { details: String },
    /// The Home Assistant client could not be built.
    HomeAssistant { details: String },
    /// The Telegram client could not be built.
    Transport { details: String },
    /// The HTTP listener could not be bound or failed while serving.
    Serve { details: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "configuration error: {}", details),
            Self::Database { details } => write!(f, "database connection failed: {}", details),
            Self::Migration { details } => write!(f, "migration failed: {}", details),
            Self::Provider { details } => write!(f, "provider setup failed: {}", details),
            Self::Store { details } => write!(f, "conversation store setup failed: {}", details),
            Self::HomeAssistant { details } => {
                write!(f, "home assistant client setup failed: {}", details)
            }
            Self::Transport { details } => write!(f, "telegram client setup failed: {}", details),
            Self::Serve { details } => write!(f, "http server error: {}", details),
        }
    }
}

impl std::error::Error for StartupError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_details() {
        let err = StartupError::Config {
            details: "missing field `database_url`".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "configuration error: missing field `database_url`"
        );
    }
}

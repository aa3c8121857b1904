use std::path::PathBuf;

use thiserror::Error;

use crate::models::Host;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// Host list could not be read.
    #[error("failed to read host list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A status was written for a host outside the registry.
    #[error("host {0} is not registered")]
    UnknownHost(Host),

    #[error("invalid config: {0}")]
    Config(String),

    /// The probe mechanism could not be initialised.
    #[error("probe setup failed: {0}")]
    ProbeSetup(#[from] std::io::Error),
}

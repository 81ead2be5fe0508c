use thiserror::Error;

/// Failures raised by a virtualization transport backend.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("{0}")]
    Libvirt(#[from] virt::error::Error),

    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("host query failed on {uri}: {source}")]
    HostQuery { uri: String, source: TransportError },

    #[error("domain {name:?} reported unknown state code {code}")]
    UnknownDomainState { name: String, code: u32 },

    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("unknown selector {0:?}, expected \"mem\" or \"packing\"")]
    UnknownSelector(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ClusterError {
    /// True for errors that invalidate the whole query rather than a single
    /// host. Per-host connectivity and query failures are recoverable: the
    /// host is skipped with a diagnostic and the query continues.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ClusterError::HostQuery { .. } | ClusterError::Transport(_)
        )
    }
}

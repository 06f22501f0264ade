use thiserror::Error;

/// Failures of the player / visualizer feature. None of these are allowed
/// to stop the frame loop; callers log them and degrade to a paused,
/// silent state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AudioError {
    /// The host has no usable audio output.
    #[error("audio output unavailable: {0}")]
    UnsupportedEnvironment(String),

    /// A play or resume request was refused.
    #[error("playback rejected: {0}")]
    PlaybackRejected(String),

    /// A second source tap was requested for the same media element.
    #[error("media element is already connected to an analysis graph")]
    GraphAlreadyBuilt,

    #[error("invalid analyser configuration: {0}")]
    InvalidAnalyser(String),
}

#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("playlist is empty")]
    Empty,

    #[error("failed to read playlist {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse playlist {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

use thiserror::Error;

/// Invalid splitter configuration, reported before any input is processed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The overlap would swallow every chunk.
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    OverlapTooLarge {
        /// Requested overlap.
        overlap: usize,
        /// Requested chunk size.
        size: usize,
    },
    /// A chunk size of zero can never make progress.
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,
}

/// Errors surfaced by the streaming and chunking entry points.
///
/// Conversion itself never fails on malformed HTML; only the collaborators
/// around it (readers, configuration) can.
#[derive(Debug, Error)]
pub enum MdriftError {
    /// IO error while reading a streamed source.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Rejected configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_messages_name_the_values() {
        let error = ConfigError::OverlapTooLarge {
            overlap: 20,
            size: 10,
        };
        assert_eq!(
            error.to_string(),
            "chunk overlap (20) must be smaller than chunk size (10)"
        );
        assert_eq!(
            ConfigError::ZeroChunkSize.to_string(),
            "chunk size must be greater than zero"
        );
    }

    #[test]
    fn wraps_sources() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let error: MdriftError = io.into();
        assert!(matches!(error, MdriftError::Io(_)));
        assert_eq!(error.to_string(), "IO error: eof");

        let error: MdriftError = ConfigError::ZeroChunkSize.into();
        assert!(matches!(error, MdriftError::Config(ConfigError::ZeroChunkSize)));
    }
}

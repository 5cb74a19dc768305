use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisualizationError {
    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error while {context}: {source}")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("tensor error while {context}: {source}")]
    Tensor {
        context: &'static str,
        #[source]
        source: candle_core::Error,
    },
    #[error("image error while {context}: {source}")]
    Image {
        context: &'static str,
        #[source]
        source: image::ImageError,
    },
    #[error("PNG encoding error while {context}: {source}")]
    Encode {
        context: &'static str,
        #[source]
        source: png::EncodingError,
    },
    #[error("{context}: {message}")]
    Runtime {
        context: &'static str,
        message: String,
    },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl VisualizationError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn json(context: &'static str, source: serde_json::Error) -> Self {
        Self::Json { context, source }
    }

    pub(crate) fn tensor(context: &'static str, source: candle_core::Error) -> Self {
        Self::Tensor { context, source }
    }

    pub(crate) fn image(context: &'static str, source: image::ImageError) -> Self {
        Self::Image { context, source }
    }

    pub(crate) fn encode(context: &'static str, source: png::EncodingError) -> Self {
        Self::Encode { context, source }
    }

    pub(crate) fn runtime(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Runtime {
            context,
            message: err.to_string(),
        }
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

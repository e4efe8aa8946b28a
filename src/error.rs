use thiserror::Error;

#[derive(Debug, Error)]
pub enum JpegError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Unsupported configuration: {0}")]
    UnsupportedConfig(String),

    #[error("Codec engine error: {0}")]
    EngineError(String),

    #[error("Pixel buffer too small: expected at least {expected} bytes, got {actual}")]
    BufferSize { expected: usize, actual: usize },

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Generates factory methods for [`JpegError`] variants that wrap a `String`.
macro_rules! error_constructors {
    ($(
        $(#[doc = $doc:expr])*
        $method:ident => $variant:ident
    ),* $(,)?) => {
        impl JpegError {
            $(
                $(#[doc = $doc])*
                pub fn $method(msg: impl Into<String>) -> Self {
                    Self::$variant(msg.into())
                }
            )*
        }
    };
}

error_constructors! {
    /// Create a configuration error.
    config => ConfigError,
    /// Create a malformed-input error.
    malformed => MalformedInput,
    /// Create an unsupported-configuration error.
    unsupported => UnsupportedConfig,
    /// Create a codec engine error.
    engine => EngineError,
    /// Create an image error.
    image => ImageError,
}

impl JpegError {
    /// Check that a caller buffer holds at least `expected` bytes.
    pub fn check_buffer(expected: usize, actual: usize) -> Result<()> {
        if actual < expected {
            Err(Self::BufferSize { expected, actual })
        } else {
            Ok(())
        }
    }
}

impl From<serde_json::Error> for JpegError {
    fn from(e: serde_json::Error) -> Self {
        Self::ConfigError(e.to_string())
    }
}

impl From<serde_yml::Error> for JpegError {
    fn from(e: serde_yml::Error) -> Self {
        Self::ConfigError(e.to_string())
    }
}

impl From<image::ImageError> for JpegError {
    fn from(e: image::ImageError) -> Self {
        Self::ImageError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, JpegError>;

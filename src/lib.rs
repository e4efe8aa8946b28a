pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod ffi;
pub mod layout;
pub mod pipeline;

pub use codec::{DecodeOptions, DecodedImage, Decoder, EncodeOptions, Encoder};
pub use error::{JpegError, Result};
pub use layout::{ChromaRatio, ColorSpace, ImageInfo};

// Decode and encode pipelines over the planar layout layer

pub mod decoder;
pub mod encoder;
pub mod image;
pub mod repack;
pub mod state;

pub use decoder::{DecodeOptions, Decoder};
pub use encoder::{EncodeOptions, Encoder};
pub use image::{CmykImage, DecodedImage, Pixels, YCbCrImage};

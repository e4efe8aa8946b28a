// ジョブ単位: 入力読込 -> デコード/エンコード -> 出力書込

use std::path::PathBuf;

use tracing::info;

use crate::codec::decoder::{DecodeOptions, Decoder};
use crate::codec::encoder::{EncodeOptions, Encoder};
use crate::codec::image::{DecodedImage, Pixels};
use crate::config::job::{OutputKind, output_kind};
use crate::engine::{DecodeEngine, EncodeEngine};
use crate::error::JpegError;
use crate::layout::{ChromaRatio, ColorSpace, ImageInfo};

/// Configuration for a single job.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub encode: EncodeOptions,
    pub decode: DecodeOptions,
}

/// Result of processing a single job.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Descriptor of the written image (of the new stream for JPEG output).
    pub info: ImageInfo,
    pub bytes_written: u64,
}

/// SOI marker that starts every JPEG stream.
fn is_jpeg(data: &[u8]) -> bool {
    data.starts_with(&[0xFF, 0xD8])
}

/// Run one job with the given engines.
///
/// JPEG output re-encodes the input: JPEG input goes through the decoder
/// first, so YCbCr planes pass from decoder to encoder without color
/// conversion. Any other output decodes the JPEG input and saves it with
/// the `image` crate in the format implied by the extension.
pub fn run_job<D, E>(config: &JobConfig, decode_engine: &D, encode_engine: &E) -> crate::error::Result<JobResult>
where
    D: DecodeEngine + Clone,
    E: EncodeEngine + Clone,
{
    let data = std::fs::read(&config.input_path)?;
    let decoder = Decoder::new(decode_engine.clone(), config.decode);

    let info = match output_kind(&config.output_path) {
        OutputKind::Jpeg => {
            let encoder = Encoder::new(encode_engine.clone(), config.encode);
            let stream = if is_jpeg(&data) {
                let decoded = decoder.decode(&data)?;
                encode_decoded(&encoder, &decoded)?
            } else {
                let img = image::load_from_memory(&data)?;
                encoder.encode_image(&img)?
            };
            std::fs::write(&config.output_path, &stream)?;
            // 出力ストリームの記述子を報告する
            Decoder::new(decode_engine.clone(), DecodeOptions::default()).read_info(&stream)?
        }
        OutputKind::Image => {
            if !is_jpeg(&data) {
                return Err(JpegError::malformed(format!(
                    "{} is not a JPEG stream",
                    config.input_path.display()
                )));
            }
            let decoded = decoder.decode(&data)?;
            decoded.to_dynamic().save(&config.output_path)?;
            *decoded.info()
        }
    };

    let bytes_written = std::fs::metadata(&config.output_path)?.len();
    info!(
        input = %config.input_path.display(),
        output = %config.output_path.display(),
        bytes_written,
        "job finished"
    );

    Ok(JobResult {
        input_path: config.input_path.clone(),
        output_path: config.output_path.clone(),
        info,
        bytes_written,
    })
}

/// Encode a decoded image, keeping planar YCbCr and CMYK data as is.
fn encode_decoded<E: EncodeEngine>(
    encoder: &Encoder<E>,
    decoded: &DecodedImage,
) -> crate::error::Result<Vec<u8>> {
    let info = decoded.info();
    let (w, h) = (info.width, info.height);
    match decoded.pixels() {
        Pixels::Gray(img) => encoder.encode(img.as_raw(), w, h, ColorSpace::Grayscale, ChromaRatio::S444),
        Pixels::Rgba(img) => encoder.encode(img.as_raw(), w, h, ColorSpace::Rgb, encoder.options().chroma),
        Pixels::YCbCr(img) => encoder.encode(img.as_bytes(), w, h, ColorSpace::YCbCr, img.ratio()),
        Pixels::Cmyk(img) => encoder.encode(img.as_bytes(), w, h, ColorSpace::Cmyk, ChromaRatio::S444),
    }
}

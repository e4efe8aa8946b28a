use super::job::Job;
use super::settings::Settings;
use crate::codec::decoder::DecodeOptions;
use crate::codec::encoder::EncodeOptions;

#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub encode: EncodeOptions,
    pub decode: DecodeOptions,
    pub parallel_workers: usize,
}

impl MergedConfig {
    /// JobのOption値がSomeならJobの値を、NoneならSettingsの値を使用する。
    pub fn new(settings: &Settings, job: &Job) -> Self {
        let dct_method = job.dct_method.unwrap_or(settings.dct_method);
        let arithmetic_coding = job.arithmetic_coding.unwrap_or(settings.arithmetic_coding);
        let encode = EncodeOptions {
            quality: job.quality.unwrap_or(settings.quality),
            chroma: job.chroma.unwrap_or(settings.chroma),
            progressive_level: job.progressive_level.unwrap_or(settings.progressive_level),
            optimize_coding: job.optimize_coding.unwrap_or(settings.optimize_coding),
            adaptive_quantization: job
                .adaptive_quantization
                .unwrap_or(settings.adaptive_quantization),
            use_standard_quant_tables: job
                .standard_quant_tables
                .unwrap_or(settings.standard_quant_tables),
            fancy_downsampling: job.fancy_downsampling.unwrap_or(settings.fancy_downsampling),
            arithmetic_coding,
            dct_method,
        };
        let decode = DecodeOptions {
            fancy_upsampling: job.fancy_upsampling.unwrap_or(settings.fancy_upsampling),
            block_smoothing: job.block_smoothing.unwrap_or(settings.block_smoothing),
            arithmetic_coding,
            dct_method,
            target_width: job.target_width.unwrap_or(0),
            target_height: job.target_height.unwrap_or(0),
        };
        MergedConfig {
            encode,
            decode,
            parallel_workers: settings.parallel_workers,
        }
    }
}

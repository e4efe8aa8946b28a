use std::path::Path;

use serde::Deserialize;

use crate::engine::DctMethod;
use crate::layout::ChromaRatio;

/// ディレクトリ単位の既定値。ジョブ側で未指定の項目に使われる。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub quality: i32,
    pub chroma: ChromaRatio,
    pub progressive_level: i32,
    pub optimize_coding: bool,
    pub adaptive_quantization: bool,
    pub standard_quant_tables: bool,
    pub fancy_downsampling: bool,
    /// 算術符号化で出力する（デコード側はストリームのSOFに従う）
    pub arithmetic_coding: bool,
    pub fancy_upsampling: bool,
    pub block_smoothing: bool,
    pub dct_method: DctMethod,
    /// 0 ならrayonの既定スレッド数
    pub parallel_workers: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            quality: 75,
            chroma: ChromaRatio::S420,
            progressive_level: 0,
            optimize_coding: true,
            adaptive_quantization: true,
            standard_quant_tables: false,
            fancy_downsampling: false,
            arithmetic_coding: false,
            fancy_upsampling: false,
            block_smoothing: false,
            dct_method: DctMethod::ISlow,
            parallel_workers: 0,
        }
    }
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> crate::error::Result<Self> {
        serde_yml::from_str(yaml).map_err(|e| {
            crate::error::JpegError::config(format!("Failed to parse settings YAML: {e}"))
        })
    }

    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}

use std::path::Path;

use serde::Deserialize;

use crate::engine::DctMethod;
use crate::layout::ChromaRatio;

#[derive(Debug, Clone, Deserialize)]
pub struct JobFile {
    pub jobs: Vec<Job>,
}

impl JobFile {
    pub fn from_yaml(yaml: &str) -> crate::error::Result<Self> {
        serde_yml::from_str(yaml).map_err(|e| {
            crate::error::JpegError::config(format!("Failed to parse job YAML: {e}"))
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub input: String,
    pub output: String,
    pub quality: Option<i32>,
    pub chroma: Option<ChromaRatio>,
    pub progressive_level: Option<i32>,
    pub optimize_coding: Option<bool>,
    pub adaptive_quantization: Option<bool>,
    pub standard_quant_tables: Option<bool>,
    pub fancy_downsampling: Option<bool>,
    pub arithmetic_coding: Option<bool>,
    pub dct_method: Option<DctMethod>,
    pub fancy_upsampling: Option<bool>,
    pub block_smoothing: Option<bool>,
    /// 縮小デコードの目標サイズ。両方とも指定された場合のみ有効。
    pub target_width: Option<u32>,
    pub target_height: Option<u32>,
}

/// 出力ファイルの種類。拡張子で決まる。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// `.jpg` / `.jpeg`: JPEGにエンコードする
    Jpeg,
    /// それ以外: JPEGをデコードしてimageクレートで保存する
    Image,
}

impl Job {
    pub fn output_kind(&self) -> OutputKind {
        output_kind(Path::new(&self.output))
    }
}

/// 拡張子（大文字小文字を区別しない）から出力の種類を判定する。
pub fn output_kind(path: &Path) -> OutputKind {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => OutputKind::Jpeg,
        _ => OutputKind::Image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_kind_by_extension() {
        assert_eq!(output_kind(Path::new("a/b.jpg")), OutputKind::Jpeg);
        assert_eq!(output_kind(Path::new("b.JPEG")), OutputKind::Jpeg);
        assert_eq!(output_kind(Path::new("b.png")), OutputKind::Image);
        assert_eq!(output_kind(Path::new("noext")), OutputKind::Image);
    }
}

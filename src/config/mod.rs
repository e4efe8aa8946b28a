pub mod job;
pub mod merged;
pub mod settings;

use settings::Settings;
use std::path::Path;

/// ジョブファイルと同じディレクトリの `settings.yaml` からJPEG設定を読み込む。
///
/// 品質・クロマ比・プログレッシブ段数などエンコード/デコードの既定値を持つ。
/// ファイルが無ければ [`Settings::default`]（品質75、4:2:0）を返す。
pub fn load_settings_for_job(job_file_path: &Path) -> crate::error::Result<Settings> {
    let dir = job_file_path
        .parent()
        .ok_or_else(|| crate::error::JpegError::config("Cannot determine job file directory"))?;

    let settings_path = dir.join("settings.yaml");

    if settings_path.exists() {
        Settings::from_file(&settings_path)
    } else {
        Ok(Settings::default())
    }
}

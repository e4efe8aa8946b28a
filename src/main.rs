use std::path::{Path, PathBuf};
use std::process::ExitCode;

use jpeg_planar::codec::decoder::{DecodeOptions, Decoder};
use jpeg_planar::config::job::JobFile;
use jpeg_planar::config::merged::MergedConfig;
use jpeg_planar::config::{self};
use jpeg_planar::ffi::MozjpegEngine;
use jpeg_planar::pipeline::job_runner::JobConfig;
use jpeg_planar::pipeline::orchestrator::run_all_jobs;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        eprintln!("Usage: jpeg_planar <jobs.yaml>...");
        eprintln!("       jpeg_planar --info <file.jpg>");
        eprintln!("  Encode and decode images according to job specifications.");
        return if args.is_empty() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        };
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        eprintln!("jpeg_planar {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    if args[0] == "--info" {
        return match args.get(1) {
            Some(path) => print_info(Path::new(path)),
            None => {
                eprintln!("ERROR: --info requires a JPEG file");
                ExitCode::FAILURE
            }
        };
    }

    // Collect job configs from all job files.
    let mut job_configs: Vec<JobConfig> = Vec::new();
    let mut workers = 0;

    for job_file_arg in &args {
        let job_file_path = Path::new(job_file_arg);

        // Load settings from the same directory as the job file.
        let settings = match config::load_settings_for_job(job_file_path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("ERROR: Failed to load settings for {job_file_arg}: {e}");
                return ExitCode::FAILURE;
            }
        };

        let yaml_content = match std::fs::read_to_string(job_file_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("ERROR: Failed to read job file {job_file_arg}: {e}");
                return ExitCode::FAILURE;
            }
        };

        let job_file = match JobFile::from_yaml(&yaml_content) {
            Ok(jf) => jf,
            Err(e) => {
                eprintln!("ERROR: Failed to parse job file {job_file_arg}: {e}");
                return ExitCode::FAILURE;
            }
        };

        // Relative paths in a job file are relative to the job file.
        let job_dir = job_file_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        for job in &job_file.jobs {
            let merged = MergedConfig::new(&settings, job);
            workers = workers.max(merged.parallel_workers);
            job_configs.push(JobConfig {
                input_path: resolve_path(&job_dir, &job.input),
                output_path: resolve_path(&job_dir, &job.output),
                encode: merged.encode,
                decode: merged.decode,
            });
        }
    }

    let results = run_all_jobs(&job_configs, workers, &MozjpegEngine, &MozjpegEngine);

    let mut has_error = false;
    for (config, result) in job_configs.iter().zip(&results) {
        match result {
            Ok(job_result) => {
                eprintln!(
                    "OK: {} -> {} ({}x{} {:?} {}, {} bytes)",
                    job_result.input_path.display(),
                    job_result.output_path.display(),
                    job_result.info.width,
                    job_result.info.height,
                    job_result.info.color_space,
                    job_result.info.chroma_ratio,
                    job_result.bytes_written
                );
            }
            Err(e) => {
                eprintln!(
                    "ERROR: {} -> {}: {e}",
                    config.input_path.display(),
                    config.output_path.display()
                );
                has_error = true;
            }
        }
    }

    if has_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Print the header descriptor of a JPEG file as JSON on stdout.
fn print_info(path: &Path) -> ExitCode {
    let data = match std::fs::read(path) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("ERROR: Failed to read {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    };
    let decoder = Decoder::new(MozjpegEngine, DecodeOptions::default());
    let info = match decoder.read_info(&data) {
        Ok(info) => info,
        Err(e) => {
            eprintln!("ERROR: {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    };
    match serde_json::to_string_pretty(&info) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("ERROR: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Resolve a potentially relative path against a base directory.
/// If the path is already absolute, return it as-is.
fn resolve_path(base_dir: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

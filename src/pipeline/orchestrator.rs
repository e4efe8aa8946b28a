// 全ジョブ実行（rayonで並列）

use rayon::prelude::*;

use crate::engine::{DecodeEngine, EncodeEngine};
use crate::pipeline::job_runner::{JobConfig, JobResult, run_job};

/// Run multiple jobs in parallel, collecting results in job order.
/// One job failure does NOT prevent other jobs from running.
///
/// `workers == 0` uses the global rayon pool.
pub fn run_all_jobs<D, E>(
    jobs: &[JobConfig],
    workers: usize,
    decode_engine: &D,
    encode_engine: &E,
) -> Vec<crate::error::Result<JobResult>>
where
    D: DecodeEngine + Clone,
    E: EncodeEngine + Clone,
{
    let run = || {
        jobs.par_iter()
            .map(|job| run_job(job, decode_engine, encode_engine))
            .collect::<Vec<_>>()
    };

    if workers == 0 {
        return run();
    }
    match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => pool.install(run),
        Err(e) => {
            tracing::warn!("cannot build a {workers}-thread pool ({e}); using the global pool");
            run()
        }
    }
}

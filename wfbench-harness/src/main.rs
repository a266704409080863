use clap::Parser;
use std::process;
use tracing::error;
use wfbench_common::WfBenchError;
use wfbench_harness::bench::BenchmarkLoop;
use wfbench_harness::cli::Args;
use wfbench_harness::logging::init_logging;
use wfbench_harness::orchestrator::HttpConnector;

#[tokio::main]
async fn main() {
    init_logging();
    let config = Args::parse().into_config();

    let mut bench = BenchmarkLoop::new(config);
    if let Err(e) = bench.run(&HttpConnector).await {
        error!(error = %e, "benchmark aborted");
        process::exit(exit_code(&e));
    }
}

/// 3 when the run never got going, 1 when it failed part-way.
fn exit_code(e: &WfBenchError) -> i32 {
    if e.is_startup() {
        3
    } else {
        1
    }
}

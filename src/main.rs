use provider_harness::fixtures::builtin_registry;
use provider_harness::server::{init_tracing, run_from_args};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let registry = builtin_registry();
    run_from_args(std::env::args(), &registry).await
}

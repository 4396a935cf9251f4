mod app;

use std::process::ExitCode;

use tracing::{error, info};

fn main() -> ExitCode {
    app::bootstrap::init_tracing();
    info!("=== Timeslip Startup ===");

    let wiring = match app::bootstrap::build_app() {
        Ok(wiring) => wiring,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };
    app::loop_runner::run(wiring)
}

use std::process::ExitCode;

use tracing::error;

mod app;

fn main() -> ExitCode {
    match app::bootstrap::build_app() {
        Ok(Some(wiring)) => app::loop_runner::run(wiring),
        Ok(None) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "startup_failed");
            ExitCode::FAILURE
        }
    }
}

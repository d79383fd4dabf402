use std::process::ExitCode;

fn main() -> ExitCode {
    match mpiparity::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            mpiparity::report_error(&e);
            ExitCode::FAILURE
        }
    }
}

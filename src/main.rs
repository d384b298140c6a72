use std::process::ExitCode;

fn main() -> ExitCode {
    match pocketledger::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

//! `krige` binary: everything lives in [`geokrige::app`].

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(err) = geokrige::app::run() {
        eprintln!("krige: {err}");
        return ExitCode::from(err.exit_code());
    }
    ExitCode::SUCCESS
}

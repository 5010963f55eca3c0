//! imanip - Command-line tool for cell-by-cell image manipulation and GIF loops

use std::process::ExitCode;

use imanip::cli;

fn main() -> ExitCode {
    cli::run()
}

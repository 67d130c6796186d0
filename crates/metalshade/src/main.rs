//! Entry point: parses the CLI, initialises tracing and runs one viewer
//! session, translating the outcome into the process exit code.
//!
//! - `0` after a quit command (or `--list`).
//! - `1` when no shaders were found or the requested one does not exist.
//! - `2` for anything else, including graphics and display failures.

mod backend;
mod cli;
mod host;
mod input;
mod paths;
mod run;

use std::process::ExitCode;

use catalog::CatalogError;

const EXIT_CATALOG: u8 = 1;
const EXIT_FAILURE: u8 = 2;

fn main() -> ExitCode {
    let cli = cli::parse();
    run::initialise_tracing();

    match run::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<CatalogError>() {
            Some(catalog_err) => {
                eprintln!("{catalog_err}");
                ExitCode::from(EXIT_CATALOG)
            }
            None => {
                tracing::error!("{err:#}");
                ExitCode::from(EXIT_FAILURE)
            }
        },
    }
}

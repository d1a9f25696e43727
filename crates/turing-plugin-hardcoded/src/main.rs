//! Plugin binary for the hard-coded experiment engine.

use std::io::{self, Write};
use std::process::ExitCode;

use ortho_config::OrthoConfig;
use turing_config::Config;
use turing_plugin_hardcoded::{RunError, run};

fn main() -> ExitCode {
    let outcome = Config::load()
        .map_err(|source| RunError::Configuration { source })
        .and_then(|config| run(&config));
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            writeln!(io::stderr().lock(), "turing-plugin-hardcoded: {error}").ok();
            ExitCode::FAILURE
        }
    }
}

#![forbid(unsafe_code)]

//! dsh — Drive Space Helper CLI entry point.

use clap::Parser;

mod cli_app;

fn main() {
    let args = cli_app::Cli::parse();
    if let Err(e) = cli_app::run(&args) {
        eprintln!("dsh: {e}");
        std::process::exit(e.exit_code());
    }
}

#![forbid(unsafe_code)]

//! linksweep CLI entry point.

use clap::Parser;

mod cli_app;

fn main() {
    let args = match cli_app::Cli::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // Usage errors share the fatal exit code; 2 means "broken links kept".
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    match cli_app::run(&args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("linksweep: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

use clap::Parser;
use imaging_chart::cli::Cli;
use std::process;

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    cli.init_logging();

    if let Err(e) = imaging_chart::run_command(cli.command) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

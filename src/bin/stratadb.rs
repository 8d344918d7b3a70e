use clap::Parser;
use stratadb::cli::{self, Cli};

fn main() {
    stratadb::logger::configure_from_env();
    let cli = Cli::parse();
    if let Err(msg) = cli::run(cli.command) {
        eprintln!("{msg}");
        std::process::exit(1);
    }
}

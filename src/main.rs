use clap::Parser;
use krxquant::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}

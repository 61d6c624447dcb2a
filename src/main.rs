use clap::Parser;
use replaylab::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}

//! Kiln CLI: synthesize EC2 Image Builder pipeline stacks.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "kiln",
    version,
    about = "Synthesize EC2 Image Builder pipeline stacks into CloudFormation cloud assemblies"
)]
struct Cli {
    #[command(subcommand)]
    command: kiln::cli::Commands,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if let Err(e) = kiln::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

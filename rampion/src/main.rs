use clap::Parser;
use rampion::cli::{Cli, Commands};

pub fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .init();

    match cli.command {
        Commands::Serve(serve) => serve.run(),
        Commands::Connect(connect) => connect.run(),
    }
}

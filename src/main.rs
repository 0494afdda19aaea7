use clap::Parser;
use tracing_subscriber::EnvFilter;

mod app;
mod cli;
mod config;
mod documents;
mod eid;
mod images;
mod ocr;
mod processor;
mod samples;
mod semantic;
mod storage;
#[cfg(test)]
mod tests;
mod vision;
mod web;

use app::AppFactory;
use cli::{Command, GenerateSamplesCommand, ProcessCommand, SearchCommand, ServeCommand};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();

    let paths = AppFactory::get_paths()?;
    let config = AppFactory::create_config(&paths)?;

    match args.command {
        Command::Serve { addr } => {
            ServeCommand::new(addr, &config)?.execute(config)?;
        }

        Command::Process { file, thumbnail } => {
            ProcessCommand::new(file, thumbnail, &config)?.execute(config)?;
        }

        Command::Search { query, dir, top_k } => {
            SearchCommand::new(query, dir, top_k)?.execute(config)?;
        }

        Command::GenerateSamples { dir } => {
            GenerateSamplesCommand::new(dir, &config).execute()?;
        }
    };

    Ok(())
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod errors;
mod validation;

pub use commands::{GenerateSamplesCommand, ProcessCommand, SearchCommand, ServeCommand};

#[derive(Parser, Debug)]
#[command(version, about = "Search screenshots by their text and visual content", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the web interface.
    Serve {
        /// Listen address, e.g. 127.0.0.1:8080. Defaults to server.listen_addr
        #[clap(short, long)]
        addr: Option<String>,
    },

    /// Run OCR and vision on one image and print the resulting document as JSON.
    Process {
        /// Image file
        file: PathBuf,

        /// Also write the WebP thumbnail here
        #[clap(short, long)]
        thumbnail: Option<PathBuf>,
    },

    /// Index every image in a directory and search it.
    Search {
        /// What you remember about the screenshot
        query: String,

        /// Directory with screenshots
        #[clap(short, long)]
        dir: PathBuf,

        /// Number of results. Defaults to search.default_top_k
        #[clap(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Write demo screenshots for the "Load samples" button.
    GenerateSamples {
        /// Output directory. Defaults to samples_dir
        #[clap(short, long)]
        dir: Option<PathBuf>,
    },
}

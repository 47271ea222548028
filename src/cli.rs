use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pdfx")]
#[command(about = "Combine PDFs with generated outlines and tables of contents")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Combine the PDFs in a directory into a single document
    Combine {
        /// Directory containing the PDFs (defaults to the current directory)
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Add an outline entry for each combined file
        #[arg(short, long)]
        outline: bool,

        /// Insert generated table-of-contents pages with clickable links
        #[arg(short, long)]
        toc: bool,

        /// Read output name, file order, and sections from a manifest (md/txt)
        #[arg(short, long)]
        manifest: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Print the outline / bookmarks of a PDF
    Toc {
        /// PDF file to inspect
        path: PathBuf,
    },
}

use crate::prompts::CanvasKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "indie")]
#[command(author, version, about = "Chat with business documents and generate HTML canvases", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive session (upload, chat, generate, settings)
    Shell,

    /// Ask one question about the given files
    Chat {
        prompt: String,

        /// Files to use as context (pdf, docx, txt, md, xlsx, pptx, html, csv)
        #[arg(short, long = "file", required = true)]
        files: Vec<PathBuf>,
    },

    /// Generate an HTML document from the given files
    Generate {
        /// canvas, value-prop, plan or pitch
        #[arg(short, long, default_value = "canvas")]
        kind: CanvasKind,

        #[arg(short, long = "file")]
        files: Vec<PathBuf>,

        /// Directory to write business_plan.html into
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// Print the HTML instead of writing a file
        #[arg(long)]
        stdout: bool,
    },

    /// Check that the configured endpoint answers
    TestConnection,
}

pub mod handler;

pub use handler::handle_parse_command;

use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ParseCommands {
    /// Liquidation filenames (paths are reduced to their file name)
    #[arg(required = true)]
    pub filenames: Vec<String>,

    /// Rating component list (defaults to the one in the SQL directory)
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Print keys as JSON
    #[arg(long)]
    pub json: bool,
}

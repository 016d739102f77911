pub mod handler;

pub use handler::handle_process_command;

use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ProcessCommands {
    /// Directory holding the .xls/.xlsx liquidation files
    pub directory: PathBuf,

    /// Use the rating component list already on disk
    #[arg(long)]
    pub skip_catalog_refresh: bool,
}

pub mod handler;

pub use handler::handle_catalog_command;

use clap::Args;

#[derive(Args, Debug)]
pub struct CatalogCommands {
    /// Print every entry of the refreshed list
    #[arg(long, short)]
    pub verbose: bool,
}

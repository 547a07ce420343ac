use crate::prelude::*;
use clap::Parser;

mod batch;
mod config;
mod error;
mod fill;
mod prelude;
mod report;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Fill form labels and highlight terms on analyzed PDF documents"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Fill and highlight a single analyzed PDF
    Fill(crate::fill::App),

    /// Process every analyzed PDF under a directory
    Batch(crate::batch::App),

    /// Print the active synonym table
    Synonyms {
        /// Job config whose synonym overrides should be applied
        #[arg(short, long)]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let app = App::parse();

    match app.command {
        SubCommands::Fill(sub_app) => crate::fill::run(sub_app).await,
        SubCommands::Batch(sub_app) => crate::batch::run(sub_app).await,
        SubCommands::Synonyms { config } => {
            let loaded = match config {
                Some(path) => Some(crate::config::JobConfig::load(&path)?),
                None => None,
            };
            crate::fill::print_synonyms(loaded.as_ref());
            Ok(())
        }
    }
    .map_err(|err: color_eyre::eyre::Report| eyre!(err))
}

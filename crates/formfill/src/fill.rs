use std::path::PathBuf;

use overlay::AnalysisResult;

use crate::config::JobConfig;
use crate::prelude::{println, *};

#[derive(Debug, clap::Parser)]
#[command(name = "fill")]
#[command(about = "Fill and highlight a single analyzed PDF")]
pub struct App {
    /// Path to the original PDF
    pub pdf: PathBuf,
    /// Path to the layout-analysis JSON for that PDF
    pub analysis: PathBuf,
    /// Path to the job config (fill map, highlight terms, overrides)
    #[arg(short, long)]
    pub config: PathBuf,
    /// Where to write the composited PDF
    #[arg(short, long)]
    pub output: PathBuf,
    /// Print the processing report as JSON instead of a table
    #[arg(long)]
    pub report_json: bool,
}

pub async fn run(app: App) -> Result<()> {
    let config = JobConfig::load(&app.config)?;
    let pdf_bytes = std::fs::read(&app.pdf)
        .wrap_err_with(|| f!("failed to read PDF {}", app.pdf.display()))?;
    let analysis_bytes = std::fs::read(&app.analysis)
        .wrap_err_with(|| f!("failed to read analysis {}", app.analysis.display()))?;
    let analysis = AnalysisResult::from_json(&analysis_bytes).map_err(|e| eyre!(e))?;

    let filled = overlay::fill_document(
        &pdf_bytes,
        &analysis,
        &config.fill,
        &config.synonym_table(),
        &config.highlight,
        &config.overlay_config(),
    )
    .map_err(|e| eyre!(e))?;

    std::fs::write(&app.output, &filled.pdf)
        .wrap_err_with(|| f!("failed to write {}", app.output.display()))?;
    log::info!("wrote {}", app.output.display());

    if app.report_json {
        println!("{}", serde_json::to_string_pretty(&filled.report)?);
    } else {
        crate::report::print_document_report(&app.pdf.display().to_string(), &filled.report);
    }

    Ok(())
}

/// Print the active synonym table, optionally with a config's overrides.
pub fn print_synonyms(config: Option<&JobConfig>) {
    let table = match config {
        Some(cfg) => cfg.synonym_table(),
        None => overlay::SynonymTable::stock(),
    };

    let mut out = new_table();
    for key in table.keys() {
        if let Some(phrasings) = table.phrasings(key) {
            out.add_row(prettytable::row![key, phrasings.join(", ")]);
        }
    }
    out.printstd();
}

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use overlay::{AnalysisResult, DocumentReport};
use prettytable::row;

use crate::config::JobConfig;
use crate::prelude::{eprintln, println, *};

#[derive(Debug, clap::Parser)]
#[command(name = "batch")]
#[command(about = "Fill and highlight every analyzed PDF under a directory")]
pub struct App {
    /// Directory containing `<name>.pdf` + `<name>.json` analysis pairs
    pub input: PathBuf,
    /// Directory for composited PDFs (mirrors the input layout)
    #[arg(short, long)]
    pub output: PathBuf,
    /// Path to the shared job config
    #[arg(short, long)]
    pub config: PathBuf,
    /// Number of documents processed concurrently
    #[arg(short, long, default_value_t = 4)]
    pub jobs: usize,
}

/// One document to process: the PDF, its analysis sibling, and where
/// the composited output goes.
#[derive(Debug, Clone)]
struct DocJob {
    pdf: PathBuf,
    analysis: PathBuf,
    output: PathBuf,
}

struct DocOutcome {
    name: String,
    result: std::result::Result<DocumentReport, Error>,
}

pub async fn run(app: App) -> Result<()> {
    let config = Arc::new(JobConfig::load(&app.config)?);
    let (doc_jobs, skipped) = collect_jobs(&app.input, &app.output)?;

    for (path, error) in &skipped {
        eprintln!("warning: skipping {}: {}", path.display(), error);
    }
    if doc_jobs.is_empty() {
        println!("No analyzed PDFs found under {}", app.input.display());
        return Ok(());
    }

    let progress = ProgressBar::new(doc_jobs.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let workers = app.jobs.max(1);
    let outcomes: Vec<DocOutcome> = stream::iter(doc_jobs)
        .map(|job| {
            let config = Arc::clone(&config);
            let progress = progress.clone();
            async move {
                let name = job.pdf.display().to_string();
                let handle =
                    tokio::task::spawn_blocking(move || process_document(&job, &config));
                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(Error::Generic(e.to_string())),
                };
                progress.inc(1);
                DocOutcome { name, result }
            }
        })
        .buffer_unordered(workers)
        .collect()
        .await;
    progress.finish_and_clear();

    print_batch_summary(&outcomes);
    Ok(())
}

/// Process one document synchronously. Runs on the blocking pool; the
/// engine itself is pure CPU work.
fn process_document(
    job: &DocJob,
    config: &JobConfig,
) -> std::result::Result<DocumentReport, Error> {
    log::debug!("processing {}", job.pdf.display());
    let pdf_bytes =
        std::fs::read(&job.pdf).map_err(|e| Error::DocumentFailed(e.to_string()))?;
    let analysis_bytes =
        std::fs::read(&job.analysis).map_err(|e| Error::DocumentFailed(e.to_string()))?;
    let analysis = AnalysisResult::from_json(&analysis_bytes)
        .map_err(|e| Error::DocumentFailed(e.to_string()))?;

    let filled = overlay::fill_document(
        &pdf_bytes,
        &analysis,
        &config.fill,
        &config.synonym_table(),
        &config.highlight,
        &config.overlay_config(),
    )
    .map_err(|e| Error::DocumentFailed(e.to_string()))?;

    if let Some(parent) = job.output.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::DocumentFailed(e.to_string()))?;
    }
    std::fs::write(&job.output, &filled.pdf)
        .map_err(|e| Error::DocumentFailed(e.to_string()))?;

    Ok(filled.report)
}

/// Pair every PDF under `input` with its analysis sibling
/// (`<name>.json`). PDFs without one are reported, not processed.
fn collect_jobs(
    input: &Path,
    output: &Path,
) -> Result<(Vec<DocJob>, Vec<(PathBuf, Error)>)> {
    let mut pdfs = Vec::new();
    walk_pdfs(input, &mut pdfs)
        .wrap_err_with(|| f!("failed to scan {}", input.display()))?;
    pdfs.sort();

    let mut doc_jobs = Vec::new();
    let mut skipped = Vec::new();
    for pdf in pdfs {
        let analysis = pdf.with_extension("json");
        if !analysis.is_file() {
            skipped.push((
                pdf.clone(),
                Error::MissingAnalysis(analysis.display().to_string()),
            ));
            continue;
        }
        let relative = pdf.strip_prefix(input).unwrap_or(&pdf);
        doc_jobs.push(DocJob {
            output: output.join(relative),
            pdf,
            analysis,
        });
    }
    Ok((doc_jobs, skipped))
}

fn walk_pdfs(dir: &Path, pdfs: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk_pdfs(&path, pdfs)?;
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        {
            pdfs.push(path);
        }
    }
    Ok(())
}

fn print_batch_summary(outcomes: &[DocOutcome]) {
    let mut table = new_table();
    table.add_row(row!["Document", "Pages", "Placed", "Highlights", "Status"]);

    let mut failed = 0usize;
    for outcome in outcomes {
        match &outcome.result {
            Ok(report) => {
                let status = if report.page_failures.is_empty() {
                    "ok".to_string()
                } else {
                    f!("{} page(s) skipped", report.page_failures.len())
                };
                table.add_row(row![
                    outcome.name,
                    report.page_count,
                    report.placements.len(),
                    report.highlight_boxes.len(),
                    status
                ]);
            }
            Err(error) => {
                failed += 1;
                table.add_row(row![outcome.name, "-", "-", "-", error.to_string()]);
            }
        }
    }
    table.printstd();

    if failed > 0 {
        eprintln!("{failed} document(s) failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Document, Object};

    fn test_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let content_id = doc.add_object(Object::Stream(lopdf::Stream::new(
            dictionary! {},
            Vec::new(),
        )));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => Object::Reference(content_id),
        });
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        });
        if let Ok(page) = doc.get_object_mut(page_id) {
            if let Ok(dict) = page.as_dict_mut() {
                dict.set("Parent", Object::Reference(pages_id));
            }
        }
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn test_process_document_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("intake.pdf");
        let analysis = dir.path().join("intake.json");
        std::fs::write(&pdf, test_pdf()).unwrap();
        std::fs::write(
            &analysis,
            r#"{
                "pages": [{
                    "pageNumber": 1,
                    "width": 612.0,
                    "height": 792.0,
                    "unit": "point",
                    "lines": [{
                        "content": "Phone: ",
                        "polygon": [72.0, 100.0, 130.0, 100.0, 130.0, 112.0, 72.0, 112.0]
                    }]
                }]
            }"#,
        )
        .unwrap();

        let job = DocJob {
            pdf,
            analysis,
            output: dir.path().join("out").join("intake.pdf"),
        };
        let config: JobConfig =
            serde_json::from_str(r#"{"fill": {"phone": "555-1234"}}"#).unwrap();

        let report = process_document(&job, &config).unwrap();
        assert_eq!(report.page_count, 1);
        assert_eq!(report.placements.len(), 1);
        assert!(report.page_failures.is_empty());

        let written = std::fs::read(&job.output).unwrap();
        assert!(written.starts_with(b"%PDF"));
    }

    #[test]
    fn test_collect_jobs_pairs_pdf_with_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("forms");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("intake.pdf"), b"%PDF-").unwrap();
        std::fs::write(nested.join("intake.json"), b"{}").unwrap();
        std::fs::write(nested.join("orphan.pdf"), b"%PDF-").unwrap();

        let out = dir.path().join("out");
        let (doc_jobs, skipped) = collect_jobs(dir.path(), &out).unwrap();

        assert_eq!(doc_jobs.len(), 1);
        assert!(doc_jobs[0].pdf.ends_with("forms/intake.pdf"));
        assert!(doc_jobs[0].analysis.ends_with("forms/intake.json"));
        assert!(doc_jobs[0].output.ends_with("out/forms/intake.pdf"));
        assert_eq!(skipped.len(), 1);
        assert!(skipped[0].0.ends_with("orphan.pdf"));
    }

    #[test]
    fn test_collect_jobs_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let (doc_jobs, skipped) = collect_jobs(dir.path(), dir.path()).unwrap();
        assert!(doc_jobs.is_empty());
        assert!(skipped.is_empty());
    }

    #[test]
    fn test_walk_finds_uppercase_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("FORM.PDF"), b"%PDF-").unwrap();
        let mut pdfs = Vec::new();
        walk_pdfs(dir.path(), &mut pdfs).unwrap();
        assert_eq!(pdfs.len(), 1);
    }
}

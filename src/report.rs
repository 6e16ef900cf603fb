use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::SusError;
use crate::labels::ReportLabels;
use crate::pipeline::{Analysis, ReportOutput};

pub const DOCUMENT_FILE: &str = "report.json";
pub const MARKDOWN_FILE: &str = "report.md";
pub const CHARTS_DIR: &str = "charts";

/// Files written by [`write_bundle`].
#[derive(Debug, Clone)]
pub struct Bundle {
    pub document: PathBuf,
    pub markdown: PathBuf,
    pub charts: Vec<PathBuf>,
}

/// Statistics, band distribution and category breakdowns as Markdown sections.
pub fn render_analysis(analysis: &Analysis, labels: &ReportLabels) -> String {
    let mut output = String::new();
    let stats = &analysis.stats;

    let _ = writeln!(output, "## {}", labels.statistics_heading);
    if stats.is_empty() {
        let _ = writeln!(output, "- {}: 0", labels.respondents);
        let _ = writeln!(output, "{}", labels.no_data);
    } else {
        let _ = writeln!(output, "- {}: {}", labels.respondents, stats.count);
        let _ = writeln!(output, "- {}: {:.1}", labels.mean, stats.mean);
        for share in &stats.thresholds {
            let _ = writeln!(
                output,
                "- {} {:.0}: {:.1}%",
                labels.at_least, share.cutoff, share.percent
            );
        }
        let _ = writeln!(output, "- {}: {:.1}", labels.median, stats.median);
        let _ = writeln!(output, "- {}: {:.2}", labels.std_dev, stats.std_dev);
        let _ = writeln!(output, "- {}: {:.1}", labels.min, stats.min);
        let _ = writeln!(output, "- {}: {:.1}", labels.max, stats.max);
        let _ = writeln!(
            output,
            "- {} / {} / {}: {:.1} / {:.1} / {:.1}",
            labels.q1, labels.q3, labels.iqr, stats.q1, stats.q3, stats.iqr
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## {}", labels.classification_heading);
    let _ = writeln!(
        output,
        "| {} | {} | {} | {} |",
        labels.band, labels.range, labels.count, labels.share
    );
    let _ = writeln!(output, "|---|---|---:|---:|");
    for entry in &analysis.band_counts {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {:.1}% |",
            entry.band.label,
            entry.band.range_label(),
            entry.count,
            entry.percent
        );
    }

    let renderable: Vec<_> = analysis
        .groups
        .iter()
        .filter(|group| group.is_renderable())
        .collect();
    if !renderable.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## {}", labels.categories_heading);
        for group in renderable {
            let _ = writeln!(output);
            let _ = writeln!(output, "### {}", group.attribute);
            for bucket in &group.buckets {
                let _ = writeln!(
                    output,
                    "- {}: {:.1} (n={})",
                    bucket.label, bucket.mean_score, bucket.count
                );
            }
        }
    }

    output
}

pub fn build_markdown(output: &ReportOutput, labels: &ReportLabels) -> String {
    let document = &output.document;
    let mut markdown = String::new();

    let _ = writeln!(markdown, "# {}", document.title);
    let _ = writeln!(
        markdown,
        "{} {}",
        labels.generated_on,
        document.generated_at.format("%d/%m/%Y %H:%M")
    );
    let _ = writeln!(markdown);
    markdown.push_str(&render_analysis(&output.analysis, labels));

    if !output.images.is_empty() {
        let _ = writeln!(markdown);
        for (slot, artifact) in &output.artifacts {
            if output.images.contains_key(slot) {
                let _ = writeln!(
                    markdown,
                    "![{}]({CHARTS_DIR}/{}.png)",
                    artifact.title(),
                    slot.file_stem()
                );
            }
        }
    }

    let _ = writeln!(markdown);
    let _ = writeln!(markdown, "## {}", labels.summary_heading);
    match output.summary.text() {
        Some(text) => {
            let _ = writeln!(markdown, "{text}");
        }
        None => {
            let _ = writeln!(markdown, "_{}_", labels.summary_unavailable);
        }
    }

    markdown
}

/// Writes the page description, the Markdown report and every rendered chart
/// under `out_dir`, creating directories as needed.
pub fn write_bundle(
    output: &ReportOutput,
    labels: &ReportLabels,
    out_dir: &Path,
) -> Result<Bundle, SusError> {
    let charts_dir = out_dir.join(CHARTS_DIR);
    fs::create_dir_all(&charts_dir)?;

    let mut charts = Vec::new();
    for (slot, image) in &output.images {
        if image.bytes.is_empty() {
            return Err(SusError::Export(format!("chart {} has no image data", slot.file_stem())));
        }
        let path = charts_dir.join(format!("{}.{}", slot.file_stem(), image.format));
        fs::write(&path, &image.bytes)?;
        charts.push(path);
    }

    let document = out_dir.join(DOCUMENT_FILE);
    fs::write(&document, serde_json::to_string_pretty(&output.document)?)?;

    let markdown = out_dir.join(MARKDOWN_FILE);
    fs::write(&markdown, build_markdown(output, labels))?;

    info!(
        dir = %out_dir.display(),
        charts = charts.len(),
        pages = output.document.pages.len(),
        "report bundle written"
    );
    Ok(Bundle {
        document,
        markdown,
        charts,
    })
}

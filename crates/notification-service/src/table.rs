use analysis_core::{AnalysisError, ReportRenderer, ValuationReport};
use async_trait::async_trait;
use std::io::Write;

use crate::NotificationError;

const NAME_WIDTH: usize = 28;

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
        cut.push('~');
        cut
    }
}

/// Fixed-width console table.
#[derive(Debug, Default)]
pub struct TableRenderer;

impl TableRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn format(report: &ValuationReport) -> String {
        let mut out = format!(
            "{}  ({})\n",
            report.title,
            report.generated_at.format("%Y-%m-%d %H:%M UTC")
        );

        if report.rows.is_empty() {
            out.push_str(report.empty_message());
            out.push('\n');
        } else {
            let header = format!(
                "{:<8} {:<name$} {:>12} {:>12}  {}",
                "Ticker",
                "Company",
                "Price",
                "Model Price",
                "Judgment",
                name = NAME_WIDTH
            );
            out.push_str(&header);
            out.push('\n');
            out.push_str(&"-".repeat(header.len()));
            out.push('\n');
            for row in &report.rows {
                out.push_str(&format!(
                    "{:<8} {:<name$} {:>12} {:>12}  {}\n",
                    row.ticker,
                    truncate(&row.company_name, NAME_WIDTH),
                    row.current_price_display(),
                    row.predicted_price_display(),
                    row.judgment.to_label(),
                    name = NAME_WIDTH
                ));
            }
        }

        out.push_str(&format!(
            "{} scanned, {} skipped\n",
            report.total_scanned, report.skipped
        ));
        out
    }

    fn write(report: &ValuationReport) -> Result<(), NotificationError> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        handle.write_all(Self::format(report).as_bytes())?;
        handle.flush()?;
        Ok(())
    }
}

#[async_trait]
impl ReportRenderer for TableRenderer {
    async fn render(&self, report: &ValuationReport) -> Result<(), AnalysisError> {
        Self::write(report)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "table"
    }
}

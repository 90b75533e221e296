use analysis_core::{Judgment, ValuationReport};

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn judgment_color(judgment: Judgment) -> &'static str {
    match judgment {
        Judgment::Undervalued => "#22c55e",
        Judgment::Fair => "#64748b",
        Judgment::Overvalued => "#ef4444",
    }
}

pub struct ReportTemplate;

impl ReportTemplate {
    pub fn html(report: &ValuationReport) -> String {
        let body_content = if report.rows.is_empty() {
            format!(
                r#"<div style="padding:16px 20px;"><p style="color:#334155;margin:0;">{}</p></div>"#,
                report.empty_message()
            )
        } else {
            let rows: String = report
                .rows
                .iter()
                .enumerate()
                .map(|(i, row)| {
                    let stripe = if i % 2 == 1 { r#" style="background:#f8fafc;""# } else { "" };
                    format!(
                        r#"  <tr{stripe}><td style="padding:8px 12px;font-weight:600;">{ticker}</td><td style="padding:8px 12px;">{name}</td><td style="padding:8px 12px;text-align:right;">{current}</td><td style="padding:8px 12px;text-align:right;">{predicted}</td><td style="padding:8px 12px;font-weight:600;color:{color};">{label}</td></tr>
"#,
                        ticker = escape(&row.ticker),
                        name = escape(&row.company_name),
                        current = row.current_price_display(),
                        predicted = row.predicted_price_display(),
                        color = judgment_color(row.judgment),
                        label = row.judgment.to_label(),
                    )
                })
                .collect();
            format!(
                r#"<table style="width:100%;border-collapse:collapse;">
  <tr style="color:#94a3b8;text-align:left;"><th style="padding:8px 12px;">Ticker</th><th style="padding:8px 12px;">Company</th><th style="padding:8px 12px;text-align:right;">Price</th><th style="padding:8px 12px;text-align:right;">Model Price</th><th style="padding:8px 12px;">Judgment</th></tr>
{rows}</table>"#
            )
        };

        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1"></head>
<body style="margin:0;padding:0;background:#f1f5f9;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;">
<table width="100%" cellpadding="0" cellspacing="0" style="background:#f1f5f9;padding:32px 0;">
  <tr><td align="center">
    <table width="600" cellpadding="0" cellspacing="0" style="background:#ffffff;border-radius:8px;overflow:hidden;box-shadow:0 1px 3px rgba(0,0,0,0.1);">
      <tr><td style="background:#1e293b;color:#fff;padding:12px 20px;font-size:18px;font-weight:700;">{title}</td></tr>
      <tr><td>
        {body_content}
      </td></tr>
      <tr><td style="padding:16px 20px;border-top:1px solid #e2e8f0;">
        <p style="margin:0;color:#94a3b8;font-size:12px;">
          {scanned} tickers scanned, {skipped} skipped
          <br>Generated at {ts} UTC
        </p>
      </td></tr>
    </table>
  </td></tr>
</table>
</body>
</html>"#,
            title = escape(&report.title),
            scanned = report.total_scanned,
            skipped = report.skipped,
            ts = report.generated_at.format("%Y-%m-%d %H:%M:%S"),
        )
    }
}

//! Self-contained HTML report: a plain `format!`-assembled template (no
//! templating engine), embedding findings as an inline JSON blob with no
//! external asset fetches.

use std::fs;
use std::path::Path;

use crate::api::error::{EngineError, EngineErrorKind};
use crate::api::types::EngineReport;
use crate::core::exporter::ExportMeta;

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn row(report: &EngineReport) -> String {
    report
        .findings
        .iter()
        .map(|f| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&f.severity.to_string()),
                escape_html(&f.rule_id),
                escape_html(&f.file_path),
                escape_html(&f.message),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn write(path: &Path, report: &EngineReport, meta: &ExportMeta) -> Result<(), EngineError> {
    let findings_json = serde_json::to_string(&report.findings)
        .map_err(|e| EngineError::new(EngineErrorKind::ExportFailed, e.to_string()))?;

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{tool_name} report — {project_name}</title>
<style>
body {{ font-family: sans-serif; margin: 2rem; }}
table {{ border-collapse: collapse; width: 100%; }}
th, td {{ border: 1px solid #ccc; padding: 4px 8px; text-align: left; font-size: 0.9rem; }}
th {{ background: #f0f0f0; }}
</style>
</head>
<body>
<h1>{tool_name} {tool_version}</h1>
<p>Project: {project_name}</p>
<p>Generated: {generated_at} (epoch ms)</p>
<p>Findings: {count}</p>
<table>
<thead><tr><th>Severity</th><th>Rule</th><th>File</th><th>Message</th></tr></thead>
<tbody>
{rows}
</tbody>
</table>
<script type="application/json" id="findings-data">{findings_json}</script>
</body>
</html>
"#,
        tool_name = escape_html(meta.tool_name),
        tool_version = escape_html(meta.tool_version),
        project_name = escape_html(meta.project_name),
        generated_at = meta.generated_at_epoch_millis,
        count = report.findings.len(),
        rows = row(report),
        findings_json = findings_json,
    );

    fs::write(path, html).map_err(|e| EngineError::new(EngineErrorKind::ExportFailed, e.to_string()))
}

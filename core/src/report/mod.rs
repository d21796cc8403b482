//! Report synthesis: renders the run's collected records into a static
//! HTML report plus machine-readable JSON and CSV companions.
//!
//! Rendering is pure templating over already-written artifacts; nothing
//! here touches the network or re-derives data.

use std::path::PathBuf;

use serde::Serialize;

use crate::artifacts::RunArtifacts;
use crate::pipeline::{Finding, HostPorts, ScanSummary, ServiceProbe};

const TEMPLATE: &str = include_str!("template.html");

/// Everything `report.json` bundles in one document.
#[derive(Debug, Serialize)]
struct ReportBundle<'a> {
    summary: &'a ScanSummary,
    services: &'a [ServiceProbe],
    ports: &'a [HostPorts],
    findings: &'a [Finding],
}

/// Write `report.html`, `report.json` and `report.csv` into the run's
/// artifact directory. Returns the path of the HTML report.
pub async fn synthesize(
    artifacts: &RunArtifacts,
    summary: &ScanSummary,
    services: &[ServiceProbe],
    ports: &[HostPorts],
    findings: &[Finding],
) -> std::io::Result<PathBuf> {
    let bundle = ReportBundle {
        summary,
        services,
        ports,
        findings,
    };
    let json = serde_json::to_string_pretty(&bundle)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    tokio::fs::write(artifacts.report_json_path(), json).await?;

    let csv = render_csv(summary, services, ports, findings);
    tokio::fs::write(artifacts.report_csv_path(), csv).await?;

    let html = render_html(summary, services, ports, findings);
    let html_path = artifacts.report_html_path();
    tokio::fs::write(&html_path, html).await?;
    Ok(html_path)
}

fn render_html(
    summary: &ScanSummary,
    services: &[ServiceProbe],
    ports: &[HostPorts],
    findings: &[Finding],
) -> String {
    let service_rows = if services.is_empty() {
        r#"    <tr><td colspan="5" class="muted">none recorded</td></tr>"#.to_string()
    } else {
        services
            .iter()
            .map(|s| {
                format!(
                    "    <tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    escape(&s.url),
                    s.status_code,
                    escape(&s.title),
                    escape(&s.webserver),
                    escape(&s.technologies.join(", ")),
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let port_rows = if ports.is_empty() {
        r#"    <tr><td colspan="4" class="muted">none recorded</td></tr>"#.to_string()
    } else {
        ports
            .iter()
            .map(|h| {
                let list = h
                    .ports
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "    <tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    escape(&h.host),
                    escape(&h.ip),
                    list,
                    h.port_count,
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let finding_rows = if findings.is_empty() {
        r#"    <tr><td colspan="4" class="muted">none recorded</td></tr>"#.to_string()
    } else {
        let mut ordered: Vec<&Finding> = findings.iter().collect();
        ordered.sort_by_key(|f| severity_rank(&f.severity));
        ordered
            .iter()
            .map(|f| {
                format!(
                    "    <tr><td class=\"sev-{}\">{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    severity_class(&f.severity),
                    escape(&f.severity),
                    escape(&f.name),
                    escape(&f.template),
                    escape(&f.matched_at),
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let warnings = list_or_placeholder(&summary.warnings);
    let notes = list_or_placeholder(&summary.notes);

    TEMPLATE
        .replace("{{PROJECT}}", &escape(&summary.project_slug))
        .replace("{{RUN_ID}}", &escape(&summary.run_id))
        .replace(
            "{{GENERATED_AT}}",
            &summary.generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        )
        .replace(
            "{{TOTAL_SUBDOMAINS}}",
            &summary.stats.total_subdomains.to_string(),
        )
        .replace("{{LIVE_DNS}}", &summary.stats.live_dns.to_string())
        .replace("{{LIVE_HTTP}}", &summary.stats.live_http.to_string())
        .replace("{{OPEN_PORTS}}", &summary.stats.open_ports.to_string())
        .replace(
            "{{VULNERABILITIES}}",
            &summary.stats.vulnerabilities.to_string(),
        )
        .replace("{{SERVICE_ROWS}}", &service_rows)
        .replace("{{PORT_ROWS}}", &port_rows)
        .replace("{{FINDING_ROWS}}", &finding_rows)
        .replace("{{WARNINGS}}", &warnings)
        .replace("{{NOTES}}", &notes)
}

fn list_or_placeholder(items: &[String]) -> String {
    if items.is_empty() {
        return r#"<p class="muted">none</p>"#.to_string();
    }
    let mut out = String::from("<ul>\n");
    for item in items {
        out.push_str("  <li>");
        out.push_str(&escape(item));
        out.push_str("</li>\n");
    }
    out.push_str("</ul>");
    out
}

/// One CSV file with labelled sections, matching the HTML tables.
fn render_csv(
    summary: &ScanSummary,
    services: &[ServiceProbe],
    ports: &[HostPorts],
    findings: &[Finding],
) -> String {
    let mut out = String::new();

    out.push_str("section,key,value\n");
    out.push_str(&csv_row(&[
        "summary",
        "project",
        &summary.project_slug,
    ]));
    out.push_str(&csv_row(&["summary", "run_id", &summary.run_id]));
    out.push_str(&csv_row(&[
        "summary",
        "total_subdomains",
        &summary.stats.total_subdomains.to_string(),
    ]));
    out.push_str(&csv_row(&[
        "summary",
        "live_dns",
        &summary.stats.live_dns.to_string(),
    ]));
    out.push_str(&csv_row(&[
        "summary",
        "live_http",
        &summary.stats.live_http.to_string(),
    ]));
    out.push_str(&csv_row(&[
        "summary",
        "open_ports",
        &summary.stats.open_ports.to_string(),
    ]));
    out.push_str(&csv_row(&[
        "summary",
        "vulnerabilities",
        &summary.stats.vulnerabilities.to_string(),
    ]));

    out.push('\n');
    out.push_str("section,url,status_code,title,webserver,technologies\n");
    for s in services {
        out.push_str(&csv_row(&[
            "services",
            &s.url,
            &s.status_code.to_string(),
            &s.title,
            &s.webserver,
            &s.technologies.join(";"),
        ]));
    }

    out.push('\n');
    out.push_str("section,host,ip,ports,port_count\n");
    for h in ports {
        let list = h
            .ports
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(";");
        out.push_str(&csv_row(&[
            "ports",
            &h.host,
            &h.ip,
            &list,
            &h.port_count.to_string(),
        ]));
    }

    out.push('\n');
    out.push_str("section,severity,name,template,host,matched_at\n");
    for f in findings {
        out.push_str(&csv_row(&[
            "findings",
            &f.severity,
            &f.name,
            &f.template,
            &f.host,
            &f.matched_at,
        ]));
    }

    out
}

fn csv_row(fields: &[&str]) -> String {
    let mut row = fields
        .iter()
        .map(|f| csv_escape(f))
        .collect::<Vec<_>>()
        .join(",");
    row.push('\n');
    row
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn severity_rank(severity: &str) -> u8 {
    match severity {
        "critical" => 0,
        "high" => 1,
        "medium" => 2,
        "low" => 3,
        "info" => 4,
        _ => 5,
    }
}

fn severity_class(severity: &str) -> &'static str {
    match severity {
        "critical" => "critical",
        "high" => "high",
        "medium" => "medium",
        "low" => "low",
        "info" => "info",
        _ => "unknown",
    }
}

//! Markdown and JSON renderings of reports.

use anyhow::Result;
use std::fmt::Write as _;

use crate::aggregate::{AggregateReport, ReportSection};
use crate::report::{ArtifactIdentity, ArtifactReport, FindingGroup, Level};

fn level_symbol(level: Level) -> &'static str {
    match level {
        Level::Info => "\u{1F4AC}",
        Level::Warn => "\u{26A0}\u{FE0F}",
        Level::Error => "\u{274C}",
    }
}

const CLEAN_MESSAGE: &str = "No messages generated. Good plugin! \u{2764}\u{FE0F}";

fn artifact_link(artifact: &ArtifactIdentity) -> String {
    match &artifact.source_url {
        Some(url) => format!("[`{}`]({url})", artifact.coordinates),
        None => format!("`{}`", artifact.coordinates),
    }
}

fn write_groups(out: &mut String, groups: &[FindingGroup]) {
    for group in groups {
        let _ = writeln!(out, "### {}\n", group.title);
        for finding in &group.findings {
            let _ = writeln!(out, "- {} {}", level_symbol(finding.level), finding.message);
        }
        out.push('\n');
    }
}

pub fn render_artifact_markdown(report: &ArtifactReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "## Plugin {}\n", artifact_link(&report.artifact));
    if report.is_clean() {
        let _ = writeln!(out, "{CLEAN_MESSAGE}\n");
    } else {
        write_groups(&mut out, &report.groups);
    }
    out
}

fn write_section(out: &mut String, section: &ReportSection) {
    let links: Vec<String> = section.artifacts.iter().map(artifact_link).collect();
    let noun = if links.len() == 1 { "Plugin" } else { "Plugins" };
    let _ = writeln!(out, "## {noun} {}\n", links.join(", "));
    if let Some(reason) = &section.failure {
        let _ = writeln!(out, "{} Could not be analyzed: {reason}\n", level_symbol(Level::Error));
    } else {
        write_groups(out, &section.groups);
    }
}

/// The combined document. Identical inputs render identical bytes.
pub fn render_aggregate_markdown(report: &AggregateReport) -> String {
    let mut out = String::from("# Plugin validation report\n\n");
    let clean: Vec<&ReportSection> = report.clean().collect();
    let failed: Vec<&ReportSection> = report.failed().collect();
    let with_findings: Vec<&ReportSection> = report.with_findings().collect();
    let count = |sections: &[&ReportSection]| -> usize {
        sections.iter().map(|s| s.artifacts.len()).sum()
    };
    let _ = writeln!(
        out,
        "Analyzed **{}** artifacts: {} with findings, {} clean, {} could not be analyzed.\n",
        report.artifact_count(),
        count(&with_findings),
        count(&clean),
        count(&failed)
    );

    for section in &with_findings {
        write_section(&mut out, section);
    }

    if !clean.is_empty() {
        let _ = writeln!(out, "## Clean plugins\n\n{CLEAN_MESSAGE}\n");
        for artifact in clean.iter().flat_map(|s| &s.artifacts) {
            let _ = writeln!(out, "- {}", artifact_link(artifact));
        }
        out.push('\n');
    }

    if !failed.is_empty() {
        out.push_str("## Could not be analyzed\n\n");
        for section in &failed {
            write_section(&mut out, section);
        }
    }
    out
}

pub fn render_reports_json(reports: &[ArtifactReport]) -> Result<String> {
    Ok(serde_json::to_string_pretty(reports)?)
}

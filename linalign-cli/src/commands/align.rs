//! Align command implementation - global alignment of two sequence files

use anyhow::{Context, Result};
use linalign_core::{
    AlignmentReport, EditOp, MatchMismatch, RecursiveRefiner, ScoreTable, ScoringModel, SubstitutionMatrix,
};
use serde::Serialize;
use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

use crate::config::Config;
use crate::error::CliError;
use crate::fasta::{read_first_record, SequenceRecord};

#[derive(Serialize)]
struct JsonOutput<'a> {
    query_id: &'a str,
    target_id: &'a str,
    cigar: String,
    identity: f64,
    similarity: f64,
    distance: f64,
    report: &'a AlignmentReport,
}

pub fn execute(config: &Config, query: &Path, target: &Path, anchors: &[String], out: Option<&Path>) -> Result<()> {
    let anchors = parse_anchors(anchors)?;
    let query = read_first_record(query)?;
    let target = read_first_record(target)?;

    let report = match config.scoring.matrix.as_str() {
        "identity" => run(
            MatchMismatch::new(config.scoring.match_score, config.scoring.mismatch),
            config,
            &query,
            &target,
            &anchors,
        )?,
        _ => run(
            ScoreTable::nucleotide(config.scoring.match_score, config.scoring.mismatch),
            config,
            &query,
            &target,
            &anchors,
        )?,
    };

    let rendered = if config.general.format == "json" {
        format_json(&query, &target, &report)?
    } else {
        format_text(&query, &target, &report, config.general.line_width)?
    };

    match out {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write output file: {}", path.display()))?;
            log::info!("Alignment written to {}", path.display());
        }
        None => {
            std::io::stdout()
                .lock()
                .write_all(rendered.as_bytes())
                .context("Failed to write alignment")?;
        }
    }
    Ok(())
}

fn run<M>(
    substitution: M,
    config: &Config,
    query: &SequenceRecord,
    target: &SequenceRecord,
    anchors: &[(usize, usize)],
) -> Result<AlignmentReport>
where
    M: SubstitutionMatrix<u8> + Sync,
{
    let model = ScoringModel::new(substitution, config.scoring.gaps());
    let aligner = RecursiveRefiner::new(model, config.aligner.clone());
    let report = aligner
        .align_anchored(&query.seq, &target.seq, anchors)
        .with_context(|| format!("Failed to align {} against {}", query.id, target.id))?;

    let stats = &report.stats;
    log::info!(
        "Aligned {} x {} bp: score {}, {} passes, {} leaves, {} anchors in {:.2?}",
        query.seq.len(),
        target.seq.len(),
        report.score(),
        stats.passes,
        stats.leaves,
        stats.anchors,
        stats.elapsed
    );
    if stats.fallback_rectangles > 0 {
        log::warn!(
            "{} rectangles solved in quadratic space; consider raising max_passes",
            stats.fallback_rectangles
        );
    }
    Ok(report)
}

/// Parse `QUERY:TARGET` anchor arguments (1-based positions).
pub fn parse_anchors(args: &[String]) -> Result<Vec<(usize, usize)>, CliError> {
    args
        .iter()
        .map(|arg| {
            let (i, j) = arg
                .split_once(':')
                .ok_or_else(|| CliError::validation(format!("anchor '{}' is not QUERY:TARGET", arg)))?;
            let position = |value: &str| {
                value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| CliError::validation(format!("anchor '{}' has a bad position '{}'", arg, value)))
            };
            Ok((position(i)?, position(j)?))
        })
        .collect()
}

fn format_json(query: &SequenceRecord, target: &SequenceRecord, report: &AlignmentReport) -> Result<String> {
    let output = JsonOutput {
        query_id: &query.id,
        target_id: &target.id,
        cigar: report.alignment.cigar(),
        identity: report.alignment.identity(),
        similarity: report.similarity(),
        distance: report.distance(),
        report,
    };
    let mut json = serde_json::to_string_pretty(&output).context("Failed to serialize alignment")?;
    json.push('\n');
    Ok(json)
}

fn format_text(
    query: &SequenceRecord,
    target: &SequenceRecord,
    report: &AlignmentReport,
    line_width: usize,
) -> Result<String> {
    let alignment = &report.alignment;
    let stats = &report.stats;
    let mut text = String::new();

    let _ = writeln!(text, "Query:      {} ({} bp)", query.id, query.seq.len());
    let _ = writeln!(text, "Target:     {} ({} bp)", target.id, target.seq.len());
    let _ = writeln!(text, "Score:      {}", alignment.score);
    let _ = writeln!(
        text,
        "Identity:   {}/{} ({:.1}%)",
        alignment.matches(),
        alignment.len(),
        alignment.identity() * 100.0
    );
    let _ = writeln!(text, "Gaps:       {} in {} runs", alignment.gap_count(), alignment.gap_runs());
    let _ = writeln!(text, "Similarity: {:.4}", report.similarity());
    let _ = writeln!(
        text,
        "Refinement: {} passes, {} leaves, {} anchors",
        stats.passes, stats.leaves, stats.anchors
    );
    let _ = writeln!(text, "CIGAR:      {}", alignment.cigar());

    let (query_row, target_row) = alignment
        .render(&query.seq, &target.seq, b'-')
        .context("Failed to render alignment rows")?;
    let markers: Vec<u8> = alignment
        .ops
        .iter()
        .map(|op| match op {
            EditOp::Match => b'|',
            EditOp::Mismatch => b'.',
            EditOp::GapInTarget | EditOp::GapInQuery => b' ',
        })
        .collect();

    let width = line_width.max(1);
    for ((q, m), t) in query_row.chunks(width).zip(markers.chunks(width)).zip(target_row.chunks(width)) {
        let _ = writeln!(text);
        let _ = writeln!(text, "{}", String::from_utf8_lossy(q));
        let _ = writeln!(text, "{}", String::from_utf8_lossy(m));
        let _ = writeln!(text, "{}", String::from_utf8_lossy(t));
    }
    Ok(text)
}

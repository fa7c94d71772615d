//! FASTA/FASTQ input
//!
//! Reads the first record of a plain or gzipped FASTA/FASTQ file with
//! needletail.

use crate::error::CliError;
use anyhow::Result;
use flate2::read::GzDecoder;
use needletail::{parse_fastx_file, parse_fastx_reader, FastxReader};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// One named sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub id: String,
    pub seq: Vec<u8>,
}

/// Load the first record of `path`. A `.gz` suffix selects gzip decoding.
pub fn read_first_record(path: &Path) -> Result<SequenceRecord> {
    if !path.exists() {
        return Err(CliError::file_not_found(path.to_path_buf()).into());
    }
    let name = path.display().to_string();

    let reader = if path.extension().map_or(false, |ext| ext == "gz") {
        let decoder = GzDecoder::new(File::open(path)?);
        parse_fastx_reader(BufReader::new(decoder))
    } else {
        parse_fastx_file(path)
    };
    let mut reader = reader.map_err(|e| CliError::parse(name.clone(), e.to_string()))?;

    let record = first_record(reader.as_mut(), &name)?;
    log::info!("Loaded {} ({} bp) from {}", record.id, record.seq.len(), name);
    Ok(record)
}

fn first_record(reader: &mut dyn FastxReader, name: &str) -> Result<SequenceRecord> {
    let record = match reader.next() {
        Some(record) => record.map_err(|e| CliError::parse(name.to_string(), e.to_string()))?,
        None => return Err(CliError::parse(name.to_string(), "no sequences found".to_string()).into()),
    };
    let id = String::from_utf8_lossy(record.id()).to_string();
    let seq = record.seq().to_vec();

    if reader.next().is_some() {
        log::warn!("{} holds several records; aligning only '{}'", name, id);
    }
    Ok(SequenceRecord { id, seq })
}

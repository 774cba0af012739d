//! On-disk corpus snapshot loading.
//!
//! The ETL pipeline writes one CSV file per sub-collection into a
//! snapshot directory. Each row becomes one [`Document`]: every column
//! lands in metadata (which is how the stable identifier column
//! reaches fusion and traversal), and the page content lists the
//! columns as `key: value` lines, matching what the embedding
//! generator fed the vector side of the snapshot.

use ribo_core::{Document, Result, RiboError};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// One discovered sub-collection of the corpus snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSource {
    /// Partition name (the CSV file stem).
    pub name: String,
    /// Path to the partition's CSV file.
    pub csv_path: PathBuf,
}

/// Discover sub-collections under `snapshot_dir`.
///
/// Partitions are returned sorted by name; this is the discovery order
/// that downstream context rendering preserves.
pub fn discover_partitions(snapshot_dir: &Path) -> Result<Vec<PartitionSource>> {
    if !snapshot_dir.is_dir() {
        return Err(RiboError::Corpus(format!(
            "snapshot directory does not exist: {}",
            snapshot_dir.display()
        )));
    }

    let mut partitions = Vec::new();
    for entry in fs::read_dir(snapshot_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        partitions.push(PartitionSource {
            name: stem.to_string(),
            csv_path: path.clone(),
        });
    }
    partitions.sort_by(|a, b| a.name.cmp(&b.name));

    info!(
        dir = %snapshot_dir.display(),
        count = partitions.len(),
        "discovered corpus partitions"
    );
    Ok(partitions)
}

/// Load every row of a partition CSV as a [`Document`].
pub fn load_csv_documents(partition: &PartitionSource) -> Result<Vec<Document>> {
    let mut reader = csv::Reader::from_path(&partition.csv_path)
        .map_err(|e| RiboError::Corpus(format!("{}: {e}", partition.csv_path.display())))?;
    let headers = reader
        .headers()
        .map_err(|e| RiboError::Corpus(format!("{}: {e}", partition.csv_path.display())))?
        .clone();

    let mut docs = Vec::new();
    for (row_no, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            RiboError::Corpus(format!(
                "{} row {row_no}: {e}",
                partition.csv_path.display()
            ))
        })?;

        let mut lines = Vec::with_capacity(headers.len());
        let mut doc = Document::new(String::new())
            .with_metadata("source", partition.name.clone())
            .with_metadata("row", Value::from(row_no as u64));
        for (header, field) in headers.iter().zip(record.iter()) {
            lines.push(format!("{header}: {field}"));
            doc.metadata
                .insert(header.to_string(), Value::from(field.to_string()));
        }
        doc.page_content = lines.join("\n");
        docs.push(doc);
    }

    info!(
        partition = %partition.name,
        documents = docs.len(),
        "loaded corpus partition"
    );
    Ok(docs)
}

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{info, warn};

use crate::models::{GradeEntry, HistoricalDataset};
use crate::store::RecordStore;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ImportSummary {
    pub inserted: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

/// JSON files in `dir`, sorted by name, ignoring hidden files.
pub fn dataset_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .and_then(|name| name.to_str())
            .map_or(true, |name| name.starts_with('.'));
        let is_json = path.extension().and_then(|ext| ext.to_str()) == Some("json");
        if path.is_file() && is_json && !hidden {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn read_dataset(path: &Path) -> anyhow::Result<HistoricalDataset> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Inserts every dataset file of `dir`; datasets whose (module, period,
/// institution) already exists are reported as skipped.
pub async fn import_datasets(store: &dyn RecordStore, dir: &Path) -> anyhow::Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for path in dataset_files(dir)? {
        let dataset = read_dataset(&path)?;
        if store.insert_dataset(&dataset).await? {
            info!(file = %path.display(), module = %dataset.module, period = %dataset.period, "inserted dataset");
            summary.inserted.push(path);
        } else {
            warn!(file = %path.display(), "dataset was already inserted");
            summary.skipped.push(path);
        }
    }

    Ok(summary)
}

/// Reads `module,period,grade` rows.
pub fn read_grade_entries(csv_path: &Path) -> anyhow::Result<Vec<GradeEntry>> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("opening {}", csv_path.display()))?;
    let mut entries = Vec::new();

    for result in reader.deserialize::<GradeEntry>() {
        entries.push(result.with_context(|| format!("parsing {}", csv_path.display()))?);
    }

    Ok(entries)
}

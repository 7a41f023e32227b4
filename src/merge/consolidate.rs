use crate::config::MergeConfig;
use crate::error::{Error, Result};
use crate::merge::archive::extract_archives;
use crate::merge::table::{Table, TableKind};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

/// What one merge run produced, for the final summary.
#[derive(Debug, Default, Clone)]
pub struct MergeSummary {
    pub datapoint_rows: usize,
    pub metadata_rows: usize,
    pub series: usize,
    pub fragments_consumed: usize,
    pub fragments_removed: usize,
}

/// Merges per-page CSV fragments into one datapoints table and one metadata
/// table per category, gated on both tables describing the same identifier
/// set. Purely sequential.
pub struct Consolidator {
    config: MergeConfig,
}

impl Consolidator {
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    pub fn run(&self) -> Result<MergeSummary> {
        if self.config.unzip {
            let unpacked = extract_archives(&self.config.input_dir)?;
            log::info!("Extracted {unpacked} archive(s)");
        }

        let datapoint_files = self.fragment_files(TableKind::Datapoints)?;
        let metadata_files = self.fragment_files(TableKind::Metadata)?;

        let datapoints = self.load_fragments(TableKind::Datapoints, &datapoint_files)?;
        let metadata = self.load_fragments(TableKind::Metadata, &metadata_files)?;

        // Correctness gate: both tables must describe exactly the same
        // series. Runs before anything is persisted so a mismatched download
        // never leaves output behind.
        check_identifier_sets(&datapoints, &metadata)?;

        fs::create_dir_all(&self.config.output_dir)?;
        let series = datapoints.ids().collect::<HashSet<_>>().len();
        let mut summary = MergeSummary {
            datapoint_rows: datapoints.len(),
            metadata_rows: metadata.len(),
            series,
            fragments_consumed: datapoint_files.len() + metadata_files.len(),
            fragments_removed: 0,
        };

        for (kind, table) in [
            (TableKind::Datapoints, &datapoints),
            (TableKind::Metadata, &metadata),
        ] {
            let path = self.output_path(kind);
            log::info!("Writing {} ({} rows)", path.display(), table.len());
            table.write(&path)?;
        }

        if self.config.clean {
            for path in datapoint_files.iter().chain(&metadata_files) {
                fs::remove_file(path)?;
                summary.fragments_removed += 1;
            }
            log::info!("Removed {} fragment file(s)", summary.fragments_removed);
        }

        Ok(summary)
    }

    /// All fragment files of one kind, sorted by name so the merge is
    /// deterministic across runs.
    fn fragment_files(&self, kind: TableKind) -> Result<Vec<PathBuf>> {
        let prefix = kind.fragment_prefix();
        let dir = &self.config.input_dir;

        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|e| Error::NoData(format!("cannot read {}: {e}", dir.display())))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|name| name.starts_with(&prefix) && name.ends_with(".csv"))
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(Error::NoData(format!(
                "no '{prefix}*.csv' fragments in {}; run the scrape step first",
                dir.display()
            )));
        }
        Ok(files)
    }

    fn load_fragments(&self, kind: TableKind, files: &[PathBuf]) -> Result<Table> {
        let mut merged = Table::default();
        for (i, path) in files.iter().enumerate() {
            log::info!("({kind}) Loading file {i}: {}", path.display());
            merged.append(Table::load(path)?)?;
        }
        merged.dedup_full_rows();
        Ok(merged)
    }

    fn output_path(&self, kind: TableKind) -> PathBuf {
        self.config
            .output_dir
            .join(format!("{}_{kind}.csv", self.config.category))
    }
}

/// The set of identifiers in the metadata table must equal the set seen
/// across the datapoints fragments; any difference means the download is
/// partial or mismatched and the run must abort.
fn check_identifier_sets(datapoints: &Table, metadata: &Table) -> Result<()> {
    let datapoint_ids: HashSet<&str> = datapoints.ids().collect();
    let metadata_ids: HashSet<&str> = metadata.ids().collect();
    if datapoint_ids == metadata_ids {
        return Ok(());
    }

    let missing_meta: Vec<&&str> = datapoint_ids.difference(&metadata_ids).take(5).collect();
    let missing_data: Vec<&&str> = metadata_ids.difference(&datapoint_ids).take(5).collect();
    Err(Error::Consistency(format!(
        "{} identifier(s) have datapoints but no metadata (e.g. {missing_meta:?}), \
         {} identifier(s) have metadata but no datapoints (e.g. {missing_data:?})",
        datapoint_ids.difference(&metadata_ids).count(),
        metadata_ids.difference(&datapoint_ids).count(),
    )))
}

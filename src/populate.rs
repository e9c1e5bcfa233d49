//! Bulk (re)population of reference cells from existing source records,
//! one registered source at a time.

use std::time::Instant;

use rusqlite::Connection;
use thiserror::Error;

use crate::registry::{Registry, RegistryError};
use crate::schema::SourceRecord;
use crate::store::{self, StoreError};
use crate::sync::{NoopSynchronizer, StoreSynchronizer, SyncError, Synchronizer};

#[derive(Error, Debug)]
pub enum PopulateError {
    #[error("Failed to load records for '{source_name}': {reason}")]
    Provider { source_name: String, reason: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Hands the populater the existing records of a source, in any order.
pub trait RecordProvider {
    fn records(&self, source_name: &str) -> Result<Vec<Box<dyn SourceRecord>>, PopulateError>;
}

#[derive(Debug, Clone, Default)]
pub struct PopulateOptions {
    /// Restrict the run to these sources. None means every registered source.
    pub sources: Option<Vec<String>>,
    pub exclude_sources: Vec<String>,
    /// Leave sources alone that already have cells.
    pub skip_existing: bool,
    /// Wipe a source's cells before repopulating it.
    pub delete_existing: bool,
    /// Walk everything but write nothing.
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source_name: String,
    pub records: usize,
    pub cells_written: usize,
    pub skipped: bool,
    pub error: Option<String>,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone)]
pub struct PopulateReport {
    pub sources: Vec<SourceReport>,
    pub elapsed_ms: u128,
}

impl PopulateReport {
    pub fn total_cells_written(&self) -> usize {
        self.sources.iter().map(|s| s.cells_written).sum()
    }

    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(|s| s.error.is_some())
    }
}

pub struct Populater<'a> {
    registry: &'a Registry,
    provider: &'a dyn RecordProvider,
    options: PopulateOptions,
}

impl<'a> Populater<'a> {
    pub fn new(
        registry: &'a Registry,
        provider: &'a dyn RecordProvider,
        options: PopulateOptions,
    ) -> Self {
        Self {
            registry,
            provider,
            options,
        }
    }

    fn selected_sources(&self) -> Vec<String> {
        let mut names: Vec<String> = match &self.options.sources {
            Some(names) => names.clone(),
            None => self.registry.source_names(),
        };
        names.retain(|name| !self.options.exclude_sources.contains(name));
        names
    }

    /// Populate each selected source in turn. A failing source is reported
    /// and does not stop the run.
    pub fn populate(&self, conn: &Connection) -> Result<PopulateReport, PopulateError> {
        let run_started = Instant::now();
        let synchronizer: &dyn Synchronizer = if self.options.dry_run {
            &NoopSynchronizer
        } else {
            &StoreSynchronizer
        };

        let mut reports = Vec::new();
        for source_name in self.selected_sources() {
            let started = Instant::now();
            match self.populate_source(conn, &source_name, synchronizer) {
                Ok(report) => reports.push(SourceReport {
                    elapsed_ms: started.elapsed().as_millis(),
                    ..report
                }),
                Err(err) => {
                    tracing::warn!(source = %source_name, error = %err, "population failed");
                    reports.push(SourceReport {
                        source_name,
                        records: 0,
                        cells_written: 0,
                        skipped: false,
                        error: Some(err.to_string()),
                        elapsed_ms: started.elapsed().as_millis(),
                    });
                }
            }
        }
        Ok(PopulateReport {
            sources: reports,
            elapsed_ms: run_started.elapsed().as_millis(),
        })
    }

    fn populate_source(
        &self,
        conn: &Connection,
        source_name: &str,
        synchronizer: &dyn Synchronizer,
    ) -> Result<SourceReport, PopulateError> {
        self.registry.get(source_name)?;

        if self.options.skip_existing && store::source_has_cells(conn, source_name)? {
            tracing::debug!(source = %source_name, "skipping source with existing cells");
            return Ok(SourceReport {
                source_name: source_name.to_string(),
                records: 0,
                cells_written: 0,
                skipped: true,
                error: None,
                elapsed_ms: 0,
            });
        }
        if self.options.delete_existing && !self.options.dry_run {
            let deleted = store::delete_cells_for_source(conn, source_name)?;
            tracing::debug!(source = %source_name, deleted, "deleted existing cells");
        }

        let records = self.provider.records(source_name)?;
        let mut cells_written = 0;
        for record in &records {
            cells_written += synchronizer.update(conn, self.registry, record.as_ref())?;
        }
        tracing::info!(source = %source_name, records = records.len(), cells_written, "populated source");
        Ok(SourceReport {
            source_name: source_name.to_string(),
            records: records.len(),
            cells_written,
            skipped: false,
            error: None,
            elapsed_ms: 0,
        })
    }

    /// Per-source cell counts for the current selection. Reads only.
    pub fn summarize(&self, conn: &Connection) -> Result<Vec<(String, i64)>, PopulateError> {
        let mut counts = Vec::new();
        for source_name in self.selected_sources() {
            counts.push((
                source_name.clone(),
                store::count_cells_for_source(conn, &source_name)?,
            ));
        }
        Ok(counts)
    }
}

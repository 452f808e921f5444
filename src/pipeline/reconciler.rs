//! Schema Reconciler
//!
//! Reads the real (CSV, header row) and synthetic (JSON record list) sources,
//! projects both into the unified six-column schema and persists the result.
//!
//! Column lookup on the real source is lenient: a column that is missing from
//! the header, out of bounds for a row, or blank is replaced by a declared
//! default, and every substitution is counted per column and reported.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use sha2::{Digest, Sha256};

use super::error::{PipelineError, PipelineResult};
use crate::models::{
    format_instant, FieldSubstitution, FraudLabel, RunIdentity, SyntheticRecord, UnifiedDataset, UnifiedRow,
    UNIFIED_CONTENT_TYPE,
};
use crate::services::{ObjectStore, ObjectUri, ServiceError};

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Bucket receiving the unified dataset
    pub bucket: String,
    /// Key prefix for unified datasets, e.g. `training-data/combined/`
    pub combined_prefix: String,
}

/// What a missing real-data cell becomes.
#[derive(Debug, Clone, Copy)]
enum ColumnDefault {
    Fixed(&'static str),
    /// The run's submission instant, so reruns of one run stay byte-identical.
    SubmissionTime,
}

/// Real-data column feeding one unified column, in unified order.
struct ColumnRule {
    source: &'static str,
    default: ColumnDefault,
    /// Absent in most real exports; substituting it is expected.
    routine: bool,
}

const REAL_COLUMNS: [ColumnRule; 6] = [
    ColumnRule { source: "EVENT_LABEL", default: ColumnDefault::Fixed("0"), routine: true },
    ColumnRule { source: "eventTimestamp", default: ColumnDefault::SubmissionTime, routine: false },
    ColumnRule { source: "purchaseAmount", default: ColumnDefault::Fixed("0.0"), routine: false },
    ColumnRule { source: "ipAddress", default: ColumnDefault::Fixed("0.0.0.0"), routine: false },
    ColumnRule { source: "device_id", default: ColumnDefault::Fixed("unknown_device"), routine: false },
    ColumnRule { source: "payment_method", default: ColumnDefault::Fixed("unknown_method"), routine: false },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub dataset: ObjectUri,
    pub real_rows: usize,
    pub synthetic_rows: usize,
    pub substitutions: Vec<FieldSubstitution>,
    /// Hex SHA-256 of the stored bytes
    pub sha256: String,
}

/// Parsed real data: header name -> index, plus raw rows.
#[derive(Debug, Clone)]
pub struct TabularSource {
    columns: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl TabularSource {
    /// Split on commas, no quoting. Blank lines are skipped.
    pub fn parse(text: &str) -> PipelineResult<Self> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut lines = text.lines();

        let header = lines
            .next()
            .filter(|line| !line.trim().is_empty())
            .ok_or_else(|| PipelineError::DataSource("real data CSV is empty or has no header".to_string()))?;

        let columns = header
            .split(',')
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();

        let rows = lines
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.split(',').map(str::to_string).collect())
            .collect();

        Ok(Self { columns, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Trimmed, non-blank value of `column` in `row`, if resolvable.
    fn cell<'a>(&self, row: &'a [String], column: &str) -> Option<&'a str> {
        let index = *self.columns.get(column)?;
        row.get(index).map(|v| v.trim()).filter(|v| !v.is_empty())
    }
}

/// Project both sources into the unified schema: real rows first.
pub fn unify(
    tabular: &TabularSource,
    synthetic: &[SyntheticRecord],
    fallback_timestamp: &str,
) -> (UnifiedDataset, Vec<FieldSubstitution>) {
    let mut substituted: BTreeMap<usize, usize> = BTreeMap::new();
    let mut rows = Vec::with_capacity(tabular.row_count() + synthetic.len());

    for record in &tabular.rows {
        let mut cells: [String; 6] = Default::default();
        for (i, rule) in REAL_COLUMNS.iter().enumerate() {
            cells[i] = match tabular.cell(record, rule.source) {
                Some(value) => value.to_string(),
                None => {
                    *substituted.entry(i).or_default() += 1;
                    default_value(rule.default, fallback_timestamp).to_string()
                }
            };
        }
        let [label, timestamp, purchase_amount, ip_address, device_id, payment_method] = cells;
        rows.push(UnifiedRow {
            label,
            timestamp,
            purchase_amount,
            ip_address,
            device_id,
            payment_method,
        });
    }

    rows.extend(
        synthetic
            .iter()
            .map(|record| UnifiedRow::from_synthetic(record, fallback_timestamp)),
    );

    let substitutions = substituted
        .into_iter()
        .map(|(i, count)| FieldSubstitution {
            column: REAL_COLUMNS[i].source.to_string(),
            default: default_value(REAL_COLUMNS[i].default, fallback_timestamp).to_string(),
            rows: count,
        })
        .collect();

    (UnifiedDataset { rows }, substitutions)
}

fn default_value(default: ColumnDefault, fallback_timestamp: &str) -> &str {
    match default {
        ColumnDefault::Fixed(value) => value,
        ColumnDefault::SubmissionTime => fallback_timestamp,
    }
}

pub struct Reconciler {
    store: Arc<dyn ObjectStore>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(store: Arc<dyn ObjectStore>, config: ReconcilerConfig) -> Self {
        Self { store, config }
    }

    /// Location of the unified dataset produced for `run`.
    pub fn dataset_location(&self, run: &RunIdentity) -> ObjectUri {
        ObjectUri::new(
            self.config.bucket.clone(),
            format!("{}{}_{}.csv", self.config.combined_prefix, run.model_name, run.stamp()),
        )
    }

    /// Merge both sources and store the result. Returns once the unified
    /// dataset is durable.
    pub async fn reconcile(
        &self,
        real: &ObjectUri,
        synthetic: &ObjectUri,
        run: &RunIdentity,
    ) -> PipelineResult<ReconcileReport> {
        tracing::info!(real = %real, synthetic = %synthetic, "Preparing combined training data");

        let tabular = self.read_real(real).await?;
        tracing::info!(rows = tabular.row_count(), "Read real data");

        let records = self.read_synthetic(synthetic).await?;
        tracing::info!(records = records.len(), "Read synthetic data");

        let fallback_timestamp = format_instant(&run.submitted_at);
        let (dataset, substitutions) = unify(&tabular, &records, &fallback_timestamp);

        for sub in &substitutions {
            let routine = REAL_COLUMNS.iter().any(|r| r.source == sub.column && r.routine);
            if routine {
                tracing::info!(column = %sub.column, default = %sub.default, rows = sub.rows, "Column absent in real data, using default");
            } else {
                tracing::warn!(column = %sub.column, default = %sub.default, rows = sub.rows, "Column unresolved in real data, substituted default");
            }
        }

        let body = dataset.to_csv().into_bytes();
        let sha256 = format!("{:x}", Sha256::digest(&body));
        let location = self.dataset_location(run);

        self.store
            .put(&location, body, UNIFIED_CONTENT_TYPE)
            .await
            .map_err(|e| PipelineError::external("object-store", e))?;

        tracing::info!(dataset = %location, rows = dataset.rows.len(), sha256 = %sha256, "Combined training data stored");

        Ok(ReconcileReport {
            dataset: location,
            real_rows: tabular.row_count(),
            synthetic_rows: records.len(),
            substitutions,
            sha256,
        })
    }

    async fn read_real(&self, prefix: &ObjectUri) -> PipelineResult<TabularSource> {
        let objects = self
            .store
            .list(prefix)
            .await
            .map_err(|e| PipelineError::external("object-store", e))?;

        let object = objects
            .into_iter()
            .find(|o| o.has_extension("csv"))
            .ok_or_else(|| PipelineError::DataSource(format!("no CSV file found under {}", prefix)))?;

        let text = self.read_text(&object).await?;
        TabularSource::parse(&text)
    }

    async fn read_synthetic(&self, prefix: &ObjectUri) -> PipelineResult<Vec<SyntheticRecord>> {
        let objects = self
            .store
            .list(prefix)
            .await
            .map_err(|e| PipelineError::external("object-store", e))?;

        let mut records = Vec::new();
        for object in objects.into_iter().filter(|o| o.has_extension("json")) {
            let text = self.read_text(&object).await?;
            let batch: Vec<SyntheticRecord> = serde_json::from_str(&text).map_err(|e| {
                PipelineError::DataSource(format!("malformed synthetic dataset {}: {}", object, e))
            })?;
            records.extend(batch);
        }

        let unrepaired = records
            .iter()
            .filter(|r| r.label == FraudLabel::Fraud && !(r.amount > 0.0))
            .count();
        if unrepaired > 0 {
            tracing::warn!(records = unrepaired, "Synthetic FRAUD records with non-positive amount");
        }

        Ok(records)
    }

    async fn read_text(&self, object: &ObjectUri) -> PipelineResult<String> {
        let bytes = self.store.get(object).await.map_err(|e| match e {
            ServiceError::NotFound(what) => PipelineError::DataSource(format!("object vanished: {}", what)),
            other => PipelineError::external("object-store", other),
        })?;
        String::from_utf8(bytes)
            .map_err(|_| PipelineError::DataSource(format!("{} is not valid UTF-8", object)))
    }
}

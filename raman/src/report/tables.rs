//! Aggregate tables of the detailed report: per-cluster summary,
//! cross-tabulations and cluster × physical-type pivots.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ReportError;
use crate::math::mean;
use crate::scoring::{Metric, MetricColumns};
use crate::table::{ParticleRecord, ParticleTable};

/// One row of `cluster_detailed_analysis.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummaryRow {
    #[serde(rename = "Cluster_Combined")]
    pub cluster: usize,
    #[serde(rename = "Count")]
    pub count: usize,
    #[serde(rename = "Size_Mean")]
    pub size_mean: f64,
    #[serde(rename = "Shape_Mean")]
    pub shape_mean: f64,
    #[serde(rename = "Intensity_Mean")]
    pub intensity_mean: f64,
    #[serde(rename = "Circularity_Mean")]
    pub circularity_mean: f64,
    #[serde(rename = "Solidity_Mean")]
    pub solidity_mean: f64,
    #[serde(rename = "AspectRatio_Mean")]
    pub aspect_ratio_mean: f64,
}

fn by_cluster(table: &ParticleTable) -> BTreeMap<usize, Vec<&ParticleRecord>> {
    let mut groups: BTreeMap<usize, Vec<&ParticleRecord>> = BTreeMap::new();
    for record in &table.records {
        if let Some(cluster) = record.cluster_combined {
            groups.entry(cluster).or_default().push(record);
        }
    }
    groups
}

fn metric_mean(metric: Metric, records: &[&ParticleRecord]) -> f64 {
    let values: Vec<f64> = records
        .iter()
        .map(|r| metric.value(r).unwrap_or(0.0))
        .collect();
    mean(&values)
}

/// Per-cluster means, with the size/shape/intensity roles resolved once for
/// the whole table.
pub fn cluster_summary(table: &ParticleTable) -> Vec<ClusterSummaryRow> {
    let columns = table.metric_columns();
    by_cluster(table)
        .into_iter()
        .map(|(cluster, records)| ClusterSummaryRow {
            cluster,
            count: records.len(),
            size_mean: metric_mean(columns.size, &records),
            shape_mean: metric_mean(columns.shape, &records),
            intensity_mean: metric_mean(columns.intensity, &records),
            circularity_mean: metric_mean(Metric::Circularity, &records),
            solidity_mean: metric_mean(Metric::Solidity, &records),
            aspect_ratio_mean: metric_mean(Metric::AspectRatio, &records),
        })
        .collect()
}

/// A cluster-indexed table with named columns, written as CSV with the
/// row key in the first column.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossTable {
    pub index_name: String,
    pub rows: Vec<usize>,
    pub columns: Vec<String>,
    /// `cells[row][column]`.
    pub cells: Vec<Vec<f64>>,
}

impl CrossTable {
    pub fn get(&self, row: usize, column: &str) -> Option<f64> {
        let r = self.rows.iter().position(|&v| v == row)?;
        let c = self.columns.iter().position(|v| v == column)?;
        Some(self.cells[r][c])
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), ReportError> {
        let csv_error = |source| ReportError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;

        let mut header = vec![self.index_name.clone()];
        header.extend(self.columns.iter().cloned());
        writer.write_record(&header).map_err(csv_error)?;

        for (row, cells) in self.rows.iter().zip(&self.cells) {
            let mut record = vec![row.to_string()];
            record.extend(cells.iter().map(f64::to_string));
            writer.write_record(&record).map_err(csv_error)?;
        }
        writer.flush().map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Aggregation of the records falling into one (cluster, category) cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Mean(Metric),
}

/// Groups labeled records by cluster and by `category`, aggregating each
/// cell. Columns are the categories present in category order; empty cells
/// are 0.
pub fn cross_table<K: Ord + Clone + ToString>(
    table: &ParticleTable,
    category: impl Fn(&ParticleRecord) -> Option<K>,
    aggregate: Aggregate,
) -> CrossTable {
    let mut cells: BTreeMap<usize, BTreeMap<K, Vec<&ParticleRecord>>> = BTreeMap::new();
    let mut keys: BTreeSet<K> = BTreeSet::new();
    for record in &table.records {
        let (Some(cluster), Some(key)) = (record.cluster_combined, category(record)) else {
            continue;
        };
        keys.insert(key.clone());
        cells
            .entry(cluster)
            .or_default()
            .entry(key)
            .or_default()
            .push(record);
    }

    let values = cells
        .values()
        .map(|groups| {
            keys.iter()
                .map(|key| match groups.get(key) {
                    None => 0.0,
                    Some(records) => match aggregate {
                        Aggregate::Count => records.len() as f64,
                        Aggregate::Mean(metric) => metric_mean(metric, records),
                    },
                })
                .collect()
        })
        .collect();

    CrossTable {
        index_name: "Cluster_Combined".to_string(),
        rows: cells.keys().copied().collect(),
        columns: keys.iter().map(ToString::to_string).collect(),
        cells: values,
    }
}

pub fn crosstab_bands(table: &ParticleTable) -> CrossTable {
    cross_table(table, |r| Some(r.band), Aggregate::Count)
}

pub fn crosstab_types(table: &ParticleTable) -> CrossTable {
    cross_table(table, |r| r.particle_type, Aggregate::Count)
}

/// The four cluster × physical-type pivots, keyed by their file suffix.
pub fn type_pivots(table: &ParticleTable) -> Vec<(&'static str, CrossTable)> {
    let MetricColumns {
        size,
        shape,
        intensity,
    } = table.metric_columns();
    [
        ("size", Aggregate::Mean(size)),
        ("shape", Aggregate::Mean(shape)),
        ("intensity", Aggregate::Mean(intensity)),
        ("count", Aggregate::Count),
    ]
    .into_iter()
    .map(|(name, aggregate)| (name, cross_table(table, |r| r.particle_type, aggregate)))
    .collect()
}

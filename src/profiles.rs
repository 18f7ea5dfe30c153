//! Aggregation of per-run JSON profile dumps into metric tables.

//! Each dump is a flat JSON object whose keys embed a `:`-delimited
//! metric name after a `/`-delimited component path, e.g.
//! `/pressio/roibin/binning:time:compress`. Two metrics are collected
//! per file, keyed by the derived component path; the per-file
//! mappings stack into one table per metric for summarization.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use itertools::Itertools;
use kstring::KString;
use serde_json::Value;
use walkdir::WalkDir;

use crate::info;
use crate::stats::{Summary, SummaryDelta};

/// Metric-key suffix for the timing metric.
pub const TIME_SUFFIX: &str = "time:compress";
/// Metric-key suffix for the ratio metric.
pub const RATIO_SUFFIX: &str = "size:compression_ratio";

/// A file name pattern with a single `*` wildcard, as encoded by the
/// job submission scripts (e.g. `roibin.cxi-roibin_sz.json-*.json`,
/// where the fixed parts carry the dataset name and config tag).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePattern {
    prefix: String,
    suffix: String,
}

impl FilePattern {
    pub fn new(pattern: &str) -> Result<Self> {
        match pattern.split('*').collect::<Vec<_>>()[..] {
            [prefix, suffix] => Ok(Self {
                prefix: prefix.into(),
                suffix: suffix.into(),
            }),
            _ => bail!("expecting exactly one `*` in file name pattern: {pattern:?}"),
        }
    }

    pub fn matches(&self, file_name: &str) -> bool {
        file_name.len() >= self.prefix.len() + self.suffix.len()
            && file_name.starts_with(&self.prefix)
            && file_name.ends_with(&self.suffix)
    }
}

/// Derive the pipeline-component path from a metric key: the part
/// before the first `:`, with the trailing two `/` segments dropped
/// and (optionally) any segment equal to `strip_token` removed.
/// `"a/b/c/d:time:compress"` becomes `"a/b"`.
pub fn component_path(key: &str, strip_token: Option<&str>) -> KString {
    let path = key.split(':').next().expect("split yields at least one part");
    let segments: Vec<&str> = path.split('/').collect();
    let keep = segments.len().saturating_sub(2);
    segments[..keep]
        .iter()
        .filter(|segment| Some(**segment) != strip_token)
        .join("/")
        .into()
}

/// The two metric mappings extracted from one profile dump.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProfileMetrics {
    pub compression_times: BTreeMap<KString, f64>,
    pub compression_ratios: BTreeMap<KString, f64>,
}

/// A metric value is either a bare number or nested one level under
/// a `value` field.
fn metric_value(key: &str, value: &Value) -> Result<f64> {
    let number = match value {
        Value::Object(map) => map
            .get("value")
            .ok_or_else(|| anyhow!("metric {key:?} has no `value` field"))?,
        other => other,
    };
    number
        .as_f64()
        .ok_or_else(|| anyhow!("metric {key:?} is not numeric: {number}"))
}

pub fn profile_metrics(
    profile: &serde_json::Map<String, Value>,
    strip_token: Option<&str>,
) -> Result<ProfileMetrics> {
    let mut metrics = ProfileMetrics::default();
    for (key, value) in profile {
        let collection = if key.ends_with(TIME_SUFFIX) {
            &mut metrics.compression_times
        } else if key.ends_with(RATIO_SUFFIX) {
            &mut metrics.compression_ratios
        } else {
            continue;
        };
        collection.insert(component_path(key, strip_token), metric_value(key, value)?);
    }
    Ok(metrics)
}

pub fn load_profile(path: &Path, strip_token: Option<&str>) -> Result<ProfileMetrics> {
    let s = std::fs::read_to_string(path)
        .with_context(|| anyhow!("reading profile dump {path:?}"))?;
    let profile: serde_json::Map<String, Value> =
        serde_json::from_str(&s).with_context(|| anyhow!("decoding JSON object from {path:?}"))?;
    profile_metrics(&profile, strip_token)
        .with_context(|| anyhow!("extracting metrics from {path:?}"))
}

/// Rows are files, columns are component paths; a cell is missing
/// where a file did not report the metric for that component.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MetricTable {
    rows: Vec<BTreeMap<KString, f64>>,
}

impl MetricTable {
    pub fn push_row(&mut self, row: BTreeMap<KString, f64>) {
        self.rows.push(row);
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Union of the component paths over all rows, sorted.
    pub fn columns(&self) -> Vec<&KString> {
        self.rows
            .iter()
            .flat_map(|row| row.keys())
            .sorted()
            .dedup()
            .collect()
    }

    pub fn column_values(&self, column: &str) -> Vec<f64> {
        self.rows
            .iter()
            .filter_map(|row| row.get(column).copied())
            .collect()
    }

    /// Per-column summaries, ordered by column label.
    pub fn describe(&self) -> Vec<(KString, Summary)> {
        self.columns()
            .into_iter()
            .map(|column| {
                let summary = Summary::from_values(self.column_values(column))
                    .expect("column exists because some row has a value for it");
                (column.clone(), summary)
            })
            .collect()
    }
}

/// The timing table and the ratio table stacked from one run set.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProfileTables {
    pub compression_times: MetricTable,
    pub compression_ratios: MetricTable,
}

/// Load every profile dump in `dir` whose file name matches `pattern`
/// (not recursing into subdirectories), in file name order so that
/// re-runs see the same row order.
pub fn load_profile_tables(
    dir: &Path,
    pattern: &FilePattern,
    strip_token: Option<&str>,
) -> Result<ProfileTables> {
    let mut tables = ProfileTables::default();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| anyhow!("listing directory {dir:?}"))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if !pattern.matches(&entry.file_name().to_string_lossy()) {
            continue;
        }
        info!("reading profile dump {:?}", entry.path());
        let ProfileMetrics {
            compression_times,
            compression_ratios,
        } = load_profile(entry.path(), strip_token)?;
        tables.compression_times.push_row(compression_times);
        tables.compression_ratios.push_row(compression_ratios);
    }
    Ok(tables)
}

/// Align two run sets' summaries on column label (columns present in
/// only one set are dropped) and subtract statistic by statistic,
/// `a` minus `b`.
pub fn describe_delta(
    a: &[(KString, Summary)],
    b: &[(KString, Summary)],
) -> Vec<(KString, SummaryDelta)> {
    let b: BTreeMap<&KString, &Summary> = b.iter().map(|(column, summary)| (column, summary)).collect();
    a.iter()
        .filter_map(|(column, summary)| {
            let other = b.get(column)?;
            Some((column.clone(), summary.delta(other)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use serde_json::json;

    use super::*;

    #[test]
    fn t_component_path() {
        // Exactly the last two segments are dropped.
        assert_eq!(component_path("a/b/c/d:time:compress", None), "a/b");
        // Typical libpressio-style key with a leading slash.
        assert_eq!(
            component_path("/pressio/roibin/background/binning:time:compress", None),
            "/pressio/roibin"
        );
        assert_eq!(
            component_path("/pressio/roibin/background/binning:time:compress", Some("pressio")),
            "/roibin"
        );
        // Too few segments leave nothing.
        assert_eq!(component_path("a/b:time:compress", None), "");
    }

    #[test]
    fn t_file_pattern() -> Result<()> {
        let pattern = FilePattern::new("roibin.cxi-roibin_sz.json-*.json")?;
        assert!(pattern.matches("roibin.cxi-roibin_sz.json-0.json"));
        assert!(pattern.matches("roibin.cxi-roibin_sz.json-17.json"));
        assert!(!pattern.matches("roibin.cxi-roibin_sz.json-0.csv"));
        assert!(!pattern.matches("other.cxi-roibin_sz.json-0.json"));

        assert!(FilePattern::new("no-wildcard.json").is_err());
        assert!(FilePattern::new("two-*-wildcards-*.json").is_err());

        // Overlapping prefix and suffix must not double-count.
        let pattern = FilePattern::new("a*a")?;
        assert!(!pattern.matches("a"));
        assert!(pattern.matches("aba"));
        Ok(())
    }

    #[test]
    fn t_profile_metrics() -> Result<()> {
        let profile = json!({
            "/pressio/roibin/bg/bin:time:compress": 12.5,
            "/pressio/roibin/bg/sz:time:compress": {"value": 7.25},
            "/pressio/roibin/bg/sz:size:compression_ratio": {"value": 31.0},
            "/pressio/roibin/bg/sz:time:decompress": 99.0,
            "noise": "ignored"
        });
        let profile = match profile {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let metrics = profile_metrics(&profile, None)?;
        assert_eq!(
            metrics.compression_times.get("/pressio/roibin").copied(),
            // last-write-wins within one component: both keys derive
            // the same path, sz sorts after bin
            Some(7.25)
        );
        assert_eq!(
            metrics.compression_ratios.get("/pressio/roibin").copied(),
            Some(31.0)
        );
        Ok(())
    }

    #[test]
    fn t_metric_value_shapes() {
        assert_eq!(metric_value("k", &json!(1.5)).unwrap(), 1.5);
        assert_eq!(metric_value("k", &json!({"value": 2})).unwrap(), 2.0);
        assert!(metric_value("k", &json!({"other": 2})).is_err());
        assert!(metric_value("k", &json!("nope")).is_err());
    }

    #[test]
    fn t_metric_table_stacking() {
        let mut table = MetricTable::default();
        table.push_row([("a".into(), 1.0), ("b".into(), 10.0)].into_iter().collect());
        table.push_row([("a".into(), 3.0)].into_iter().collect());
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.columns(), [&KString::from_ref("a"), &KString::from_ref("b")]);
        assert_eq!(table.column_values("a"), [1.0, 3.0]);
        // missing cells are simply absent, not zero
        assert_eq!(table.column_values("b"), [10.0]);

        let described = table.describe();
        assert_eq!(described.len(), 2);
        assert_eq!(described[0].1.mean, 2.0);
        assert_eq!(described[1].1.count, 1);
    }
}

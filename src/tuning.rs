//! Tuned-vs-untuned comparison of compressor configurations, from the
//! same job logs as `run_record` but keyed by config file name.

use std::io::BufRead;
use std::path::Path;

use anyhow::{Context, Result};
use itertools::{EitherOrBoth, Itertools};
use kstring::KString;
use lazy_static::lazy_static;
use regex::Regex;

use crate::warn;

lazy_static! {
    static ref CONFIG_LINE: Regex = Regex::new(r"config=(\S+)").expect("static regex");
    static ref CHUNK_LINE: Regex = Regex::new(r"chunk_size=(\d+)").expect("static regex");
    static ref COMP_BW_LINE: Regex =
        Regex::new(r"^compress_bandwidth_GBps=(\d+(?:\.\d+)?)").expect("static regex");
}

/// The tuning-state prefix in config file names: `untune-foo.json` is
/// the untuned twin of `foo.json`.
pub const UNTUNE_PREFIX: &str = "untune-";

/// A config file path reduced to the comparison key: the file stem,
/// with the `untune-` prefix split off into a flag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ConfigName {
    pub base_name: KString,
    pub untuned: bool,
}

impl ConfigName {
    pub fn from_config_path(path: &str) -> Self {
        let stem = Path::new(path)
            .file_stem()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default();
        match stem.strip_prefix(UNTUNE_PREFIX) {
            Some(base) => ConfigName {
                base_name: KString::from_ref(base),
                untuned: true,
            },
            None => ConfigName {
                base_name: KString::from_ref(stem.as_ref()),
                untuned: false,
            },
        }
    }
}

/// One completed trial: records are delimited solely by the bandwidth
/// line, there is no explicit start marker in this log family.
#[derive(Debug, Clone, PartialEq)]
#[allow(non_snake_case)]
pub struct TuningRecord {
    pub config_name: ConfigName,
    pub chunk_size: u64,
    pub compress_bandwidth_GBps: f64,
}

#[derive(Debug, Default)]
struct OpenRecord {
    config_name: Option<ConfigName>,
    chunk_size: Option<u64>,
}

/// Scan the log for `config=`/`chunk_size=` markers (anywhere in a
/// line) and bandwidth markers (line start); each bandwidth line
/// closes a record. Records closing without a config name and chunk
/// size are skipped with a warning; they cannot be paired anyway.
pub fn parse_tuning_log(input: impl BufRead) -> Result<Vec<TuningRecord>> {
    let mut records = Vec::new();
    let mut open = OpenRecord::default();
    for line in input.lines() {
        let line = line.context("reading input lines")?;
        if let Some(m) = CONFIG_LINE.captures(&line) {
            open.config_name = Some(ConfigName::from_config_path(&m[1]));
        }
        if let Some(m) = CHUNK_LINE.captures(&line) {
            open.chunk_size = Some(
                m[1].parse()
                    .with_context(|| format!("chunk_size out of range in line {line:?}"))?,
            );
        }
        if let Some(m) = COMP_BW_LINE.captures(&line) {
            let compress_bandwidth_GBps: f64 = m[1].parse().expect("digits always parse");
            match (open.config_name.take(), open.chunk_size.take()) {
                (Some(config_name), Some(chunk_size)) => records.push(TuningRecord {
                    config_name,
                    chunk_size,
                    compress_bandwidth_GBps,
                }),
                (config_name, chunk_size) => {
                    warn!(
                        "record closed by {line:?} without \
                         config name ({config_name:?}) or chunk size ({chunk_size:?}), skipping"
                    );
                }
            }
            open = OpenRecord::default();
        }
    }
    Ok(records)
}

/// One tuned run paired with its untuned twin.
#[derive(Debug, Clone, PartialEq)]
#[allow(non_snake_case)]
pub struct SpeedupRow {
    pub config_name: KString,
    pub chunk_size: u64,
    pub compress_bandwidth_GBps_tuned: f64,
    pub compress_bandwidth_GBps_untuned: f64,
}

impl SpeedupRow {
    pub fn speedup(&self) -> f64 {
        self.compress_bandwidth_GBps_tuned / self.compress_bandwidth_GBps_untuned
    }

    pub fn speedup_percent(&self) -> f64 {
        (self.speedup() - 1.0) * 100.0
    }
}

fn key_of<'r>(record: &'r TuningRecord) -> (&'r KString, u64) {
    (&record.config_name.base_name, record.chunk_size)
}

/// Inner join of the tuned rows against the untuned rows on equal
/// (base name, chunk size). Keys present on only one side are
/// silently dropped, like in `join`-style comparisons elsewhere;
/// duplicate keys pair up positionally in sort order.
pub fn pair_tuned_untuned(records: &[TuningRecord]) -> Vec<SpeedupRow> {
    let (mut untuned, mut tuned): (Vec<&TuningRecord>, Vec<&TuningRecord>) =
        records.iter().partition(|r| r.config_name.untuned);
    tuned.sort_by(|a, b| key_of(a).cmp(&key_of(b)));
    untuned.sort_by(|a, b| key_of(a).cmp(&key_of(b)));

    tuned
        .into_iter()
        .merge_join_by(untuned, |a, b| key_of(a).cmp(&key_of(b)))
        .filter_map(|eob| match eob {
            EitherOrBoth::Both(tuned, untuned) => Some(SpeedupRow {
                config_name: tuned.config_name.base_name.clone(),
                chunk_size: tuned.chunk_size,
                compress_bandwidth_GBps_tuned: tuned.compress_bandwidth_GBps,
                compress_bandwidth_GBps_untuned: untuned.compress_bandwidth_GBps,
            }),
            EitherOrBoth::Left(_) => None,
            EitherOrBoth::Right(_) => None,
        })
        .collect()
}

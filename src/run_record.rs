//! Parsing of batch job logs into one row per compression trial.

use std::io::{BufRead, Write};

use anyhow::{bail, Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

/// One compression trial, accumulated from the marker lines seen
/// between two start markers. The field order here is the CSV column
/// order; fields never observed before the record closes serialize as
/// empty cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[allow(non_snake_case)]
pub struct RunRecord {
    pub chunk_size: u64,
    pub replica: String,
    pub config: String,
    pub filename: String,
    pub global_cr: Option<f64>,
    pub wallclock_ms: Option<f64>,
    pub compress_ms: Option<f64>,
    pub wallclock_bandwidth_GBps: Option<f64>,
    pub compress_bandwidth_GBps: Option<f64>,
    pub decompress_bandwidth_GBps: Option<f64>,
}

const FLOAT_PATTERN: &str = r"(\d+(?:\.\d+)?)";

/// Lines starting with one of these terminate the stream; anything
/// after them is ignored.
pub const STREAM_END_PREFIXES: [&str; 2] = ["fullscale===", "smallscale==="];

fn field_marker(key: &str) -> Regex {
    Regex::new(&format!("^{key}={FLOAT_PATTERN}")).expect("static regex")
}

type FieldSetter = fn(&mut RunRecord, f64);

lazy_static! {
    static ref NEW_CONFIG: Regex =
        Regex::new(r"^chunk_size=(\d+) replica=(\d+) config=(\S+) filename=(\S+)")
            .expect("static regex");

    /// The recognized field markers, as an ordered (pattern, setter)
    /// table. The patterns are mutually exclusive, so the order only
    /// matters for readability.
    static ref FIELD_MARKERS: [(Regex, FieldSetter); 6] = [
        (field_marker("global_cr"), |r, v| r.global_cr = Some(v)),
        (field_marker("wallclock_ms"), |r, v| r.wallclock_ms = Some(v)),
        (field_marker("compress_ms"), |r, v| r.compress_ms = Some(v)),
        (field_marker("wallclock_bandwidth_GBps"), |r, v| {
            r.wallclock_bandwidth_GBps = Some(v)
        }),
        (field_marker("compress_bandwidth_GBps"), |r, v| {
            r.compress_bandwidth_GBps = Some(v)
        }),
        (field_marker("decompress_bandwidth_GBps"), |r, v| {
            r.decompress_bandwidth_GBps = Some(v)
        }),
    ];
}

/// What feeding one line did to the parser state.
#[derive(Debug, PartialEq)]
pub enum LineEvent {
    /// Nothing to emit for this line (it may have updated the open
    /// record, or matched nothing at all)
    Ignored,
    /// A start marker closed the previously open record
    Closed(RunRecord),
    /// A stream terminator; stop feeding lines and call `finish`
    EndOfStream,
}

/// Holds the single open record; a fold over the input lines. At most
/// one record is open at any time, and records are emitted exactly
/// once, on the event that closes them.
#[derive(Debug, Default)]
pub struct RunLogParser {
    current: Option<RunRecord>,
}

impl RunLogParser {
    pub fn feed(&mut self, line: &str) -> Result<LineEvent> {
        if let Some(m) = NEW_CONFIG.captures(line) {
            let closed = self.current.take();
            self.current = Some(RunRecord {
                chunk_size: m[1]
                    .parse()
                    .with_context(|| format!("chunk_size out of range in line {line:?}"))?,
                replica: m[2].into(),
                config: m[3].into(),
                filename: m[4].into(),
                global_cr: None,
                wallclock_ms: None,
                compress_ms: None,
                wallclock_bandwidth_GBps: None,
                compress_bandwidth_GBps: None,
                // Explicitly absent: many runs have no decompression
                // phase at all.
                decompress_bandwidth_GBps: None,
            });
            return Ok(match closed {
                Some(record) => LineEvent::Closed(record),
                None => LineEvent::Ignored,
            });
        }

        for (pattern, set) in FIELD_MARKERS.iter() {
            if let Some(m) = pattern.captures(line) {
                let value: f64 = m[1].parse().expect("digits always parse");
                match &mut self.current {
                    Some(record) => set(record, value),
                    None => bail!("field marker before the first start marker: {line:?}"),
                }
                return Ok(LineEvent::Ignored);
            }
        }

        if STREAM_END_PREFIXES.iter().any(|p| line.starts_with(p)) {
            return Ok(LineEvent::EndOfStream);
        }

        Ok(LineEvent::Ignored)
    }

    /// The record still open at end of input, if any.
    pub fn finish(self) -> Option<RunRecord> {
        self.current
    }
}

/// Read `input` line by line and write the CSV table to `out`; returns
/// the number of data rows written. The header row is derived from the
/// `RunRecord` field order and written before the first record
/// regardless of which event closes it, so a single-record stream
/// still yields a well-formed table.
pub fn parse_run_log(input: impl BufRead, out: impl Write) -> Result<usize> {
    let mut writer = csv::Writer::from_writer(out);
    let mut parser = RunLogParser::default();
    let mut rows = 0;
    for line in input.lines() {
        let line = line.context("reading input lines")?;
        match parser.feed(&line)? {
            LineEvent::Ignored => {}
            LineEvent::Closed(record) => {
                writer.serialize(&record)?;
                rows += 1;
            }
            LineEvent::EndOfStream => break,
        }
    }
    if let Some(record) = parser.finish() {
        writer.serialize(&record)?;
        rows += 1;
    }
    writer.flush()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;

    const HEADER: &str = "chunk_size,replica,config,filename,global_cr,wallclock_ms,\
                          compress_ms,wallclock_bandwidth_GBps,compress_bandwidth_GBps,\
                          decompress_bandwidth_GBps";

    fn parse_to_string(input: &str) -> Result<String> {
        let mut out = Vec::new();
        parse_run_log(input.as_bytes(), &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn t_two_records() -> Result<()> {
        let input = "\
chunk_size=16 replica=1 config=sz.json filename=a.cxi
global_cr=10.5
compress_bandwidth_GBps=2.5
some unrelated chatter
chunk_size=32 replica=2 config=zfp.json filename=b.cxi
wallclock_ms=100.25
";
        let out = parse_to_string(input)?;
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "16,1,sz.json,a.cxi,10.5,,,,2.5,");
        assert_eq!(lines[2], "32,2,zfp.json,b.cxi,,100.25,,,,");
        Ok(())
    }

    // A single-record stream gets a header too: the writer is set up
    // by the first emission, not by the second start marker.
    #[test]
    fn t_single_record_gets_header() -> Result<()> {
        let input = "\
chunk_size=8 replica=0 config=sz.json filename=c.cxi
decompress_bandwidth_GBps=1.25
";
        let out = parse_to_string(input)?;
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "8,0,sz.json,c.cxi,,,,,,1.25");
        Ok(())
    }

    #[test]
    fn t_stream_end_marker_stops_processing() -> Result<()> {
        for terminator in STREAM_END_PREFIXES {
            let input = format!(
                "chunk_size=16 replica=1 config=sz.json filename=a.cxi\n\
                 compress_ms=5\n\
                 {terminator} the rest is another phase\n\
                 chunk_size=32 replica=2 config=zfp.json filename=b.cxi\n"
            );
            let out = parse_to_string(&input)?;
            let lines: Vec<&str> = out.lines().collect();
            assert_eq!(lines.len(), 2, "{terminator}");
            assert_eq!(lines[1], "16,1,sz.json,a.cxi,,,5.0,,,");
        }
        Ok(())
    }

    #[test]
    fn t_last_write_wins() -> Result<()> {
        let mut parser = RunLogParser::default();
        parser.feed("chunk_size=16 replica=1 config=sz.json filename=a.cxi")?;
        parser.feed("global_cr=10.5")?;
        parser.feed("global_cr=11.5")?;
        let record = parser.finish().expect("record open");
        assert_eq!(record.global_cr, Some(11.5));
        Ok(())
    }

    #[test]
    fn t_field_marker_needs_open_record() {
        let mut parser = RunLogParser::default();
        assert!(parser.feed("global_cr=10.5").is_err());
    }

    // Field markers must match from line start; prefixed mentions are
    // not markers.
    #[test]
    fn t_markers_anchored() -> Result<()> {
        let mut parser = RunLogParser::default();
        parser.feed("chunk_size=16 replica=1 config=sz.json filename=a.cxi")?;
        parser.feed("note: global_cr=99.9 was last run's value")?;
        let record = parser.finish().expect("record open");
        assert_eq!(record.global_cr, None);
        Ok(())
    }

    #[test]
    fn t_idempotent() -> Result<()> {
        let input = "\
chunk_size=16 replica=1 config=sz.json filename=a.cxi
wallclock_bandwidth_GBps=3.5
chunk_size=16 replica=2 config=sz.json filename=a.cxi
wallclock_bandwidth_GBps=3.25
";
        assert_eq!(parse_to_string(input)?, parse_to_string(input)?);
        Ok(())
    }
}

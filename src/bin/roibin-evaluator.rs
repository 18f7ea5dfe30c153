use std::fs::File;
use std::io::{stdin, stdout, BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use roibin_evaluator::get_terminal_width::get_terminal_width;
use roibin_evaluator::info;
use roibin_evaluator::mem_estimate::{estimate_bytes, to_human_size};
use roibin_evaluator::output_table::{OutputTable, TableMode};
use roibin_evaluator::profiles::{
    describe_delta, load_profile_tables, FilePattern, MetricTable, ProfileTables,
};
use roibin_evaluator::run_record::parse_run_log;
use roibin_evaluator::stats::SummaryDelta;
use roibin_evaluator::tuning::{pair_tuned_untuned, parse_tuning_log};
use roibin_evaluator::utillib::logging::{set_log_level, LogLevelOpt};

const PROGRAM_NAME: &str = "roibin-evaluator";
const PROGRAM_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(clap::Parser, Debug)]
#[clap(next_line_help = true)]
#[clap(set_term_width = get_terminal_width())]
/// Evaluation tools for the ROI/binning compression benchmarking
/// study: log parsing, tuned-vs-untuned comparison, profile-dump
/// aggregation, and batch-job memory estimation.
struct Opts {
    #[clap(flatten)]
    log_level: LogLevelOpt,

    /// The subcommand to run. Use `--help` after the sub-command to
    /// get a list of the allowed options there.
    #[clap(subcommand)]
    subcommand: SubCommand,
}

#[derive(clap::Args, Debug)]
struct ProfileOpts {
    /// Directory holding the profile dumps (default: the `TMPDIR`
    /// environment variable, falling back to /tmp)
    #[clap(long)]
    input_directory: Option<PathBuf>,

    /// Drop path segments equal to this token when deriving component
    /// paths
    #[clap(long)]
    strip_token: Option<String>,
}

impl ProfileOpts {
    fn input_directory(&self) -> PathBuf {
        self.input_directory.clone().unwrap_or_else(|| {
            std::env::var_os("TMPDIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| "/tmp".into())
        })
    }
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Print version
    Version,

    /// Parse a batch job log into a CSV table with one row per
    /// compression trial
    ParseLog {
        /// Input log file (default: standard input)
        #[clap(long, short)]
        input_file: Option<PathBuf>,

        /// Output CSV file (default: standard output)
        #[clap(long, short)]
        output_file: Option<PathBuf>,
    },

    /// Pair tuned runs against their untuned twins on config name and
    /// chunk size and print the compression-bandwidth speedups
    TuningSpeedup {
        /// Only keep rows with a speedup strictly above this value
        #[clap(long, default_value = "1.0")]
        min_speedup: f64,

        /// Only keep rows with this chunk size
        #[clap(long)]
        chunk_size: Option<u64>,

        /// Emit a LaTeX `tabular` instead of plain text
        #[clap(long)]
        latex: bool,

        /// Input log file (default: standard input)
        input_file: Option<PathBuf>,
    },

    /// Summarize the compression-time and compression-ratio metrics
    /// of the profile dumps matching a file name pattern
    ProfileSummary {
        #[clap(flatten)]
        profile_opts: ProfileOpts,

        /// File name pattern with a single `*`,
        /// e.g. `roibin.cxi-roibin_sz.json-*.json`
        pattern: String,
    },

    /// Compare the metric summaries of two sets of profile dumps
    /// (first minus second), e.g. untuned against tuned
    ProfileCompare {
        #[clap(flatten)]
        profile_opts: ProfileOpts,

        /// Pattern of the minuend run set
        pattern_a: String,

        /// Pattern of the subtrahend run set
        pattern_b: String,
    },

    /// Estimate the peak memory footprint of a batch job, for
    /// choosing chunk counts that fit a node's RAM
    EstimateMem {
        /// Number of chunks compressed at a time per core
        chunks: u64,

        /// Cores used per node
        #[clap(long, default_value = "1")]
        cores: u64,
    },
}

fn open_input(path: &Option<PathBuf>) -> Result<Box<dyn BufRead>> {
    Ok(match path {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| anyhow!("opening input file {path:?}"))?,
        )),
        None => Box::new(stdin().lock()),
    })
}

fn open_output(path: &Option<PathBuf>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(
            File::create(path).with_context(|| anyhow!("creating output file {path:?}"))?,
        ),
        None => Box::new(stdout().lock()),
    })
}

fn val(v: f64) -> String {
    format!("{v:.4}")
}

fn delta_val(v: f64) -> String {
    format!("{v:+.4}")
}

/// Width of the first (label) column: widest label plus some air.
fn label_width<'s>(labels: impl Iterator<Item = &'s str>, title: &'s str) -> usize {
    labels
        .chain([title])
        .map(|label| label.len())
        .max()
        .expect("chained a fixed element")
        + 2
}

/// One width per column except the last (9 summary titles, 8 widths).
fn summary_widths(component_width: usize) -> Vec<usize> {
    let mut widths = vec![component_width, 6];
    widths.extend([12; 6]);
    widths
}

const SUMMARY_TITLES: [&str; 9] = [
    "component",
    "n",
    "mean",
    "std",
    "min",
    "25%",
    "50%",
    "75%",
    "max",
];

fn print_summaries(name: &str, table: &MetricTable, out: &mut impl Write) -> Result<()> {
    let rows = table.describe();
    writeln!(out, "{name} ({} files)", table.num_rows())?;
    let widths = summary_widths(label_width(
        rows.iter().map(|(component, _)| component.as_str()),
        "component",
    ));
    let output_table = OutputTable::new(&widths, &SUMMARY_TITLES, TableMode::Plain);
    output_table.write_title_row(out)?;
    for (component, s) in &rows {
        output_table.write_data_row(
            &[
                component.to_string(),
                s.count.to_string(),
                val(s.mean),
                val(s.std),
                val(s.min),
                val(s.q25),
                val(s.median),
                val(s.q75),
                val(s.max),
            ],
            out,
        )?;
    }
    writeln!(out)?;
    Ok(())
}

fn print_summary_deltas(
    name: &str,
    deltas: &[(kstring::KString, SummaryDelta)],
    out: &mut impl Write,
) -> Result<()> {
    writeln!(out, "{name}")?;
    let widths = summary_widths(label_width(
        deltas.iter().map(|(component, _)| component.as_str()),
        "component",
    ));
    let output_table = OutputTable::new(&widths, &SUMMARY_TITLES, TableMode::Plain);
    output_table.write_title_row(out)?;
    for (component, d) in deltas {
        output_table.write_data_row(
            &[
                component.to_string(),
                delta_val(d.count),
                delta_val(d.mean),
                delta_val(d.std),
                delta_val(d.min),
                delta_val(d.q25),
                delta_val(d.median),
                delta_val(d.q75),
                delta_val(d.max),
            ],
            out,
        )?;
    }
    writeln!(out)?;
    Ok(())
}

fn load_tables(profile_opts: &ProfileOpts, pattern: &str) -> Result<ProfileTables> {
    let dir = profile_opts.input_directory();
    let pattern = FilePattern::new(pattern)?;
    load_profile_tables(&dir, &pattern, profile_opts.strip_token.as_deref())
}

fn main() -> Result<()> {
    let Opts {
        log_level,
        subcommand,
    } = Opts::parse();
    set_log_level(log_level.into());

    match subcommand {
        SubCommand::Version => println!("{PROGRAM_NAME} version {PROGRAM_VERSION}"),

        SubCommand::ParseLog {
            input_file,
            output_file,
        } => {
            let input = open_input(&input_file)?;
            let output = open_output(&output_file)?;
            let rows = parse_run_log(input, output)?;
            info!("wrote {rows} data rows");
        }

        SubCommand::TuningSpeedup {
            min_speedup,
            chunk_size,
            latex,
            input_file,
        } => {
            let records = parse_tuning_log(open_input(&input_file)?)?;
            info!("parsed {} records", records.len());
            let mut rows = pair_tuned_untuned(&records);
            rows.retain(|row| {
                row.speedup() > min_speedup
                    && chunk_size.map_or(true, |wanted| row.chunk_size == wanted)
            });
            rows.sort_by(|a, b| b.speedup().total_cmp(&a.speedup()));

            let config_width = label_width(
                rows.iter().map(|row| row.config_name.as_str()),
                "config_name",
            );
            let mode = if latex {
                TableMode::Latex
            } else {
                TableMode::Plain
            };
            let table = OutputTable::new(
                &[config_width, 11, 10, 32],
                &[
                    "config_name",
                    "chunk_size",
                    "speedup_%",
                    "compress_bandwidth_GBps_untuned",
                    "compress_bandwidth_GBps_tuned",
                ],
                mode,
            );
            let out = &mut stdout().lock();
            table.write_preamble(out)?;
            table.write_title_row(out)?;
            for row in &rows {
                table.write_data_row(
                    &[
                        row.config_name.to_string(),
                        row.chunk_size.to_string(),
                        format!("{:.1}", row.speedup_percent()),
                        val(row.compress_bandwidth_GBps_untuned),
                        val(row.compress_bandwidth_GBps_tuned),
                    ],
                    out,
                )?;
            }
            table.write_postamble(out)?;
        }

        SubCommand::ProfileSummary {
            profile_opts,
            pattern,
        } => {
            let tables = load_tables(&profile_opts, &pattern)?;
            let out = &mut stdout().lock();
            print_summaries("compression times", &tables.compression_times, out)?;
            print_summaries("compression ratios", &tables.compression_ratios, out)?;
        }

        SubCommand::ProfileCompare {
            profile_opts,
            pattern_a,
            pattern_b,
        } => {
            let a = load_tables(&profile_opts, &pattern_a)?;
            let b = load_tables(&profile_opts, &pattern_b)?;
            let out = &mut stdout().lock();
            print_summary_deltas(
                "compression times (first minus second)",
                &describe_delta(
                    &a.compression_times.describe(),
                    &b.compression_times.describe(),
                ),
                out,
            )?;
            print_summary_deltas(
                "compression ratios (first minus second)",
                &describe_delta(
                    &a.compression_ratios.describe(),
                    &b.compression_ratios.describe(),
                ),
                out,
            )?;
        }

        SubCommand::EstimateMem { chunks, cores } => {
            let bytes = estimate_bytes(chunks, cores);
            println!("{bytes} bytes ({})", to_human_size(bytes));
        }
    }

    Ok(())
}

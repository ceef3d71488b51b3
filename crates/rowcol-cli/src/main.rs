use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rowcol_chart::{render, BoxStats, Chart, Geometry, Style, DEFAULT_BOX_WIDTH, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use rowcol_stats::{StatsOptions, DEFAULT_BUCKETS, DEFAULT_SAMPLE_SIZE};
use rowcol_store::{
    export_csv, export_csv_to_path, import_csv, write_inferred_metadata, Dataset,
    DigestFileVerifier, ExportOptions, ImportOptions, MetadataSource, OpenOptions, METADATA_FILE,
};

mod report;

#[derive(Debug, Parser)]
#[command(name = "rowcol")]
#[command(about = "Convert CSV into a directory-backed column store and describe it without loading it.")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Infer column types from a sample and write the metadata for review.
    Infer(InferArgs),
    /// Import a CSV file into a new store.
    Import(ImportArgs),
    /// Write a store back out as CSV.
    Export(ExportArgs),
    /// Show the columns, types and row count of a store.
    Describe(StoreArg),
    /// Show one row with its column names.
    Row(RowArgs),
    /// Descriptive statistics for one column or all of them.
    Stats(StatsArgs),
    /// Bucketed counts of a numeric column.
    Histogram(HistogramArgs),
    /// Five-number summary of a numeric column.
    Boxplot(BoxplotArgs),
    /// Sampled points of two numeric columns.
    Scatter(ScatterArgs),
    /// Walk the store and check that every column has the same rows.
    Verify(VerifyArgs),
    /// Write a detached SHA-256 digest for the store's metadata.
    Sign(StoreArg),
}

#[derive(Debug, Args)]
struct CsvArgs {
    /// Field delimiter: a single ASCII character, or `tab`.
    #[arg(long, default_value = ",", value_parser = parse_delimiter)]
    delimiter: u8,

    /// The first record holds column names; detected from the first two records when
    /// neither flag is given.
    #[arg(long, conflicts_with = "no_header")]
    header: bool,

    /// The first record is data, not column names.
    #[arg(long)]
    no_header: bool,

    /// Data rows sampled for type inference.
    #[arg(long, default_value_t = 100)]
    sample_rows: usize,
}

impl CsvArgs {
    fn import_options(&self) -> ImportOptions {
        ImportOptions {
            delimiter: self.delimiter,
            has_header: match (self.header, self.no_header) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            },
            sample_rows: self.sample_rows,
            ..ImportOptions::default()
        }
    }
}

#[derive(Debug, Args)]
struct InferArgs {
    csv: PathBuf,

    /// Where to write the metadata; printed to stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,

    #[command(flatten)]
    csv_args: CsvArgs,
}

#[derive(Debug, Args)]
struct ImportArgs {
    csv: PathBuf,
    store: PathBuf,

    /// Column types from this metadata file instead of inference.
    #[arg(long)]
    metadata: Option<PathBuf>,

    /// Rows per group directory.
    #[arg(long)]
    rows_per_group: Option<u64>,

    #[command(flatten)]
    csv_args: CsvArgs,
}

#[derive(Debug, Args)]
struct ExportArgs {
    store: PathBuf,

    /// Output file; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,

    #[arg(long, default_value = ",", value_parser = parse_delimiter)]
    delimiter: u8,

    #[arg(long)]
    no_header: bool,
}

#[derive(Debug, Args)]
struct StoreArg {
    store: PathBuf,
}

#[derive(Debug, Args)]
struct RowArgs {
    store: PathBuf,
    index: u64,
}

#[derive(Debug, Args)]
struct StatsArgs {
    store: PathBuf,
    /// Summarize only this column.
    column: Option<String>,

    /// Print JSON instead of a text report.
    #[arg(long)]
    json: bool,

    /// Save the report to this file instead of printing it.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Frequencies listed per categorical column.
    #[arg(long, default_value_t = 10)]
    top: usize,

    /// Distinct values counted in memory before spilling to disk.
    #[arg(long, default_value_t = 4096)]
    max_distinct: usize,
}

#[derive(Debug, Args)]
struct ChartArgs {
    /// Grid width in characters.
    #[arg(long)]
    width: Option<usize>,

    /// Grid height in characters.
    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    height: usize,

    /// Draw with Unicode block and box-drawing characters.
    #[arg(long)]
    unicode: bool,
}

impl ChartArgs {
    fn geometry(&self, default_width: usize) -> Geometry {
        Geometry::new(self.width.unwrap_or(default_width), self.height)
    }

    fn style(&self) -> Style {
        if self.unicode {
            Style::Unicode
        } else {
            Style::Ascii
        }
    }
}

#[derive(Debug, Args)]
struct HistogramArgs {
    store: PathBuf,
    column: String,

    #[arg(long, default_value_t = DEFAULT_BUCKETS)]
    buckets: usize,

    #[command(flatten)]
    chart: ChartArgs,
}

#[derive(Debug, Args)]
struct BoxplotArgs {
    store: PathBuf,
    column: String,

    #[command(flatten)]
    chart: ChartArgs,
}

#[derive(Debug, Args)]
struct ScatterArgs {
    store: PathBuf,
    x: String,
    y: String,

    /// Points kept by reservoir sampling.
    #[arg(long, default_value_t = DEFAULT_SAMPLE_SIZE)]
    sample: usize,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    #[command(flatten)]
    chart: ChartArgs,
}

#[derive(Debug, Args)]
struct VerifyArgs {
    store: PathBuf,

    /// Also require `_metadata.json.sha256` to match.
    #[arg(long)]
    digest: bool,
}

fn parse_delimiter(s: &str) -> std::result::Result<u8, String> {
    match s {
        "tab" | "\\t" | "\t" => Ok(b'\t'),
        _ if s.len() == 1 && s.is_ascii() => Ok(s.as_bytes()[0]),
        _ => Err(format!("delimiter must be a single ASCII character, got `{s}`")),
    }
}

fn open(store: &Path) -> Result<Dataset> {
    Dataset::open(store).with_context(|| format!("open store {}", store.display()))
}

fn run(cli: Cli, out: &mut dyn Write) -> Result<()> {
    match cli.command {
        Command::Infer(args) => {
            let options = args.csv_args.import_options();
            let (metadata, report) = match &args.out {
                Some(path) => write_inferred_metadata(&args.csv, path, &options)
                    .with_context(|| format!("write metadata to {}", path.display()))?,
                None => {
                    let (metadata, report) = rowcol_store::infer_metadata(&args.csv, &options)
                        .with_context(|| format!("infer types of {}", args.csv.display()))?;
                    out.write_all(metadata.to_json_pretty().as_bytes())?;
                    (metadata, report)
                }
            };
            report::inference_issues(&report);
            if let Some(path) = &args.out {
                writeln!(
                    out,
                    "wrote metadata for {} columns to {}",
                    metadata.columns.len(),
                    path.display()
                )?;
            }
        }
        Command::Import(args) => {
            let mut options = args.csv_args.import_options();
            if let Some(rows_per_group) = args.rows_per_group {
                options.rows_per_group = rows_per_group;
            }
            let source = match args.metadata {
                Some(path) => MetadataSource::File(path),
                None => MetadataSource::Infer,
            };
            let summary = import_csv(&args.csv, &args.store, source, &options)
                .with_context(|| format!("import {}", args.csv.display()))?;
            if let Some(report) = &summary.report {
                report::inference_issues(report);
            }
            writeln!(
                out,
                "imported {} rows x {} columns into {}",
                summary.rows,
                summary.metadata.columns.len(),
                summary.root.display()
            )?;
        }
        Command::Export(args) => {
            let dataset = open(&args.store)?;
            let options = ExportOptions {
                include_header: !args.no_header,
                delimiter: args.delimiter,
            };
            match &args.out {
                Some(path) => {
                    let rows = export_csv_to_path(&dataset, path, &options)
                        .with_context(|| format!("export to {}", path.display()))?;
                    log::info!("exported {rows} rows to {}", path.display());
                }
                None => {
                    export_csv(&dataset, &mut *out, &options).context("export")?;
                }
            }
        }
        Command::Describe(args) => report::describe(out, &open(&args.store)?)?,
        Command::Row(args) => {
            let dataset = open(&args.store)?;
            let row = dataset.row(args.index)?;
            report::row(out, args.index, &row)?;
        }
        Command::Stats(args) => {
            let dataset = open(&args.store)?;
            let options = StatsOptions {
                top_n: args.top,
                max_in_memory_distinct: args.max_distinct,
                ..StatsOptions::default()
            };
            let summaries = match &args.column {
                Some(column) => vec![rowcol_stats::summarize(&dataset, column, &options)?],
                None => rowcol_stats::summarize_all(&dataset, &options)?,
            };
            let mut rendered = Vec::new();
            if args.json {
                serde_json::to_writer_pretty(&mut rendered, &summaries)?;
                writeln!(rendered)?;
            } else {
                report::summaries(&mut rendered, &summaries)?;
            }
            match &args.out {
                Some(path) => {
                    rowcol_fs::atomic_write_bytes(path, &rendered)
                        .with_context(|| format!("write report to {}", path.display()))?;
                    writeln!(out, "wrote {} column summaries to {}", summaries.len(), path.display())?;
                }
                None => out.write_all(&rendered)?,
            }
        }
        Command::Histogram(args) => {
            let dataset = open(&args.store)?;
            let options = StatsOptions::default();
            let summary = rowcol_stats::summarize(&dataset, &args.column, &options)?;
            let Some(numeric) = summary.numeric() else {
                bail!("column `{}` is not numeric", args.column);
            };
            let Some(histogram) =
                rowcol_stats::histogram(&dataset, &args.column, args.buckets, numeric, &options)?
            else {
                bail!("column `{}` has no values", args.column);
            };
            let grid = render(
                &Chart::from(&histogram),
                args.chart.geometry(DEFAULT_WIDTH),
                args.chart.style(),
            )?;
            writeln!(out, "{grid}")?;
            writeln!(
                out,
                "{} .. {} ({} buckets of {})",
                histogram.min,
                histogram.max,
                histogram.counts.len(),
                histogram.bucket_width()
            )?;
        }
        Command::Boxplot(args) => {
            let dataset = open(&args.store)?;
            let summary = rowcol_stats::summarize(&dataset, &args.column, &StatsOptions::default())?;
            let Some(stats) = summary.numeric().and_then(BoxStats::from_summary) else {
                bail!("column `{}` has no numeric values", args.column);
            };
            let grid = render(
                &Chart::from(stats),
                args.chart.geometry(DEFAULT_BOX_WIDTH),
                args.chart.style(),
            )?;
            writeln!(out, "{grid}")?;
            writeln!(
                out,
                "min {} | q1 {} | median {} | q3 {} | max {}",
                stats.min, stats.q1, stats.median, stats.q3, stats.max
            )?;
        }
        Command::Scatter(args) => {
            let dataset = open(&args.store)?;
            let sample = rowcol_stats::scatter_sample(
                &dataset,
                &args.x,
                &args.y,
                args.sample,
                args.seed,
                &StatsOptions::default(),
            )?;
            let grid = render(
                &Chart::from(&sample),
                args.chart.geometry(DEFAULT_WIDTH),
                args.chart.style(),
            )?;
            writeln!(out, "{grid}")?;
            writeln!(
                out,
                "{} of {} points plotted",
                sample.points.len(),
                sample.seen
            )?;
        }
        Command::Verify(args) => {
            let options = OpenOptions {
                verify_alignment: true,
                integrity: args
                    .digest
                    .then(|| Arc::new(DigestFileVerifier) as Arc<dyn rowcol_store::IntegrityVerifier>),
            };
            let dataset = Dataset::open_with(&args.store, &options)
                .with_context(|| format!("verify {}", args.store.display()))?;
            writeln!(
                out,
                "ok: {} rows x {} columns",
                dataset.row_count(),
                dataset.metadata().columns.len()
            )?;
        }
        Command::Sign(args) => {
            let dataset = open(&args.store)?;
            let path = dataset.root().join(METADATA_FILE);
            DigestFileVerifier::sign(&path)?;
            writeln!(out, "signed {}", path.display())?;
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    let result = run(cli, &mut out).and_then(|()| out.flush().map_err(Into::into));
    if let Err(err) = result {
        // A closed pipe (`rowcol export store | head`) is not a failure.
        let broken_pipe = err.chain().any(|cause| {
            cause
                .downcast_ref::<io::Error>()
                .is_some_and(|e| e.kind() == io::ErrorKind::BrokenPipe)
        });
        if broken_pipe {
            return;
        }
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

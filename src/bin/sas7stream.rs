use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use rayon::prelude::*;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use sas7bdat_stream::logger::{log_error, log_warn, set_log_file, set_log_prefix};
use sas7bdat_stream::metadata::{ColumnDescriptor, FileHeader};
use sas7bdat_stream::{CsvSink, ReadOutcome, RowCollector, SasReader};

#[derive(Parser)]
#[command(
    name = "sas7stream",
    version,
    about = "Stream SAS7BDAT datasets to CSV/TSV or inspect their layout"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Append warnings and errors to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert one or more inputs to delimited text.
    Convert(ConvertArgs),
    /// Print the header and column layout of a dataset.
    Inspect(InspectArgs),
}

#[derive(Parser, Clone)]
struct ConvertArgs {
    /// Input files or directories (recurses directories).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory (computed file names).
    #[arg(long, conflicts_with = "out")]
    out_dir: Option<PathBuf>,

    /// Output file (only valid with a single input).
    #[arg(long, conflicts_with = "out_dir")]
    out: Option<PathBuf>,

    /// Field delimiter; a tab produces `.tsv` files.
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Omit the header row.
    #[arg(long)]
    no_headers: bool,

    /// Stop after N rows per file.
    #[arg(long = "max-rows")]
    max_rows: Option<u64>,

    /// Number of concurrent worker threads.
    #[arg(long)]
    jobs: Option<usize>,

    /// Stop on first error.
    #[arg(long)]
    fail_fast: bool,
}

#[derive(Parser, Clone)]
struct InspectArgs {
    input: PathBuf,
    /// Emit JSON instead of human readable output.
    #[arg(long)]
    json: bool,
}

type AnyError = Box<dyn std::error::Error + Send + Sync>;

fn main() -> Result<(), AnyError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Some(path) = &cli.log_file {
        set_log_file(path)?;
    }

    match cli.command {
        Command::Convert(args) => run_convert(&args),
        Command::Inspect(args) => run_inspect(&args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_convert(args: &ConvertArgs) -> Result<(), AnyError> {
    if let Some(jobs) = args.jobs {
        // Ignore error if the global pool was already configured.
        let _ = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global();
    }
    let delimiter = u8::try_from(args.delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or("--delimiter must be a single ASCII character")?;

    let files = discover_inputs(&args.inputs);
    if files.is_empty() {
        return Err("no .sas7bdat inputs found".into());
    }
    if args.out.is_some() && files.len() != 1 {
        return Err("--out requires a single input".into());
    }

    let tasks: Vec<(PathBuf, PathBuf)> = match &args.out {
        Some(out) => vec![(files[0].clone(), out.clone())],
        None => files
            .into_iter()
            .map(|input| {
                let output = output_path(&input, args.out_dir.as_deref(), delimiter);
                (input, output)
            })
            .collect(),
    };

    let process = |(input, output): (PathBuf, PathBuf)| -> Result<(), AnyError> {
        let _prefix = set_log_prefix(input.display().to_string());
        convert_one(&input, &output, args, delimiter).inspect_err(|e| log_error(&e.to_string()))
    };

    if args.fail_fast {
        tasks
            .into_par_iter()
            .map(process)
            .collect::<Result<Vec<_>, _>>()?;
    } else {
        let failures = tasks
            .into_par_iter()
            .map(process)
            .filter(Result::is_err)
            .count();
        if failures > 0 {
            return Err(format!("completed with {failures} failures").into());
        }
    }
    Ok(())
}

fn convert_one(
    input: &Path,
    output: &Path,
    args: &ConvertArgs,
    delimiter: u8,
) -> Result<(), AnyError> {
    let reader = SasReader::open(input)?;
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut sink = CsvSink::new(BufWriter::new(File::create(output)?))
        .with_delimiter(delimiter)
        .with_headers(!args.no_headers);
    if let Some(max_rows) = args.max_rows {
        sink = sink.with_max_rows(max_rows);
    }

    let summary = reader.read(&mut sink)?;
    let mut out = sink.finish()?;
    out.flush()?;

    if summary.outcome == ReadOutcome::Truncated {
        log_warn(&format!(
            "file truncated after {} of {} pages",
            summary.pages_read, summary.header.page_count
        ));
    }
    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        rows = summary.rows_emitted,
        outcome = ?summary.outcome,
        "converted"
    );
    Ok(())
}

#[derive(Serialize)]
struct InspectJson<'a> {
    dataset_name: Option<&'a str>,
    file_type: Option<&'a str>,
    word_size: &'static str,
    platform: String,
    encoding: &'static str,
    sas_release: &'a str,
    sas_host: &'a str,
    os_name: &'a str,
    created: Option<String>,
    modified: Option<String>,
    page_size: usize,
    page_count: u64,
    row_count: Option<u64>,
    outcome: ReadOutcome,
    columns: &'a [ColumnDescriptor],
}

fn run_inspect(args: &InspectArgs) -> Result<(), AnyError> {
    let reader = SasReader::open(&args.input)?;
    let mut collector = RowCollector::new().schema_only();
    let summary = reader.read(&mut collector)?;
    let header = &summary.header;

    if args.json {
        let payload = InspectJson {
            dataset_name: header.dataset_name.as_deref(),
            file_type: header.file_type.as_deref(),
            word_size: if header.word_size.is_64() { "64" } else { "32" },
            platform: header.platform.to_string(),
            encoding: header.encoding.name(),
            sas_release: &header.sas_release,
            sas_host: &header.sas_host,
            os_name: &header.os_name,
            created: format_timestamp(header.timestamps.created),
            modified: format_timestamp(header.timestamps.modified),
            page_size: header.page_size,
            page_count: header.page_count,
            row_count: summary.declared_rows,
            outcome: summary.outcome,
            columns: &collector.columns,
        };
        serde_json::to_writer_pretty(std::io::stdout(), &payload)?;
        println!();
    } else {
        print_header(header, summary.declared_rows);
        for column in &collector.columns {
            println!(
                "[{idx:>3}] {name:<24}  {kind:<9}  width={w:<4}  fmt={fmt}  label={label}",
                idx = column.index,
                name = column.name,
                kind = column.column_type,
                w = column.length,
                fmt = column.format.as_deref().unwrap_or(""),
                label = column.label.as_deref().unwrap_or(""),
            );
        }
    }
    Ok(())
}

fn print_header(header: &FileHeader, rows: Option<u64>) {
    println!(
        "Table: {}  Rows: {}  Pages: {} x {} bytes  ({}-bit, {}, {})",
        header.dataset_name.as_deref().unwrap_or(""),
        rows.map_or_else(|| "?".to_owned(), |rows| rows.to_string()),
        header.page_count,
        header.page_size,
        if header.word_size.is_64() { 64 } else { 32 },
        header.platform,
        header.encoding.name(),
    );
    println!(
        "SAS {} on {}  Created: {}",
        header.sas_release,
        header.sas_host,
        format_timestamp(header.timestamps.created).unwrap_or_default()
    );
}

fn format_timestamp(value: Option<OffsetDateTime>) -> Option<String> {
    value.and_then(|ts| ts.format(&Rfc3339).ok())
}

fn discover_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input)
                .follow_links(false)
                .into_iter()
                .filter_map(Result::ok)
            {
                let path = entry.path();
                if path.is_file() && is_sas7bdat(path) {
                    files.push(path.to_path_buf());
                }
            }
        } else if input.is_file() && is_sas7bdat(input) {
            files.push(input.clone());
        }
    }
    files.sort();
    files.dedup();
    files
}

fn is_sas7bdat(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("sas7bdat"))
}

fn output_path(input: &Path, out_dir: Option<&Path>, delimiter: u8) -> PathBuf {
    use std::ffi::OsStr;
    let ext = if delimiter == b'\t' { "tsv" } else { "csv" };
    out_dir.map_or_else(
        || input.with_extension(ext),
        |dir| {
            let fname = input.file_name().unwrap_or_else(|| OsStr::new("output"));
            dir.join(PathBuf::from(fname).with_extension(ext))
        },
    )
}

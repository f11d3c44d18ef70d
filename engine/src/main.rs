//! BatchRefine CLI - Replay operation recipes against CSV files
//!
//! # Commands
//!
//! ```bash
//! batchrefine transform input.csv --operations recipe.json -o out.csv
//! batchrefine transform a.csv b.csv --operations recipe.json --output-dir out/
//! batchrefine parse input.csv          # Show how a file is imported
//! batchrefine operations               # List registered operation kinds
//! ```

use clap::{Parser, Subcommand};
use batchrefine::{
    config::parse_delimiter, import_file, load_operations, logs, operations_description, registry, EngineError,
    EngineOptions, Project, TransformEngine, TransformReport,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "batchrefine")]
#[command(about = "Replay operation recipes against CSV files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a recipe to one or more CSV files
    Transform {
        /// Input CSV file(s)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Recipe file (JSON array of operation descriptors)
        #[arg(long = "operations", value_name = "FILE")]
        operations: PathBuf,

        /// Output file for a single input (default: stdout)
        #[arg(short, long, conflicts_with = "output_dir")]
        output: Option<PathBuf>,

        /// Output directory, one file per input
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Input delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<String>,

        /// Output delimiter (default: ',')
        #[arg(long)]
        output_delimiter: Option<String>,

        /// Input encoding (auto-detect if not specified)
        #[arg(long)]
        encoding: Option<String>,

        /// The first line is data, not a header
        #[arg(long)]
        no_header: bool,

        /// Guess column types on import
        #[arg(long)]
        guess_types: bool,

        /// Write the run report(s) as JSON
        #[arg(long)]
        report: Option<PathBuf>,

        /// Only print errors
        #[arg(short, long)]
        quiet: bool,
    },

    /// Import a CSV file and output its rows as JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<String>,

        /// Input encoding (auto-detect if not specified)
        #[arg(long)]
        encoding: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List registered operation kinds
    Operations,
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

struct TransformArgs {
    inputs: Vec<PathBuf>,
    operations: PathBuf,
    output: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Transform {
            inputs,
            operations,
            output,
            output_dir,
            delimiter,
            output_delimiter,
            encoding,
            no_header,
            guess_types,
            report,
            quiet,
        } => {
            logs::set_quiet(quiet);
            match build_options(delimiter.as_deref(), output_delimiter.as_deref(), encoding, no_header, guess_types) {
                Ok(options) => {
                    let args = TransformArgs {
                        inputs,
                        operations,
                        output,
                        output_dir,
                        report,
                    };
                    cmd_transform(options, args).await
                }
                Err(e) => Err(e),
            }
        }

        Commands::Parse {
            input,
            delimiter,
            encoding,
            output,
        } => build_options(delimiter.as_deref(), None, encoding, false, false)
            .and_then(|options| cmd_parse(&input, &options, output.as_deref())),

        Commands::Operations => cmd_operations(),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// Environment defaults, then command-line flags.
fn build_options(
    delimiter: Option<&str>,
    output_delimiter: Option<&str>,
    encoding: Option<String>,
    no_header: bool,
    guess_types: bool,
) -> CliResult<EngineOptions> {
    let mut options = EngineOptions::from_env();

    if let Some(d) = delimiter {
        options.import.delimiter = Some(parse_delimiter(d).ok_or_else(|| format!("Invalid delimiter: {}", d))?);
    }
    if let Some(d) = output_delimiter {
        options.export.delimiter = parse_delimiter(d).ok_or_else(|| format!("Invalid output delimiter: {}", d))?;
    }
    if encoding.is_some() {
        options.import.encoding = encoding;
    }
    if no_header {
        options.import.header_lines = 0;
    }
    if guess_types {
        options.import.guess_types = true;
    }

    Ok(options)
}

async fn cmd_transform(options: EngineOptions, args: TransformArgs) -> CliResult<()> {
    let recipe = load_operations(&args.operations)?;
    let engine = TransformEngine::new(options).init();

    if args.inputs.len() > 1 && args.output_dir.is_none() {
        return Err("Several inputs need --output-dir".into());
    }
    let jobs = plan_jobs(args.inputs, args.output.as_deref(), args.output_dir.as_deref())?;
    if let Some(dir) = &args.output_dir {
        fs::create_dir_all(dir)?;
    }

    // Each input gets its own project, so files run in parallel
    let tasks = jobs.into_iter().map(|(input, target)| {
        let engine = engine.clone();
        let recipe = recipe.clone();
        tokio::task::spawn_blocking(move || {
            let result = run_file(&engine, &input, &recipe, target.as_deref());
            (input, result)
        })
    });
    let results = futures::future::join_all(tasks).await;

    let mut reports = Vec::new();
    let mut failed = 0;
    for joined in results {
        let (input, result) = joined?;
        match result {
            Ok(report) => {
                logs::log_success(format!("{}: {}", input.display(), report.summary()));
                for step in report.failures() {
                    logs::log_warning(format!("  step {} skipped: {}", step.index, step.reason));
                }
                reports.push(report);
            }
            Err(e) => {
                logs::log_error(format!("{}: {}", input.display(), e));
                failed += 1;
            }
        }
    }

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&reports)?;
        fs::write(path, json)?;
        logs::log_info(format!("💾 Report saved to: {}", path.display()));
    }

    if failed > 0 {
        return Err(format!("{} input(s) failed", failed).into());
    }
    Ok(())
}

/// Pair every input with its output target (`None` for stdout).
///
/// Fails when two inputs would write the same file.
fn plan_jobs(
    inputs: Vec<PathBuf>,
    output: Option<&Path>,
    output_dir: Option<&Path>,
) -> CliResult<Vec<(PathBuf, Option<PathBuf>)>> {
    let mut seen: HashMap<PathBuf, PathBuf> = HashMap::new();
    let mut jobs = Vec::with_capacity(inputs.len());

    for input in inputs {
        let target = match output_dir {
            Some(dir) => {
                let name = input
                    .file_name()
                    .ok_or_else(|| format!("Input has no file name: {}", input.display()))?;
                Some(dir.join(name))
            }
            None => output.map(Path::to_path_buf),
        };

        if let Some(target) = &target {
            if let Some(previous) = seen.insert(target.clone(), input.clone()) {
                return Err(format!(
                    "{} and {} would both write {}",
                    previous.display(),
                    input.display(),
                    target.display()
                )
                .into());
            }
        }
        jobs.push((input, target));
    }

    Ok(jobs)
}

fn run_file(
    engine: &TransformEngine,
    input: &Path,
    recipe: &[Value],
    target: Option<&Path>,
) -> Result<TransformReport, EngineError> {
    match target {
        Some(path) => engine.transform_to_file(input, recipe, path),
        None => engine.transform(input, recipe, io::stdout().lock()),
    }
}

fn cmd_parse(input: &Path, options: &EngineOptions, output: Option<&Path>) -> CliResult<()> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let result = import_file(input, &options.import)?;

    eprintln!("   Encoding: {}", result.encoding);
    eprintln!(
        "   Delimiter: '{}'{}",
        format_delimiter(result.delimiter),
        if options.import.delimiter.is_none() { " (auto-detected)" } else { "" }
    );
    eprintln!("   Columns: {}", result.project.column_names().join(", "));
    eprintln!("✅ Parsed {} rows", result.project.row_count());

    let json = serde_json::to_string_pretty(&records(&result.project))?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_operations() -> CliResult<()> {
    let registry = registry::initialize();

    println!("Operation kinds:\n");
    for kind in registry.kinds() {
        println!("  {}", kind);
    }
    println!();
    println!("{}", operations_description());
    Ok(())
}

/// Rows as JSON objects keyed by column name; blank cells are null.
fn records(project: &Project) -> Vec<Map<String, Value>> {
    let names = project.column_names();
    project
        .rows()
        .iter()
        .map(|row| {
            names
                .iter()
                .zip(&row.cells)
                .map(|(name, cell)| {
                    let value = cell.clone().map(Value::String).unwrap_or(Value::Null);
                    (name.to_string(), value)
                })
                .collect()
        })
        .collect()
}

fn write_output(content: &str, path: Option<&Path>) -> CliResult<()> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("   💾 Saved to: {}", p.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

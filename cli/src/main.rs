use std::error::Error as StdError;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{Diagnostic, NamedSource, Result};
use tasktree::render::RenderOptions;
use tasktree::timings::PlotOptions;
use tasktree::{Error, ErrorKind};
use tracing::{event, instrument, Level};
use tracing_error::{ExtractSpanTrace, SpanTrace, TracedError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[clap(name = "tasktree", version, about = "Picture solver task traces")]
pub struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Draw the task tree recorded in a solver trace
    Tree {
        #[clap(long, parse(from_os_str))]
        input_file: PathBuf,

        /// .svg, .dot or .json
        #[clap(long, parse(from_os_str))]
        output_file: PathBuf,

        /// Pixels per second; fit to --width when unset
        #[clap(long)]
        scale: Option<f64>,

        #[clap(long, default_value_t = 800.0)]
        width: f64,

        #[clap(long, default_value_t = 12.0)]
        row_height: f64,

        #[clap(long, default_value_t = 1.5)]
        line_width: f64,

        /// Caption leaves with their task labels
        #[clap(long)]
        labels: bool,
    },
    /// Plot solve times by problem size for a set of solver logs
    Timings {
        #[clap(long, parse(from_os_str))]
        output_file: PathBuf,

        #[clap(long, default_value_t = 640.0)]
        width: f64,

        #[clap(long, default_value_t = 480.0)]
        height: f64,

        /// Log files, or directories to search for them
        #[clap(parse(from_os_str), required = true)]
        paths: Vec<PathBuf>,
    },
}

#[derive(Debug, Diagnostic, thiserror::Error)]
pub enum CliError {
    #[error("malformed trace line {line}: {reason}")]
    #[diagnostic(code(tasktree::malformed_line))]
    MalformedLine {
        #[source_code]
        src: NamedSource,

        #[label = "not a split or a timestamp"]
        span: std::ops::Range<usize>,

        line: usize,
        reason: String,
    },

    #[error("{kind:?}")]
    #[diagnostic(code(tasktree::pipeline))]
    Pipeline {
        kind: ErrorKind,
        source: TracedError<Error>,
    },

    #[error("cannot walk {path}")]
    #[diagnostic(code(tasktree::walk))]
    Walk {
        path: String,
        #[source]
        source: walkdir::Error,
    },

    #[error("io error")]
    #[diagnostic(code(tasktree::io))]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl From<Error> for CliError {
    fn from(source: Error) -> Self {
        CliError::Pipeline{kind: source.kind(), source: TracedError::from(source)}
    }
}

impl CliError {
    /// Attach the trace text to malformed-line errors.
    fn with_source(err: Error, path: &Path, data: &str) -> Self {
        match err {
            Error::MalformedLine{line, span, reason, ..} => CliError::MalformedLine{
                src: NamedSource::new(path.display().to_string(), data.to_string()),
                span,
                line,
                reason,
            },
            err => err.into(),
        }
    }
}

#[instrument(skip(options))]
fn tree(input_file: &Path, output_file: &Path, options: &RenderOptions) -> Result<(), CliError> {
    let data = std::fs::read_to_string(input_file)?;
    let trace = tasktree::trace::read(&data)
        .map_err(|e| CliError::with_source(e, input_file, &data))?;
    for line in trace.passthrough.iter() {
        println!("{line}");
    }

    let timed = tasktree::reconstruct(&trace)?;
    event!(Level::INFO, segments = timed.len(), labels = timed.order.len(), "RECONSTRUCTED");

    tasktree::render::render(&timed, output_file, options)?;
    Ok(())
}

#[instrument(skip(options))]
fn timings(output_file: &Path, paths: &[PathBuf], options: &PlotOptions) -> Result<(), CliError> {
    let mut runs = vec![];
    for path in paths {
        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry.map_err(|source| CliError::Walk{path: path.display().to_string(), source})?;
            if entry.file_type().is_file() {
                runs.push(tasktree::metadata::load(entry.path())?);
            }
        }
    }

    let series = tasktree::timings::collect(&runs);
    event!(Level::INFO, runs = runs.len(), series = series.len(), "COLLECTED");

    tasktree::timings::render(&series, output_file, options)?;
    Ok(())
}

/// The first span trace recorded anywhere in the source chain of `err`.
fn span_trace_of<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a SpanTrace> {
    std::iter::successors(Some(err), |&e| e.source()).find_map(|e| e.span_trace())
}

fn run(args: Args) -> Result<(), CliError> {
    match args.command {
        Command::Tree{input_file, output_file, scale, width, row_height, line_width, labels} => {
            let options = RenderOptions{width, scale, row_height, line_width, labels, ..Default::default()};
            tree(&input_file, &output_file, &options)
        },
        Command::Timings{output_file, width, height, paths} => {
            let options = PlotOptions{width, height, ..Default::default()};
            timings(&output_file, &paths, &options)
        },
    }
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .context_lines(2)
                .build(),
        )
    }))?;

    tracing_subscriber::Registry::default()
        .with(tracing_error::ErrorLayer::default())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let result = run(Args::parse());
    if let Some(span_trace) = result.as_ref().err().and_then(|err| span_trace_of(err)) {
        event!(Level::DEBUG, %span_trace, "SPAN TRACE");
    }
    Ok(result?)
}

//! Binary entry point for the SPARQL query analyzer.
#![forbid(unsafe_code)]

use std::error::Error;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use sparql_analysis::{
    cli::{
        reports::{
            characteristic_set_report, complex_paths, list_paths, multi_predicates,
            unbound_predicates,
        },
        AnalyzeConfig, BatchDriver, ColorChoice, OutputFormat, QueryBatch,
    },
    logging::init_logging,
    report::{ConsoleReporter, Painter, Reporter, SummaryFormat},
};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(
    name = "sparql-analyze",
    version,
    about = "Static analysis of SPARQL queries",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        short = 'c',
        long,
        global = true,
        help = "Read queries from stdin, one per line"
    )]
    stdin: bool,

    #[arg(
        short = 'd',
        long,
        global = true,
        help = "URL-decode each query before processing"
    )]
    url_decode: bool,

    #[arg(long, global = true, value_name = "FILE", help = "Configuration file")]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "FILTER",
        env = "SPARQL_ANALYZE_LOG",
        help = "Log filter, e.g. warn or sparql_analysis=debug"
    )]
    log_level: Option<String>,

    #[arg(long, global = true, value_enum, help = "When to color output")]
    color: Option<ColorChoice>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for summaries and tallies"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct QueryArg {
    #[arg(
        value_name = "QUERY",
        help = "Query text, or a file holding one query (ignored with --stdin)"
    )]
    query: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every enabled analyzer and print the issues found.
    Analyze {
        #[command(flatten)]
        input: QueryArg,
        #[arg(long, help = "Print queries on a single line")]
        compact: bool,
        #[arg(long, help = "Only print the summary")]
        no_issues: bool,
        #[arg(long, help = "Do not print the summary")]
        no_summary: bool,
    },
    /// Print every property path.
    Paths {
        #[command(flatten)]
        input: QueryArg,
        #[arg(long, help = "Replace IRIs with canonical names")]
        rewrite: bool,
    },
    /// Print paths with `+` or `*` over anything but a single predicate.
    ComplexPaths {
        #[command(flatten)]
        input: QueryArg,
        #[arg(long, help = "Replace IRIs with canonical names")]
        rewrite: bool,
    },
    /// Print each distinct set of predicates used around a subject.
    CharacteristicSets {
        #[command(flatten)]
        input: QueryArg,
    },
    /// Print queries that use a predicate more than once on one subject.
    MultiPredicates {
        #[command(flatten)]
        input: QueryArg,
    },
    /// Print queries with a variable in predicate position.
    UnboundPredicates {
        #[command(flatten)]
        input: QueryArg,
    },
}

impl Command {
    fn input(&self) -> &QueryArg {
        match self {
            Command::Analyze { input, .. }
            | Command::Paths { input, .. }
            | Command::ComplexPaths { input, .. }
            | Command::CharacteristicSets { input }
            | Command::MultiPredicates { input }
            | Command::UnboundPredicates { input } => input,
        }
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = AnalyzeConfig::load(cli.config.clone())?;
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    init_logging(&level)?;
    debug!(config = ?config.path(), "configuration loaded");

    let batch = read_batch(&cli)?;
    let mut out = io::stdout();
    match &cli.command {
        Command::Analyze {
            compact,
            no_issues,
            no_summary,
            ..
        } => {
            let analyzer = config.analyzer()?;
            let painter = painter(cli.color.unwrap_or(config.output.color));
            let mut reporter = ConsoleReporter::new(io::stdout(), painter)
                .pretty(config.output.pretty && !compact)
                .print_issues(config.output.print_issues && !no_issues)
                .print_summary(config.output.print_summary && !no_summary)
                .summary_format(match cli.format {
                    OutputFormat::Text => SummaryFormat::Text,
                    OutputFormat::Json => SummaryFormat::Json,
                });
            let mut driver = BatchDriver::new(&analyzer);
            driver.run(&batch, &mut reporter, &mut out)?;
            reporter.report_summary(&driver.finish())?;
        }
        Command::Paths { rewrite, .. } => {
            list_paths(&batch, *rewrite, &mut out)?;
        }
        Command::ComplexPaths { rewrite, .. } => {
            complex_paths(&batch, *rewrite, cli.format, &mut out)?;
        }
        Command::CharacteristicSets { .. } => {
            characteristic_set_report(&batch, cli.format, &mut out)?;
        }
        Command::MultiPredicates { .. } => {
            multi_predicates(&batch, cli.format, &mut out)?;
        }
        Command::UnboundPredicates { .. } => {
            unbound_predicates(&batch, cli.format, &mut out)?;
        }
    }
    Ok(())
}

fn read_batch(cli: &Cli) -> Result<QueryBatch, Box<dyn Error>> {
    if cli.stdin {
        return Ok(QueryBatch::from_lines(io::stdin().lock(), cli.url_decode)?);
    }
    match &cli.command.input().query {
        Some(query) => Ok(QueryBatch::from_argument(query, cli.url_decode)?),
        None => Err("no query given; pass one as an argument or use --stdin".into()),
    }
}

fn painter(choice: ColorChoice) -> Painter {
    match choice {
        ColorChoice::Always => Painter::Ansi,
        ColorChoice::Never => Painter::Plain,
        ColorChoice::Auto if io::stdout().is_terminal() => Painter::Ansi,
        ColorChoice::Auto => Painter::Plain,
    }
}

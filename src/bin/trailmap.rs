use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand, ValueHint};
use trailmap::{
    match_file, normalize, CsvLedger, LedgerSource, MatchKind, MatcherContext, Pipeline,
    PipelineConfig, TrailError,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Expedition trail map builder", long_about = None)]
struct Cli {
    /// Increase verbosity (-v debug, -vv trace). Default INFO.
    #[arg(short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert new tracks, merge, simplify, color and export
    Run(RunArgs),
    /// Show which ledger row each GPX filename matches
    Match {
        /// GPX filenames (paths are reduced to their file name)
        #[arg(required = true, value_hint = ValueHint::FilePath)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        ledger: LedgerArgs,
    },
    /// Print the normalized key of each argument
    Normalize {
        #[arg(required = true)]
        text: Vec<String>,
    },
}

#[derive(clap::Args, Debug)]
struct LedgerArgs {
    /// Ledger exported as CSV (first row is a header)
    #[arg(long, value_hint = ValueHint::FilePath)]
    ledger: PathBuf,

    /// CSV field delimiter
    #[arg(long, default_value_t = ',')]
    delimiter: char,
}

impl LedgerArgs {
    fn source(&self) -> Result<CsvLedger, TrailError> {
        let delimiter = u8::try_from(self.delimiter).map_err(|_| {
            TrailError::config(format!("delimiter '{}' is not a single byte", self.delimiter))
        })?;
        Ok(CsvLedger::new(&self.ledger).with_delimiter(delimiter))
    }
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    ledger: LedgerArgs,

    /// JSON configuration file; flags below override it
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    #[arg(long, value_hint = ValueHint::DirPath)]
    gpx_dir: Option<PathBuf>,

    #[arg(long, value_hint = ValueHint::DirPath)]
    trails_dir: Option<PathBuf>,

    #[arg(short, long, value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Copy the colored output here
    #[arg(long, value_hint = ValueHint::FilePath)]
    publish: Option<PathBuf>,

    /// Conflict distance in meters
    #[arg(long)]
    threshold: Option<f64>,

    /// Only match tracks by exact date and name
    #[arg(long, action = ArgAction::SetTrue)]
    no_date_fallback: bool,
}

impl RunArgs {
    fn config(&self) -> Result<PipelineConfig, TrailError> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(dir) = &self.gpx_dir {
            config.gpx_dir = dir.clone();
        }
        if let Some(dir) = &self.trails_dir {
            config.trails_dir = dir.clone();
        }
        if let Some(output) = &self.output {
            config.output_file = output.clone();
        }
        if let Some(publish) = &self.publish {
            config.publish_path = Some(publish.clone());
        }
        if let Some(threshold) = self.threshold {
            config.conflict.threshold_m = threshold;
        }
        if self.no_date_fallback {
            config.matching.date_prefix_fallback = false;
        }
        Ok(config)
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            if e.is_recoverable() {
                ExitCode::from(2)
            } else {
                ExitCode::from(1)
            }
        }
    }
}

fn execute(command: Command) -> Result<(), TrailError> {
    match command {
        Command::Run(args) => {
            let pipeline = Pipeline::new(args.config()?);
            let summary = pipeline.run(&args.ledger.source()?)?;
            println!("{summary}");
        }
        Command::Match { files, ledger } => {
            let source = ledger.source()?;
            let config = PipelineConfig::default();
            let ctx = MatcherContext::new(source.rows()?, config.layout, config.matching);
            for file in &files {
                let name = file
                    .file_name()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file.display().to_string());
                match match_file(&name, &ctx) {
                    Some(found) => {
                        let how = match found.kind {
                            MatchKind::SourceFile => "source file".to_string(),
                            MatchKind::Exact => "exact".to_string(),
                            MatchKind::DatePrefix { candidates } => {
                                format!("date only, {candidates} candidates")
                            }
                        };
                        let row = found.row;
                        println!(
                            "{name}\trow {}\t{} {}\t({how})",
                            found.row_index + 1,
                            row.cell(ctx.layout().date),
                            row.cell(ctx.layout().name)
                        );
                    }
                    None => println!("{name}\tunmatched"),
                }
            }
        }
        Command::Normalize { text } => {
            for t in &text {
                println!("{}", normalize(t));
            }
        }
    }
    Ok(())
}

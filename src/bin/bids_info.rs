use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use bids_subject_info::app::{App, ParticipantsResult, ResolveOptions};
use bids_subject_info::config::{ConfigLoader, ResolvedConfig};
use bids_subject_info::confounds::ColumnSelector;
use bids_subject_info::diagnostics::{DiagnosticSink, Diagnostics, TracingSink};
use bids_subject_info::domain::{MatchMode, MergePolicy, ParticipantLabel, RunLabel, TaskLabel};
use bids_subject_info::error::{BidsError, ErrorKind};
use bids_subject_info::layout::FsIndex;
use bids_subject_info::output::JsonOutput;
use bids_subject_info::participants;

#[derive(Parser)]
#[command(name = "bids-info")]
#[command(about = "Resolve task design, confound regressors and repetition time for BIDS participants")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "List participants and check requested labels")]
    Participants(ParticipantsArgs),
    #[command(about = "List the imaging files of one participant")]
    Collect(CollectArgs),
    #[command(about = "Assemble subject analysis descriptors")]
    Resolve(ResolveArgs),
}

#[derive(Args)]
struct ParticipantsArgs {
    bids_dir: Utf8PathBuf,

    #[arg(long = "participant-label", num_args = 1..)]
    participant_label: Vec<String>,

    #[arg(long)]
    strict: bool,
}

#[derive(Args)]
struct CollectArgs {
    bids_dir: Utf8PathBuf,

    #[arg(long = "participant-label")]
    participant_label: String,

    #[arg(long)]
    task: Option<String>,
}

#[derive(Args)]
struct ResolveArgs {
    bids_dir: Option<Utf8PathBuf>,

    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    derivatives: Option<Utf8PathBuf>,

    #[arg(long = "participant-label", num_args = 1..)]
    participant_label: Vec<String>,

    #[arg(long)]
    strict: bool,

    #[arg(long = "task")]
    tasks: Vec<String>,

    #[arg(long)]
    run: Option<String>,

    #[arg(long = "confound-pattern")]
    confound_patterns: Vec<String>,

    #[arg(long)]
    match_mode: Option<MatchMode>,

    #[arg(long)]
    case_insensitive: bool,

    #[arg(long)]
    merge_policy: Option<MergePolicy>,

    #[arg(long)]
    output: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(err) = report.downcast_ref::<BidsError>() {
                return ExitCode::from(map_exit_code(err.kind()));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Layout => 2,
        ErrorKind::Metadata => 3,
        ErrorKind::Config => 4,
        ErrorKind::Io => 1,
    }
}

fn run() -> miette::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Participants(args) => run_participants(args),
        Commands::Collect(args) => run_collect(args),
        Commands::Resolve(args) => run_resolve(args),
    }
}

fn run_participants(args: ParticipantsArgs) -> miette::Result<ExitCode> {
    let diagnostics = Diagnostics::new();
    let participants = participants::validate(
        &args.bids_dir,
        &args.participant_label,
        args.strict,
        &diagnostics,
    )?;
    let advisories = diagnostics.into_advisories();
    forward(&advisories);

    JsonOutput::print_participants(&ParticipantsResult {
        bids_dir: args.bids_dir.to_string(),
        participants,
        advisories,
    })
    .into_diagnostic()?;
    Ok(ExitCode::SUCCESS)
}

fn run_collect(args: CollectArgs) -> miette::Result<ExitCode> {
    let subject = args.participant_label.parse::<ParticipantLabel>()?;
    let task = args.task.map(|task| task.parse::<TaskLabel>()).transpose()?;

    let raw = FsIndex::open(args.bids_dir.clone())?;
    let app = App::new(raw.clone(), raw, ResolveOptions::default());
    let data = app.collect_data(&subject, task.as_ref());
    JsonOutput::print_subject_data(&data).into_diagnostic()?;
    Ok(ExitCode::SUCCESS)
}

fn run_resolve(args: ResolveArgs) -> miette::Result<ExitCode> {
    let config = ConfigLoader::resolve_or_default(args.config.as_deref())?;
    let settings = Settings::merge(config, &args)?;

    let diagnostics = Diagnostics::new();
    let subjects = participants::validate(
        &settings.bids_dir,
        &settings.participant_labels,
        settings.strict,
        &diagnostics,
    )?;
    forward(&diagnostics.into_advisories());

    let raw = FsIndex::open(settings.bids_dir.clone())?;
    let derivatives = FsIndex::open(settings.derivatives_dir.clone())?;
    let tasks = if settings.tasks.is_empty() {
        raw.tasks()
    } else {
        settings.tasks.clone()
    };
    if tasks.is_empty() {
        return Err(miette::Report::msg(format!(
            "no functional tasks found under {}",
            settings.bids_dir
        )));
    }

    let app = App::new(raw, derivatives, settings.options);
    let units = app.plan_units(&subjects, &tasks, settings.run.as_ref());
    let report = app.run_batch(&units);

    match &args.output {
        Some(path) => JsonOutput::write_report(path, &report)?,
        None => JsonOutput::print_report(&report).into_diagnostic()?,
    }

    if report.has_failures() {
        tracing::warn!(
            failed = report.failed.len(),
            succeeded = report.succeeded.len(),
            "some units could not be resolved"
        );
        return Ok(ExitCode::from(map_exit_code(ErrorKind::Metadata)));
    }
    Ok(ExitCode::SUCCESS)
}

/// Config file values with command-line overrides applied.
struct Settings {
    bids_dir: Utf8PathBuf,
    derivatives_dir: Utf8PathBuf,
    participant_labels: Vec<String>,
    strict: bool,
    tasks: Vec<TaskLabel>,
    run: Option<RunLabel>,
    options: ResolveOptions,
}

impl Settings {
    fn merge(config: ResolvedConfig, args: &ResolveArgs) -> miette::Result<Self> {
        let bids_dir = args
            .bids_dir
            .clone()
            .or_else(|| config.bids_dir.clone())
            .ok_or_else(|| miette::Report::msg("a BIDS directory is required (argument or config)"))?;
        let derivatives_dir = args
            .derivatives
            .clone()
            .or_else(|| config.derivatives_dir.clone())
            .unwrap_or_else(|| bids_dir.join("derivatives").join("fmriprep"));

        let participant_labels = if args.participant_label.is_empty() {
            config.participant_labels.clone()
        } else {
            args.participant_label.clone()
        };
        let tasks = if args.tasks.is_empty() {
            config.tasks.clone()
        } else {
            args.tasks
                .iter()
                .map(|task| task.parse())
                .collect::<Result<Vec<TaskLabel>, BidsError>>()?
        };
        let run = args
            .run
            .as_deref()
            .map(str::parse::<RunLabel>)
            .transpose()?;

        let patterns = if args.confound_patterns.is_empty() {
            config.confound_patterns.clone()
        } else {
            args.confound_patterns.clone()
        };
        let selector = ColumnSelector::new(
            patterns,
            args.match_mode.unwrap_or(config.match_mode),
            config.case_sensitive && !args.case_insensitive,
        )?;

        Ok(Self {
            bids_dir,
            derivatives_dir,
            participant_labels,
            strict: config.strict || args.strict,
            tasks,
            run,
            options: ResolveOptions {
                merge_policy: args.merge_policy.unwrap_or(config.merge_policy),
                selector,
            },
        })
    }
}

fn forward(advisories: &[bids_subject_info::diagnostics::Advisory]) {
    for advisory in advisories {
        TracingSink.advise(advisory.clone());
    }
}

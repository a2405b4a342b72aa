//! Terminal front end for the query execution simulator.
#![forbid(unsafe_code)]

#[path = "playground/ui.rs"]
mod ui;

use std::error::Error;
use std::io;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use queryscope::config::PlaygroundConfig;
use queryscope::logging::init_logging;
use queryscope::query::profile::{profile_snapshot, SimProfileSnapshot};
use queryscope::query::{estimated_duration, AbortReason, RunReport, RunState, SimEvent, Simulator};
use queryscope::relation::{RelationStore, Row};
use serde::Serialize;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::debug;

use crate::ui::{format_duration, TaskGuard, Theme, Ui};

#[derive(Parser, Debug)]
#[command(
    name = "playground",
    version,
    about = "Watch small queries execute step by step",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = "QUERYSCOPE_CONFIG",
        help = "Path to the playground TOML config"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "FILTER",
        help = "Tracing filter directive, e.g. queryscope=debug"
    )]
    log: Option<String>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = Theme::Auto,
        help = "Color theme for text output"
    )]
    theme: Theme,

    #[arg(long, global = true, help = "Suppress icons, colors, and spinners")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a query and stream each step as it executes
    Run(RunCmd),
    /// Describe the strategy and estimated cost for a query
    Explain {
        #[arg(value_name = "QUERY")]
        query: String,
    },
    /// List the tables queries run against
    Tables,
    /// Print a shell completion script
    Completions {
        #[arg(value_enum, value_name = "SHELL")]
        shell: Shell,
    },
}

#[derive(clap::Args, Debug)]
struct RunCmd {
    #[arg(value_name = "QUERY")]
    query: String,

    #[arg(long, help = "Skip every pacing delay")]
    instant: bool,

    #[arg(long, value_name = "FACTOR", help = "Playback speed multiplier")]
    speed: Option<f64>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if let Command::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "playground", &mut io::stdout());
        return Ok(());
    }

    let config = PlaygroundConfig::load(cli.config.clone())?;
    let filter = cli
        .log
        .clone()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| config.log_filter().to_owned());
    init_logging(&filter)?;
    debug!(path = ?config.path(), "playground.config.loaded");

    let ui = Ui::new(cli.theme, cli.quiet);
    match cli.command {
        Command::Run(cmd) => {
            let config = config.with_instant(cmd.instant).with_speed(cmd.speed);
            let sim = Simulator::from_config(&config)?;
            run_query(&ui, cli.format, &sim, &cmd.query).await?;
        }
        Command::Explain { query } => {
            let sim = Simulator::from_config(&config)?;
            let plan = sim.explain(&query)?;
            emit(&cli.format, &plan, || {
                ui.section(
                    "Strategy",
                    [
                        ("query", query.clone()),
                        ("fingerprint", format!("{:016x}", plan.fingerprint)),
                    ],
                );
                print!("{plan}");
            })?;
        }
        Command::Tables => {
            let store = config.relations()?;
            let mut tables = Vec::new();
            for name in store.relation_names() {
                tables.push(store.relation(&name)?);
            }
            let views: Vec<TableView<'_>> = tables
                .iter()
                .map(|rel| TableView {
                    name: rel.name(),
                    columns: rel.columns(),
                    key: rel.key(),
                    rows: rel.rows(),
                })
                .collect();
            emit(&cli.format, &views, || {
                for (i, view) in views.iter().enumerate() {
                    if i > 0 {
                        ui.spacer();
                    }
                    ui.section(
                        view.name,
                        [
                            ("columns", view.columns.join(", ")),
                            ("key", view.key.unwrap_or("-").to_owned()),
                            ("rows", view.rows.len().to_string()),
                        ],
                    );
                    ui.grid(view.name, view.rows);
                }
            })?;
        }
        Command::Completions { .. } => {}
    }
    Ok(())
}

#[derive(Serialize)]
struct TableView<'a> {
    name: &'a str,
    columns: &'a [String],
    key: Option<&'a str>,
    rows: &'a [Row],
}

#[derive(Serialize)]
struct RunOutput<'a> {
    report: &'a RunReport,
    events: &'a [SimEvent],
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<SimProfileSnapshot>,
}

async fn run_query(
    ui: &Ui,
    format: OutputFormat,
    sim: &Simulator,
    query: &str,
) -> Result<(), Box<dyn Error>> {
    let text = format == OutputFormat::Text;
    let script = sim.plan(query);
    if text {
        let estimate = estimated_duration(&script, sim.store().as_ref(), &sim.pacing());
        ui.section(
            "Query",
            [
                ("query", query.to_owned()),
                ("archetype", script.archetype.to_string()),
                ("steps", script.len().to_string()),
                ("estimated", format_duration(estimate)),
            ],
        );
    }

    let mut events = sim.subscribe();
    let handle = sim.start(query);
    let task = ui.task(format!("{} {}", handle.id(), handle.archetype()));
    let mut seen = Vec::new();
    let join = handle.join();
    tokio::pin!(join);

    let report = loop {
        tokio::select! {
            biased;
            received = events.recv() => match received {
                Ok(event) => observe(ui, &task, text, &mut seen, event),
                Err(RecvError::Lagged(skipped)) => {
                    ui.warn(&format!("dropped {skipped} events"));
                }
                Err(RecvError::Closed) => break (&mut join).await?,
            },
            report = &mut join => break report?,
            _ = tokio::signal::ctrl_c() => {
                ui.warn("interrupted");
                return Ok(());
            }
        }
    };
    loop {
        match events.try_recv() {
            Ok(event) => observe(ui, &task, text, &mut seen, event),
            Err(TryRecvError::Lagged(skipped)) => ui.warn(&format!("dropped {skipped} events")),
            Err(_) => break,
        }
    }
    let elapsed = task.finish();

    let profile = profile_snapshot(false);
    let output = RunOutput {
        report: &report,
        events: &seen,
        profile,
    };
    emit(&format, &output, || {
        match &report.state {
            RunState::Completed => ui.success(&format!(
                "{} completed in {} with {} rows",
                report.run,
                format_duration(elapsed),
                report.rows.len()
            )),
            RunState::Aborted { reason } => ui.warn(&format!(
                "{} aborted: {}",
                report.run,
                describe_abort(reason)
            )),
            RunState::Idle | RunState::Running { .. } => {}
        }
        ui.grid("Results", &report.rows);
        if let Some(profile) = profile {
            ui.section(
                "Profile",
                [
                    ("rows_scanned", profile.rows_scanned),
                    ("rows_filtered", profile.rows_filtered),
                    ("predicate_evals", profile.predicate_evals),
                    ("pairs_compared", profile.pairs_compared),
                    ("seeks", profile.seeks),
                    ("rows_emitted", profile.rows_emitted),
                ],
            );
        }
    })
}

fn observe(ui: &Ui, task: &TaskGuard<'_>, text: bool, seen: &mut Vec<SimEvent>, event: SimEvent) {
    if text {
        match &event {
            SimEvent::RunStarted { .. } | SimEvent::RunFinished { .. } => {}
            SimEvent::StepStarted { index, step, .. } => {
                task.set_message(step.text().to_owned());
                task.println(ui.step(*index, step.kind().as_str(), step.text()));
            }
            SimEvent::Highlight { highlight, .. } => {
                if !highlight.is_empty() {
                    let active: Vec<String> = highlight
                        .relations()
                        .map(|rel| format!("{rel}{:?}", highlight.rows(rel)))
                        .collect();
                    task.println(ui.detail(&active.join(" ")));
                }
            }
            SimEvent::RowEmitted { position, row, .. } => {
                task.println(ui.detail(&format!("+ #{position} {}", describe_row(row))));
            }
        }
    }
    seen.push(event);
}

fn describe_row(row: &Row) -> String {
    let cells: Vec<String> = row.iter().map(|(k, v)| format!("{k}={v}")).collect();
    cells.join(" ")
}

fn describe_abort(reason: &AbortReason) -> String {
    match reason {
        AbortReason::Unsupported => "query not supported".to_owned(),
        AbortReason::Superseded => "superseded by a newer run".to_owned(),
        AbortReason::Failed { message } => message.clone(),
    }
}

fn emit<T, F>(format: &OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: FnOnce(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

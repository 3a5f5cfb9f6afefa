use cadenza::{
    collaborators::{
        FocusOptions, HighlightFocus, HighlightSource, PlanPersistence, SessionNotice,
        SessionObserver,
    },
    config::{Config, ConfigStore, FileConfigStore},
    error::FocusError,
    orchestrator::SessionOrchestrator,
    plan::{Highlight, PracticePlan},
    plan_builder::{PlanDefaults, PlanHeader, SectionEntry},
    planner::PlanEditor,
    runtime::{Controls, CrosstermEventSource, FixedTicker, PracticeEvent, Runner},
    session::{SessionOutcome, SessionSnapshot, SessionSummary},
    store::PracticeStore,
    util::{format_clock, format_minutes},
};
use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    cursor::MoveToColumn,
    queue,
    style::Print,
    terminal::{disable_raw_mode, enable_raw_mode, Clear, ClearType},
    tty::IsTty,
};
use itertools::Itertools;
use std::{
    collections::HashMap,
    error::Error,
    io::{self, stdin, Write},
    path::PathBuf,
};

/// timed practice sessions built from the highlights on your scores
#[derive(Parser, Debug)]
#[clap(
    version,
    about,
    long_about = "Plan practice sessions from highlighted passages of a score, \
                  then run them with a per-section countdown, pause, skip and notes."
)]
pub struct Cli {
    /// practice database to use instead of the default location
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    /// config file to use instead of the default location
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// mark and list highlighted passages of a score
    Highlight {
        #[clap(subcommand)]
        action: HighlightCommand,
    },
    /// create, edit and inspect practice plans
    Plan {
        #[clap(subcommand)]
        action: PlanCommand,
    },
    /// run a practice session (space: pause, s: skip, n: note, q: quit)
    Run {
        /// score to practice
        #[clap(short, long)]
        score: String,

        /// plan to run; defaults to the score's latest plan, or every highlight
        #[clap(long)]
        plan_id: Option<i64>,
    },
    /// show past sessions
    History {
        /// only sessions for this score
        #[clap(short, long)]
        score: Option<String>,

        /// write CSV to stdout
        #[clap(long)]
        csv: bool,
    },
}

#[derive(Subcommand, Debug)]
enum HighlightCommand {
    /// add (or replace) a highlight
    Add {
        #[clap(short, long)]
        score: String,
        #[clap(long)]
        id: String,
        #[clap(short, long)]
        label: String,
        /// measure range such as 12-20, or a single measure
        #[clap(short, long)]
        measures: Option<String>,
    },
    /// list highlights of a score
    List {
        #[clap(short, long)]
        score: String,
    },
}

#[derive(Subcommand, Debug)]
enum PlanCommand {
    /// save the score's plan, updating the latest one unless --new is given
    Save {
        #[clap(short, long)]
        score: String,
        #[clap(short, long)]
        name: Option<String>,
        #[clap(short, long)]
        focus: Option<String>,
        /// overall session budget in minutes
        #[clap(short, long)]
        duration: Option<String>,
        /// HIGHLIGHT:METHOD:MINUTES[:NOTES], repeatable; defaults to the current rows
        #[clap(long = "section")]
        sections: Vec<String>,
        /// create another plan instead of updating the latest one
        #[clap(long)]
        new: bool,
    },
    /// list plans of a score
    List {
        #[clap(short, long)]
        score: String,
    },
    /// show one plan in detail
    Show {
        #[clap(long)]
        id: i64,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config_store = match &cli.config {
        Some(path) => FileConfigStore::with_path(path),
        None => FileConfigStore::new(),
    };
    let config = config_store.load();

    let store = match cli.db.as_ref().or(config.db_path.as_ref()) {
        Some(path) => PracticeStore::open(path)?,
        None => PracticeStore::open_default()?,
    };

    match cli.command {
        Command::Highlight { action } => run_highlight(&store, action),
        Command::Plan { action } => run_plan(&store, &config, action),
        Command::Run { score, plan_id } => {
            if !stdin().is_tty() {
                let mut cmd = Cli::command();
                cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
            }
            run_session(&store, &config, &score, plan_id)
        }
        Command::History { score, csv } => {
            if csv {
                store.export_history_csv(score.as_deref(), io::stdout())?;
            } else {
                print_history(&store, score.as_deref())?;
            }
            Ok(())
        }
    }
}

fn run_highlight(store: &PracticeStore, action: HighlightCommand) -> Result<(), Box<dyn Error>> {
    match action {
        HighlightCommand::Add {
            score,
            id,
            label,
            measures,
        } => {
            let (start_measure, end_measure) = match measures.as_deref() {
                Some(m) => parse_measures(m).ok_or_else(|| format!("invalid measure range '{m}'"))?,
                None => (None, None),
            };
            let highlight = Highlight {
                id,
                score_id: score,
                label,
                start_measure,
                end_measure,
            };
            store.add_highlight(&highlight)?;
            println!("✓ highlight {}: {}", highlight.id, highlight.describe());
        }
        HighlightCommand::List { score } => {
            let highlights = store.load_highlights(&score)?;
            if highlights.is_empty() {
                println!("no highlights for score {score}");
            }
            for h in highlights {
                println!("{:<12} {}", h.id, h.describe());
            }
        }
    }
    Ok(())
}

fn run_plan(
    store: &PracticeStore,
    config: &Config,
    action: PlanCommand,
) -> Result<(), Box<dyn Error>> {
    match action {
        PlanCommand::Save {
            score,
            name,
            focus,
            duration,
            sections,
            new,
        } => {
            let mut editor = PlanEditor::new(PlanDefaults::from(config));
            editor.open_score(store, &score)?;
            if new {
                editor.start_new_plan();
            }

            let (current_rows, current_header) = editor.editable_entries(store)?;
            let rows = if sections.is_empty() {
                current_rows
            } else {
                sections.iter().map(|s| parse_section_arg(s)).collect()
            };
            let header = PlanHeader {
                name: name.unwrap_or(current_header.name),
                focus: focus.or(current_header.focus),
                duration_minutes: duration.or(current_header.duration_minutes),
            };

            let id = editor.save(store, &rows, &header)?;
            if let Some(plan) = editor.loaded() {
                println!(
                    "✓ saved plan {id} '{}' ({} sections, ~{} min)",
                    plan.name,
                    plan.total_sections,
                    format_minutes(plan.estimated_time_minutes)
                );
                warn_if_over_budget(plan);
            }
        }
        PlanCommand::List { score } => {
            let plans = store.load_plans_for_score(&score)?;
            if plans.is_empty() {
                println!("no plans for score {score}");
            }
            for plan in plans {
                println!(
                    "{:>4}  {:<28} {:>2} sections  ~{} / {} min  focus: {}",
                    plan.id.unwrap_or_default(),
                    plan.name,
                    plan.total_sections,
                    format_minutes(plan.estimated_time_minutes),
                    plan.duration_minutes,
                    plan.focus
                );
            }
        }
        PlanCommand::Show { id } => {
            let plan = store.load_plan(id)?;
            print_plan(&plan);
        }
    }
    Ok(())
}

fn run_session(
    store: &PracticeStore,
    config: &Config,
    score: &str,
    plan_id: Option<i64>,
) -> Result<(), Box<dyn Error>> {
    let plan = match plan_id {
        Some(id) => store.load_plan(id)?,
        None => {
            let mut editor = PlanEditor::new(PlanDefaults::from(config));
            editor.open_score(store, score)?;
            let (rows, header) = editor.editable_entries(store)?;
            editor.preview(&rows, &header)
        }
    };
    print_plan(&plan);

    let highlights = store
        .load_highlights(plan.score_id.as_deref().unwrap_or(score))?
        .into_iter()
        .map(|h| (h.id.clone(), h))
        .collect();

    let mut orchestrator =
        SessionOrchestrator::new(TerminalDisplay::default(), TerminalFocus { highlights });
    let runner = Runner::new(CrosstermEventSource::new(), FixedTicker::new(config.tick_interval()));
    let mut controls = Controls::new();

    enable_raw_mode()?;
    let started = runner.start_session(&mut orchestrator, plan);
    if started.is_ok() {
        while orchestrator.is_active() {
            let event = runner.drive(&mut orchestrator, &mut controls);
            if matches!(event, PracticeEvent::Key(_) | PracticeEvent::Resize) {
                let display = orchestrator.observer_mut();
                display.draft = controls.note_draft().map(str::to_string);
                display.draw_status();
            }
        }
    }
    disable_raw_mode()?;
    started?;

    if let Some(summary) = orchestrator.observer_mut().summary.take() {
        print_summary(&summary);
        if let Err(e) = store.record_session(&summary) {
            eprintln!("could not record session history: {e}");
        }
    }
    Ok(())
}

/// Writes session progress straight to the (raw mode) terminal
#[derive(Debug, Default)]
struct TerminalDisplay {
    current: Option<SessionSnapshot>,
    draft: Option<String>,
    summary: Option<SessionSummary>,
}

impl TerminalDisplay {
    fn draw_status(&self) {
        let Some(snap) = &self.current else {
            return;
        };
        let line = match &self.draft {
            Some(draft) => format!("note> {draft}"),
            None => format!(
                "{} {}  section {}/{}  {}{}",
                if snap.is_paused { "⏸" } else { "⏱" },
                format_clock(snap.remaining_secs),
                snap.section_index + 1,
                snap.total_sections,
                snap.practice_method,
                if snap.is_paused { "  (paused)" } else { "" }
            ),
        };

        let mut out = io::stdout();
        let _ = queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine), Print(line));
        let _ = out.flush();
    }

    fn println(&self, text: &str) {
        let mut out = io::stdout();
        let _ = queue!(
            out,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(text),
            Print("\r\n")
        );
        let _ = out.flush();
    }
}

impl SessionObserver for TerminalDisplay {
    fn notify(&mut self, notice: &SessionNotice) {
        match notice {
            SessionNotice::SectionStarted(snap) => {
                let mut line = format!(
                    "── section {}/{}: {} for {}",
                    snap.section_index + 1,
                    snap.total_sections,
                    snap.practice_method,
                    format_clock(snap.target_secs)
                );
                if let Some(notes) = &snap.section_notes {
                    line.push_str(&format!("  ({notes})"));
                }
                self.println(&line);
                self.current = Some(snap.clone());
            }
            SessionNotice::Tick { remaining_secs } => {
                if let Some(snap) = self.current.as_mut() {
                    snap.remaining_secs = *remaining_secs;
                }
            }
            SessionNotice::PauseChanged { paused } => {
                if let Some(snap) = self.current.as_mut() {
                    snap.is_paused = *paused;
                }
            }
            SessionNotice::SectionAdvanced { .. } => {}
            SessionNotice::SessionCompleted(summary) | SessionNotice::SessionExited(summary) => {
                self.println(match summary.outcome {
                    SessionOutcome::Completed => "✓ session complete",
                    SessionOutcome::Exited => "session ended early",
                });
                self.current = None;
                self.summary = Some(summary.clone());
                return;
            }
        }
        self.draw_status();
    }
}

/// Announces the passage to play; the terminal has no score to scroll
struct TerminalFocus {
    highlights: HashMap<String, Highlight>,
}

impl HighlightFocus for TerminalFocus {
    fn focus_on_highlight(
        &mut self,
        highlight_id: &str,
        _options: &FocusOptions,
    ) -> Result<(), FocusError> {
        let highlight = self
            .highlights
            .get(highlight_id)
            .ok_or_else(|| FocusError(format!("unknown highlight {highlight_id}")))?;
        let mut out = io::stdout();
        let _ = queue!(
            out,
            MoveToColumn(0),
            Print(format!("▶ {}\r\n", highlight.describe()))
        );
        let _ = out.flush();
        Ok(())
    }

    fn exit_focus_mode(&mut self) -> Result<(), FocusError> {
        Ok(())
    }
}

fn print_plan(plan: &PracticePlan) {
    println!(
        "{} · focus {} · {} sections · ~{} of {} min",
        plan.name,
        plan.focus,
        plan.total_sections,
        format_minutes(plan.estimated_time_minutes),
        plan.duration_minutes
    );
    for (i, s) in plan.sections.iter().enumerate() {
        let notes = s.notes.as_deref().map(|n| format!("  {n}")).unwrap_or_default();
        println!(
            "  {:>2}. {:<12} {:<16} {:>5} min{notes}",
            i + 1,
            s.highlight_id,
            s.practice_method.to_string(),
            format_minutes(s.target_time_minutes)
        );
    }
    warn_if_over_budget(plan);
}

fn warn_if_over_budget(plan: &PracticePlan) {
    if plan.over_budget() {
        println!(
            "! sections add up to {} min, over the {} min budget",
            format_minutes(plan.estimated_time_minutes),
            plan.duration_minutes
        );
    }
}

fn print_summary(summary: &SessionSummary) {
    println!(
        "{}: {}/{} sections in {} (planned ~{} min)",
        summary.plan_name,
        summary.sections_completed,
        summary.total_sections,
        format_clock(summary.elapsed_secs),
        format_minutes(summary.estimated_time_minutes)
    );
    for (idx, note) in &summary.section_notes {
        println!("  #{}: {}", idx + 1, note.lines().join(" / "));
    }
}

fn print_history(store: &PracticeStore, score: Option<&str>) -> Result<(), Box<dyn Error>> {
    let records = store.session_history(score)?;
    if records.is_empty() {
        println!("no sessions recorded yet");
    }
    for record in records {
        let s = &record.summary;
        println!(
            "{}  {:<24} {:<9} {}/{} sections  {}",
            s.started_at.format("%Y-%m-%d %H:%M"),
            s.plan_name,
            s.outcome.to_string(),
            s.sections_completed,
            s.total_sections,
            format_clock(s.elapsed_secs)
        );
    }
    Ok(())
}

/// `HIGHLIGHT:METHOD:MINUTES[:NOTES]`; missing parts are left for the builder to default
fn parse_section_arg(raw: &str) -> SectionEntry {
    let mut parts = raw.splitn(4, ':');
    let mut next = || parts.next().map(str::to_string).filter(|s| !s.trim().is_empty());
    SectionEntry {
        highlight_id: next().unwrap_or_default(),
        practice_method: next(),
        target_time_minutes: next(),
        notes: next(),
    }
}

fn parse_measures(raw: &str) -> Option<(Option<u32>, Option<u32>)> {
    match raw.split_once('-') {
        Some((a, b)) => {
            let (a, b) = (a.trim().parse().ok()?, b.trim().parse().ok()?);
            (a <= b).then_some((Some(a), Some(b)))
        }
        None => raw.trim().parse().ok().map(|m| (Some(m), Some(m))),
    }
}

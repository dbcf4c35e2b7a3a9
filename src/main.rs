// Degree Planner - Command Line
//
// Works against the same SQLite database as the server, as a single user.
// Every command signs in (loading stored progress), applies its change, then
// flushes the resulting writes before exiting.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use degree_planner::calendar::{self, AcademicCalendar};
use degree_planner::logging::init_tracing;
use degree_planner::reconciliation::CategoryDetail;
use degree_planner::{
    load_csv, AuthEvent, Config, MutationOutcome, Planner, ProgressReport, SqliteProgressStore,
    SyncQueue, UserSession,
};

#[derive(Parser)]
#[command(name = "degree-planner")]
#[command(about = "Track progress toward the Rutgers CS degree")]
struct Cli {
    #[command(flatten)]
    config: Config,

    /// User whose progress is read and written
    #[arg(long, env = "DEGREE_PLANNER_USER", default_value = "local")]
    user: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show credits and per-category progress
    Progress,
    /// Mark a course (or a generic category key) complete
    Add { code: String },
    /// Unmark a course
    Remove { code: String },
    /// Import completed courses from a CSV (code,name,credits,semester)
    Import { csv: PathBuf },
    /// Show upcoming academic dates
    Calendar {
        #[arg(long, default_value = "5")]
        count: usize,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    cli.config.validate()?;
    init_tracing(&cli.config.log_level);

    let today = chrono::Local::now().date_naive();
    let academic_calendar = AcademicCalendar::builtin()?;

    if let Command::Calendar { count } = cli.command {
        return show_calendar(&academic_calendar, today, count);
    }

    let store = SqliteProgressStore::open(&cli.config.db)?;
    let catalog = Arc::new(cli.config.load_catalog()?);
    let term = cli.config.current_term(Some(&academic_calendar), today);

    let mut planner = Planner::new(catalog, &term);
    planner.handle_auth_event(AuthEvent::SignedIn(UserSession::new(&cli.user)), &store);

    match &cli.command {
        Command::Progress => print_report(&planner.report()),
        Command::Add { code } => print_outcome(&planner.add_completed_course(code)),
        Command::Remove { code } => print_outcome(&planner.remove_completed_course(code)),
        Command::Import { csv } => {
            println!("📂 Loading CSV...");
            let records = load_csv(csv)?;
            println!("✓ Loaded {} courses from {:?}", records.len(), csv);

            let outcome = planner.apply_identified_courses(records);
            println!("✓ Added {} courses", outcome.added.len());
            if !outcome.evicted.is_empty() {
                println!("✓ Replaced {} courses in exclusive groups", outcome.evicted.len());
            }
            if !outcome.skipped.is_empty() {
                println!("✓ Skipped {} already completed", outcome.skipped.len());
            }
        }
        Command::Calendar { .. } => {}
    }

    let mut queue = SyncQueue::new(cli.config.retry_policy());
    queue.enqueue(planner.drain_outbox());
    let report = queue.flush_blocking(&store);

    if report.abandoned > 0 {
        bail!(
            "{} change(s) could not be saved to {:?}",
            report.abandoned,
            cli.config.db
        );
    }

    if report.applied > 0 {
        println!("\n{}", planner.report().summary());
    }

    Ok(())
}

fn print_outcome(outcome: &MutationOutcome) {
    match outcome {
        MutationOutcome::Added { record, evicted } => {
            println!("✅ Completed {} - {} ({} credits)", record.code, record.name, record.credits);
            for old in evicted {
                println!("   ↳ replaced {} - {}", old.code, old.name);
            }
        }
        MutationOutcome::Removed { record } => {
            println!("🗑️  Removed {} - {}", record.code, record.name);
        }
        MutationOutcome::Skipped { code, reason } => {
            println!("⚠️  Skipped {}: {:?}", code, reason);
        }
    }
}

fn print_report(report: &ProgressReport) {
    println!("🎓 {}", report.catalog);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "Credits: {}/{} ({}%)",
        report.completed_credits, report.total_credits, report.percentage
    );
    if report.graduated {
        println!("🎉 All credits complete!");
    }

    for category in &report.categories {
        let mark = if category.complete { "✅" } else { "⬜" };
        println!(
            "\n{} {} ({}/{} credits)",
            mark, category.name, category.completed_credits, category.target_credits
        );

        match &category.detail {
            CategoryDetail::Flat { courses } => {
                for course in courses.iter().filter(|c| c.completed) {
                    println!("   ✓ {} {}", course.code, course.name);
                }
            }
            CategoryDetail::Sequenced { sequences } => {
                for seq in sequences.iter().filter(|s| s.is_started()) {
                    println!(
                        "   {} {} ({}/{} courses)",
                        if seq.complete { "✓" } else { "…" },
                        seq.name,
                        seq.completed_courses,
                        seq.required_courses
                    );
                }
            }
            CategoryDetail::Generic { completed, .. } => {
                if *completed {
                    println!("   ✓ marked complete");
                }
            }
        }
    }
}

fn show_calendar(academic_calendar: &AcademicCalendar, today: chrono::NaiveDate, count: usize) -> Result<()> {
    println!("📅 Academic year {}", calendar::academic_year_for(today));
    if let Some(term) = academic_calendar.term_for(today) {
        println!("   Current term: {}", term.label);
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let events = academic_calendar.upcoming_events(today, count);
    if events.is_empty() {
        println!("No upcoming dates in the calendar");
    }
    for upcoming in events {
        let event = &upcoming.event;
        if event.start() == event.end() {
            println!("{}  {}", event.start(), event.name);
        } else {
            println!("{} → {}  {}", event.start(), event.end(), event.name);
        }
    }

    Ok(())
}

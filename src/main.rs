mod ai;
mod apps;
mod budget;
mod config;
mod db;
mod errors;
mod ingest;
mod jobs;
mod models;
mod profile;
mod rank;
mod server;
mod sources;
mod triage;

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};

use ai::{LlmRanker, LlmTriage};
use apps::{NewApplicationInput, UpdateApplicationInput};
use budget::DailyBudget;
use config::Config;
use db::{ApplicationFilter, Database, JobFilter, TriageFilter};
use jobs::ManualJobInput;
use models::{Application, ApplicationStatus, Priority, TriageStatus};
use sources::{SourceQuery, SourceRouter};
use triage::{TriageInput, TriageMode};

#[derive(Parser)]
#[command(name = "pursuit")]
#[command(about = "Personal job-application tracker - ingest, triage, rank, follow up")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Pull jobs from the configured feeds
    Ingest {
        /// Only pull from one source (Remotive, "Remote OK", WWR, Web3)
        #[arg(short, long)]
        source: Option<String>,

        /// Maximum records to keep after the merge
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show today's ingestion budget
    IngestStatus,

    /// Triage jobs against the scoring profile
    Triage {
        /// "new" (untriaged only) or "recent" (re-triage the last days)
        #[arg(short, long, default_value = "new")]
        mode: String,

        /// Look-back window for recent mode
        #[arg(short, long)]
        days: Option<i64>,
    },

    /// Rank shortlisted jobs
    Rank {
        /// Maximum jobs to consider
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Browse and add job postings
    Jobs {
        #[command(subcommand)]
        command: JobCommands,
    },

    /// Save a job as an application
    Save {
        /// Job ID
        job_id: i64,
    },

    /// Manage applications
    Apps {
        #[command(subcommand)]
        command: AppCommands,
    },

    /// Follow-ups grouped by due date
    Inbox,

    /// Show the scoring profile
    Profile,

    /// Run the HTTP API
    Serve {
        #[arg(short, long, default_value = "7878")]
        port: u16,
    },
}

#[derive(Subcommand)]
enum JobCommands {
    /// List jobs
    List {
        /// Substring match on role or company
        #[arg(short, long)]
        search: Option<String>,

        /// Filter by seniority
        #[arg(long)]
        seniority: Option<String>,

        /// Filter by source
        #[arg(long)]
        source: Option<String>,

        /// Require a tag (repeatable)
        #[arg(short, long)]
        tag: Vec<String>,

        /// untriaged, shortlist, maybe, or reject
        #[arg(long)]
        triage: Option<String>,

        /// Number of jobs to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show job details
    Show {
        /// Job ID
        id: i64,
    },

    /// Add a job posting by hand
    Add {
        /// Role title
        role: String,

        /// Company name
        company: String,

        /// Posting URL
        #[arg(short, long)]
        url: Option<String>,

        #[arg(long)]
        location: Option<String>,

        #[arg(long)]
        seniority: Option<String>,

        /// Tag (repeatable)
        #[arg(short, long)]
        tag: Vec<String>,

        /// Description text
        #[arg(short, long)]
        description: Option<String>,

        /// Read the description from a file
        #[arg(long, conflicts_with = "description")]
        description_file: Option<PathBuf>,

        /// Skip the automatic coarse triage
        #[arg(long)]
        no_triage: bool,
    },
}

#[derive(Subcommand)]
enum AppCommands {
    /// List applications
    List {
        /// Substring match on company or role
        #[arg(short, long)]
        search: Option<String>,

        /// Filter by status (saved, applied, screen, tech, offer, rejected, ghosted, archived)
        #[arg(long)]
        status: Option<String>,

        /// Filter by priority (low, medium, high)
        #[arg(long)]
        priority: Option<String>,
    },

    /// Show an application and its history
    Show {
        /// Application ID
        id: i64,
    },

    /// Add an application by hand
    Add {
        /// Company name
        company: String,

        /// Role title
        role: String,

        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        priority: Option<String>,

        /// Follow-up date (YYYY-MM-DD)
        #[arg(long)]
        next_action: Option<String>,

        #[arg(long)]
        source: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Update an application
    Update {
        /// Application ID
        id: i64,

        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        priority: Option<String>,

        /// Follow-up date (YYYY-MM-DD)
        #[arg(long)]
        next_action: Option<String>,

        /// Clear the follow-up date
        #[arg(long, conflicts_with = "next_action")]
        clear_next_action: bool,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Archive an application
    Archive {
        /// Application ID
        id: i64,
    },
}

fn parse_status(value: &str) -> Result<ApplicationStatus> {
    ApplicationStatus::parse(value).ok_or_else(|| anyhow!("Unknown status: {value}"))
}

fn parse_priority(value: &str) -> Result<Priority> {
    Priority::parse(value).ok_or_else(|| anyhow!("Unknown priority: {value}"))
}

fn parse_triage_filter(value: &str) -> Result<TriageFilter> {
    if value.trim().eq_ignore_ascii_case("untriaged") {
        return Ok(TriageFilter::Untriaged);
    }
    TriageStatus::parse(value)
        .map(TriageFilter::Status)
        .ok_or_else(|| anyhow!("Unknown triage filter: {value}"))
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pursuit=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let db = match &config.db_path {
        Some(path) => Database::open_at(path.clone())?,
        None => Database::open()?,
    };

    match cli.command {
        Commands::Init => {
            db.init()?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Ingest { source, limit } => {
            db.ensure_initialized()?;
            let router = SourceRouter::from_config(&config)?;
            let since = ingest::start_of_today(Local::now());
            let outcome = ingest::ingest_jobs(
                &db,
                &router,
                config.ingest_daily_cap,
                &SourceQuery { source, limit },
                Utc::now(),
                &since,
            )?;
            println!(
                "Fetched {} record(s): {} created, {} updated.",
                outcome.fetched, outcome.created, outcome.updated
            );
            println!(
                "Ingest budget: {}/{} used today ({} remaining).",
                outcome.used, outcome.limit, outcome.remaining
            );
        }

        Commands::IngestStatus => {
            db.ensure_initialized()?;
            let since = ingest::start_of_today(Local::now());
            let status = ingest::ingest_status(&db, config.ingest_daily_cap, &since)?;
            println!(
                "Ingest budget: {}/{} used today ({} remaining).",
                status.used, status.limit, status.remaining
            );
        }

        Commands::Triage { mode, days } => {
            db.ensure_initialized()?;
            let triage_port = LlmTriage::from_config(&config)?;
            let profile = profile::load_profile(config.profile_path.as_deref())?;
            let mut budget = DailyBudget::new(config.openai_daily_cap);
            let outcome = triage::triage_jobs(
                &db,
                &triage_port,
                &profile,
                &mut budget,
                Utc::now(),
                TriageInput {
                    mode: TriageMode::parse(&mode),
                    days,
                },
            )?;
            println!(
                "Processed {} job(s): {} triaged, {} skipped.",
                outcome.processed, outcome.triaged, outcome.skipped
            );
            println!(
                "Disambiguation: {} call(s) made, {} skipped by the daily cap.",
                outcome.openai_used, outcome.openai_skipped_cap
            );
        }

        Commands::Rank { limit } => {
            db.ensure_initialized()?;
            let ranker = LlmRanker::from_config(&config)?;
            let profile = profile::load_profile(config.profile_path.as_deref())?;
            let outcome = rank::rank_shortlist(&db, &ranker, &profile, limit, Utc::now())?;
            println!(
                "Ranked {} of {} shortlisted job(s) with {} ({} skipped).",
                outcome.ranked,
                outcome.processed,
                outcome.provider.as_str(),
                outcome.skipped
            );
        }

        Commands::Jobs { command } => {
            db.ensure_initialized()?;
            match command {
                JobCommands::List {
                    search,
                    seniority,
                    source,
                    tag,
                    triage,
                    limit,
                } => {
                    let filter = JobFilter {
                        search,
                        seniority,
                        source,
                        tags: tag,
                        triage: triage.as_deref().map(parse_triage_filter).transpose()?,
                    };
                    let jobs = db.list_jobs(&filter)?;
                    if jobs.is_empty() {
                        println!("No jobs found.");
                    } else {
                        println!(
                            "{:<6} {:<10} {:>5} {:<30} {:<20} {:<10}",
                            "ID", "TRIAGE", "RANK", "ROLE", "COMPANY", "SOURCE"
                        );
                        println!("{}", "-".repeat(86));
                        for job in jobs.iter().take(limit) {
                            let rank = job
                                .rank_score
                                .map(|score| score.to_string())
                                .unwrap_or_else(|| "-".to_string());
                            println!(
                                "{:<6} {:<10} {:>5} {:<30} {:<20} {:<10}",
                                job.id,
                                job.triage_status.map(|s| s.as_str()).unwrap_or("-"),
                                rank,
                                truncate(&job.role, 28),
                                truncate(&job.company, 18),
                                truncate(&job.source, 10)
                            );
                        }
                        if jobs.len() > limit {
                            println!("... and {} more (raise --limit to see them)", jobs.len() - limit);
                        }
                    }
                }

                JobCommands::Show { id } => match db.get_job(id)? {
                    Some(job) => {
                        println!("Job #{}", job.id);
                        println!("Role: {}", job.role);
                        println!("Company: {}", job.company);
                        println!("Location: {}", job.location);
                        println!("Seniority: {}", job.seniority);
                        if !job.tags.is_empty() {
                            println!("Tags: {}", job.tags.join(", "));
                        }
                        println!("Source: {}", job.source);
                        if let Some(url) = &job.source_url {
                            println!("URL: {}", url);
                        }
                        if let Some(published) = &job.published_at {
                            println!("Published: {}", published);
                        }
                        match job.triage_status {
                            Some(status) => {
                                let provider =
                                    job.triage_provider.map(|p| p.as_str()).unwrap_or("?");
                                let version = job
                                    .triage_version
                                    .map(|v| v.to_string())
                                    .unwrap_or_else(|| "?".to_string());
                                println!(
                                    "Triage: {} (profile v{}, via {})",
                                    status.as_str(),
                                    version,
                                    provider
                                );
                                for reason in &job.triage_reasons {
                                    println!("  - {}", reason);
                                }
                            }
                            None => println!("Triage: pending"),
                        }
                        if let Some(score) = job.rank_score {
                            println!("Rank: {}/100", score);
                            if let Some(reason) = &job.rank_reason {
                                println!("{}", textwrap::indent(&textwrap::fill(reason, 74), "  "));
                            }
                        }
                        if let Some(description) = &job.description {
                            println!("\n--- Description ---\n{}", textwrap::fill(description, 78));
                        }
                    }
                    None => println!("Job #{} not found.", id),
                },

                JobCommands::Add {
                    role,
                    company,
                    url,
                    location,
                    seniority,
                    tag,
                    description,
                    description_file,
                    no_triage,
                } => {
                    let description = match (description, description_file) {
                        (Some(text), _) => Some(text),
                        (None, Some(path)) => Some(std::fs::read_to_string(&path).with_context(
                            || format!("Failed to read description file: {}", path.display()),
                        )?),
                        (None, None) => None,
                    };
                    let triage_port = LlmTriage::from_config(&config)?;
                    let profile = profile::load_profile(config.profile_path.as_deref())?;
                    let outcome = jobs::create_manual_job(
                        &db,
                        &triage_port,
                        &profile,
                        ManualJobInput {
                            role,
                            company,
                            source_url: url,
                            location,
                            seniority,
                            tags: tag,
                            description,
                            published_at: None,
                            auto_triage: if no_triage { Some(false) } else { None },
                        },
                        Utc::now(),
                    )?;
                    println!(
                        "Added job #{} ({} at {})",
                        outcome.job.id, outcome.job.role, outcome.job.company
                    );
                    if outcome.triage.attempted {
                        match (&outcome.triage.error, outcome.job.triage_status) {
                            (Some(error), _) => println!("Auto-triage failed: {}", error),
                            (None, Some(status)) => println!("Auto-triage: {}", status.as_str()),
                            (None, None) => println!("Auto-triage made no decision."),
                        }
                    }
                }
            }
        }

        Commands::Save { job_id } => {
            db.ensure_initialized()?;
            let application = apps::save_job_as_application(&db, job_id, Local::now())?;
            println!(
                "Saved as application #{} ({} at {}), follow up on {}.",
                application.id,
                application.role,
                application.company,
                application.next_action_at.as_deref().unwrap_or("-")
            );
        }

        Commands::Apps { command } => {
            db.ensure_initialized()?;
            match command {
                AppCommands::List {
                    search,
                    status,
                    priority,
                } => {
                    let filter = ApplicationFilter {
                        search,
                        status: status.as_deref().map(parse_status).transpose()?,
                        priority: priority.as_deref().map(parse_priority).transpose()?,
                        ..Default::default()
                    };
                    let applications = db.list_applications(&filter)?;
                    if applications.is_empty() {
                        println!("No applications found.");
                    } else {
                        println!(
                            "{:<6} {:<10} {:<8} {:<20} {:<28} {:<12}",
                            "ID", "STATUS", "PRIO", "COMPANY", "ROLE", "NEXT ACTION"
                        );
                        println!("{}", "-".repeat(88));
                        for application in applications {
                            println!(
                                "{:<6} {:<10} {:<8} {:<20} {:<28} {:<12}",
                                application.id,
                                application.status.as_str(),
                                application.priority.as_str(),
                                truncate(&application.company, 18),
                                truncate(&application.role, 26),
                                application.next_action_at.as_deref().unwrap_or("-")
                            );
                        }
                    }
                }

                AppCommands::Show { id } => match db.get_application(id)? {
                    Some(application) => {
                        println!("Application #{}", application.id);
                        println!("Company: {}", application.company);
                        println!("Role: {}", application.role);
                        println!("Status: {}", application.status.as_str());
                        println!("Priority: {}", application.priority.as_str());
                        if let Some(job_id) = application.job_id {
                            println!("Job: #{}", job_id);
                        }
                        println!("Source: {}", application.source);
                        if let Some(date) = &application.next_action_at {
                            println!("Next action: {}", date);
                        }
                        if !application.notes.is_empty() {
                            println!("Notes: {}", textwrap::fill(&application.notes, 78));
                        }
                        println!("Created: {}", application.created_at);
                        println!("Updated: {}", application.updated_at);

                        let log = db.list_application_logs(application.id, None)?;
                        if !log.is_empty() {
                            println!("\nHistory:");
                            for entry in log {
                                println!(
                                    "  {} [{}] {}",
                                    entry.created_at,
                                    entry.kind.as_str(),
                                    entry.message
                                );
                            }
                        }
                    }
                    None => println!("Application #{} not found.", id),
                },

                AppCommands::Add {
                    company,
                    role,
                    status,
                    priority,
                    next_action,
                    source,
                    notes,
                } => {
                    let application = apps::create_application(
                        &db,
                        NewApplicationInput {
                            company,
                            role,
                            status: status.as_deref().map(parse_status).transpose()?,
                            priority: priority.as_deref().map(parse_priority).transpose()?,
                            next_action_at: next_action,
                            source,
                            notes,
                        },
                        Local::now(),
                    )?;
                    println!(
                        "Added application #{} ({} at {})",
                        application.id, application.role, application.company
                    );
                }

                AppCommands::Update {
                    id,
                    status,
                    priority,
                    next_action,
                    clear_next_action,
                    notes,
                } => {
                    let next_action_at = if clear_next_action {
                        Some(None)
                    } else {
                        next_action.map(Some)
                    };
                    let application = apps::update_application(
                        &db,
                        UpdateApplicationInput {
                            id,
                            status: status.as_deref().map(parse_status).transpose()?,
                            priority: priority.as_deref().map(parse_priority).transpose()?,
                            next_action_at,
                            notes,
                        },
                        Local::now(),
                    )?;
                    println!(
                        "Updated application #{} (status: {}).",
                        application.id,
                        application.status.as_str()
                    );
                }

                AppCommands::Archive { id } => {
                    let application = apps::archive_application(&db, id, Local::now())?;
                    println!("Archived application #{}.", application.id);
                }
            }
        }

        Commands::Inbox => {
            db.ensure_initialized()?;
            let today = apps::date_only(Local::now());
            let groups = apps::list_inbox(&db, &today)?;
            if groups.overdue.is_empty() && groups.today.is_empty() && groups.upcoming.is_empty() {
                println!("Nothing in the inbox.");
            } else {
                print_inbox_group("OVERDUE", &groups.overdue);
                print_inbox_group("TODAY", &groups.today);
                print_inbox_group("UPCOMING", &groups.upcoming);
            }
        }

        Commands::Profile => {
            let path = profile::profile_path(config.profile_path.as_deref())?;
            let profile = profile::load_profile(config.profile_path.as_deref())?;
            println!("Profile v{} ({})", profile.profile_version, path.display());
            print_keywords("Must have", &profile.must_have_keywords);
            print_keywords("Hard no", &profile.hard_no_keywords);
            print_keywords("Preferred", &profile.preferred_keywords);
            print_keywords("Excluded", &profile.excluded_keywords);
            if !profile.notes.is_empty() {
                println!("Notes: {}", textwrap::fill(&profile.notes, 78));
            }
        }

        Commands::Serve { port } => {
            db.ensure_initialized()?;
            server::run(db, config, port)?;
        }
    }

    Ok(())
}

fn print_inbox_group(title: &str, items: &[Application]) {
    if items.is_empty() {
        return;
    }
    println!("{} ({}):", title, items.len());
    for application in items {
        println!(
            "  #{:<5} {:<20} {:<26} due {}",
            application.id,
            truncate(&application.company, 18),
            truncate(&application.role, 24),
            application.next_action_at.as_deref().unwrap_or("-")
        );
    }
    println!();
}

fn print_keywords(label: &str, keywords: &[String]) {
    if keywords.is_empty() {
        println!("{}: -", label);
    } else {
        println!("{}: {}", label, keywords.join(", "));
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

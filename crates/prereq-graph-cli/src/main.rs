//! prereq-graph CLI - reviewer and operator tooling for the prerequisite graph

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use prereq_graph_core::PrerequisiteGraphService;
use prereq_graph_core::config::Config;
use prereq_graph_core::domain::hints::{HintFilter, HintStatus, UnresolvedConceptHint};
use prereq_graph_core::domain::prerequisites::{
    LabelOnlyMergeKind, MergeTarget, Prerequisite, PrerequisiteQuery, PrerequisiteSort,
    PrerequisiteStatus,
};
use prereq_graph_core::storage::{Database, DatabaseConfig, import_snapshot_file};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Parser)]
#[command(name = "prereq-graph")]
#[command(author, version, about = "Prerequisite graph for exam topics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database file (defaults to the configured path)
    #[arg(long, global = true, env = "PREREQ_GRAPH_DB")]
    db: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Fold one analyzed question into the graph
    Ingest {
        /// Question ID
        question_id: i64,
    },

    /// Re-ingest every completed question that has a topic
    IngestAll,

    /// Find or create the label-only prerequisite for a free-text label
    Label {
        /// Label text
        label: String,
    },

    /// Prerequisites of a topic, strongest first
    Topic {
        /// Topic ID
        topic_id: i64,
    },

    /// Topics that need a prerequisite, looked up by name
    TopicsFor {
        /// Prerequisite name or display name
        name: String,
    },

    /// List prerequisites
    List {
        /// Filter by status (active, needs_review, deprecated)
        #[arg(short, long, value_parser = parse_status)]
        status: Option<PrerequisiteStatus>,
        /// Only nodes with an edge into this lesson (by name)
        #[arg(short, long)]
        lesson: Option<String>,
        /// Substring match on name or display name
        #[arg(long)]
        search: Option<String>,
        /// Sort order (frequency, name, topic_count, recent)
        #[arg(long, default_value = "frequency", value_parser = parse_sort)]
        sort: PrerequisiteSort,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        page_size: u32,
    },

    /// Show a prerequisite with importance, rank and topics
    Show {
        /// Prerequisite ID
        id: i64,
        /// Rank importance within this lesson
        #[arg(short, long)]
        lesson: Option<String>,
        /// Include evidence questions
        #[arg(long)]
        evidence: bool,
    },

    /// Suggest merge candidates for a prerequisite
    Candidates {
        /// Prerequisite ID
        id: i64,
        /// Restrict candidates to this lesson (by name)
        #[arg(short, long)]
        lesson: Option<String>,
    },

    /// Merge two or more prerequisites into one
    Merge {
        /// Prerequisite IDs to merge
        #[arg(required = true, num_args = 2..)]
        ids: Vec<i64>,
        /// Keep this node (must be one of the IDs)
        #[arg(long, conflicts_with = "target_name", required_unless_present = "target_name")]
        target_id: Option<i64>,
        /// Merge into the node with this label, creating it if needed
        #[arg(long)]
        target_name: Option<String>,
    },

    /// Attach concepts to a label-only prerequisite
    Upgrade {
        /// Label-only prerequisite ID
        id: i64,
        /// Concept IDs (comma separated)
        #[arg(long, value_delimiter = ',', required = true)]
        concepts: Vec<i64>,
        /// New display label
        #[arg(long)]
        label: Option<String>,
    },

    /// Replace the concept links of a prerequisite
    Link {
        /// Prerequisite ID
        id: i64,
        /// Concept IDs (comma separated)
        #[arg(long, value_delimiter = ',', required = true)]
        concepts: Vec<i64>,
    },

    /// Mark a prerequisite as deprecated
    Deprecate {
        /// Prerequisite ID
        id: i64,
    },

    /// Graph-wide statistics
    Analytics {
        /// Number of top prerequisites to show
        #[arg(long)]
        top: Option<usize>,
    },

    /// Learning path for a topic
    Path {
        /// Topic ID
        topic_id: i64,
    },

    /// Whether advanced content for a topic should be held back
    Gate {
        /// Topic ID
        topic_id: i64,
    },

    /// Unresolved concept hints
    Hints {
        #[command(subcommand)]
        action: HintAction,
    },

    /// Recent structural changes
    Events {
        /// Only events for this prerequisite
        #[arg(short, long)]
        prerequisite: Option<i64>,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Import a registry snapshot (JSON)
    Import {
        /// Snapshot file
        path: PathBuf,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run health check
    Doctor,
}

#[derive(Subcommand)]
enum HintAction {
    /// List hints, most frequent first
    List {
        /// Filter by status (pending, resolved, ignored)
        #[arg(short, long, value_parser = parse_hint_status)]
        status: Option<HintStatus>,
        /// Filter by topic ID
        #[arg(short, long)]
        topic: Option<i64>,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Mark a hint as resolved
    Resolve {
        id: i64,
        #[arg(short, long)]
        note: Option<String>,
    },
    /// Stop tracking a hint
    Ignore {
        id: i64,
        #[arg(short, long)]
        note: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

fn parse_status(s: &str) -> Result<PrerequisiteStatus, String> {
    PrerequisiteStatus::parse(s)
        .ok_or_else(|| format!("unknown status '{}' (active, needs_review, deprecated)", s))
}

fn parse_hint_status(s: &str) -> Result<HintStatus, String> {
    HintStatus::parse(s).ok_or_else(|| format!("unknown status '{}' (pending, resolved, ignored)", s))
}

fn parse_sort(s: &str) -> Result<PrerequisiteSort, String> {
    PrerequisiteSort::parse(s)
        .ok_or_else(|| format!("unknown sort '{}' (frequency, name, topic_count, recent)", s))
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_level = if cli.quiet { "prereq_graph=warn" } else { "prereq_graph=info" };
    let filter = match default_level.parse() {
        Ok(directive) => tracing_subscriber::EnvFilter::from_default_env().add_directive(directive),
        Err(_) => tracing_subscriber::EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli).await {
        report_error(&err);
        std::process::exit(1);
    }
}

fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<prereq_graph_core::Error>() {
        Some(core) => {
            eprintln!("Error [{}]: {}", core.code(), core);
            if let Some(suggestion) = core.suggestion() {
                eprintln!("  Try: {}", suggestion);
            }
        }
        None => eprintln!("Error: {:#}", err),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let out = Output {
        format: cli.format,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Config { action } => return cmd_config(action, out),
        Commands::Doctor => return cmd_doctor(cli.db, out).await,
        Commands::Import { path } => return cmd_import(cli.db, &path, out).await,
        _ => {}
    }

    let config = Config::load()?;
    let db = open_database(cli.db, &config).await?;
    let service = PrerequisiteGraphService::from_database(&db, &config);

    let result = dispatch(&service, cli.command, out).await;
    db.close().await;
    result
}

async fn open_database(path: Option<PathBuf>, config: &Config) -> anyhow::Result<Database> {
    let mut db_config = DatabaseConfig::from_settings(&config.database);
    if let Some(path) = path {
        db_config.path = path;
    }
    debug!(path = %db_config.path.display(), "Opening database");
    Ok(Database::new(db_config).await?)
}

async fn dispatch(service: &PrerequisiteGraphService, command: Commands, out: Output) -> anyhow::Result<()> {
    match command {
        Commands::Ingest { question_id } => {
            let report = service.ingest(question_id).await?;
            out.emit(&report, || match &report.skipped {
                Some(reason) => println!("Question {} skipped: {}", question_id, reason),
                None => {
                    println!("Question {} ingested", question_id);
                    println!(
                        "  Candidates: {} seen, {} linked, {} unresolved, {} rejected, {} failed",
                        report.candidates_seen,
                        report.candidates_linked,
                        report.candidates_unresolved,
                        report.candidates_rejected,
                        report.candidates_failed
                    );
                    for edge in &report.edges {
                        println!(
                            "  #{} -> topic {} (frequency {}, {})",
                            edge.prerequisite_id, edge.topic_id, edge.frequency, edge.strength
                        );
                    }
                    for hint in &report.unresolved_hints {
                        println!("  unresolved hint: {}", hint);
                    }
                }
            })
        }

        Commands::IngestAll => {
            let report = service.process_all_analyzed_questions().await?;
            out.emit(&report, || {
                println!(
                    "Processed {}/{} questions in {} ms ({} skipped, {} failed)",
                    report.processed, report.total, report.elapsed_ms, report.skipped, report.failed
                );
                println!(
                    "  Edges touched: {}, unresolved hints: {}",
                    report.edges_touched, report.unresolved_hints
                );
                for failure in &report.errors {
                    println!("  [{}] question {}: {}", failure.code, failure.question_id, failure.message);
                }
            })
        }

        Commands::Label { label } => {
            let node = service.find_or_create_label_prerequisite(&label).await?;
            out.emit(&node, || print_prerequisite(&node))
        }

        Commands::Topic { topic_id } => {
            let items = service.get_topic_prerequisites(topic_id).await?;
            out.emit(&items, || {
                if items.is_empty() {
                    println!("No prerequisites recorded for topic {}.", topic_id);
                }
                for item in &items {
                    println!(
                        "  #{} {} [{}] frequency {} ({})",
                        item.prerequisite_id, item.display_name, item.strength, item.frequency, item.status
                    );
                }
            })
        }

        Commands::TopicsFor { name } => {
            let topics = service.get_prerequisite_topics(&name).await?;
            out.emit(&topics, || {
                if topics.is_empty() {
                    println!("No topics found for '{}'.", name);
                }
                for t in &topics {
                    println!(
                        "  {} / {} (topic {}) [{}] frequency {}",
                        t.lesson_name, t.topic_name, t.topic_id, t.strength, t.frequency
                    );
                }
            })
        }

        Commands::List {
            status,
            lesson,
            search,
            sort,
            page,
            page_size,
        } => {
            let query = PrerequisiteQuery {
                status,
                lesson,
                search,
                sort,
                page,
                page_size,
            };
            let result = service.get_all_prerequisites(&query).await?;
            out.emit(&result, || {
                if result.items.is_empty() {
                    println!("No prerequisites found.");
                    return;
                }
                println!(
                    "Prerequisites (page {}/{}, {} total):",
                    result.page,
                    result.total_pages(),
                    result.total
                );
                for s in &result.items {
                    println!(
                        "  #{} {} ({}) frequency {}, {} topics, {} concepts",
                        s.prerequisite.id,
                        s.prerequisite.display_name,
                        s.prerequisite.status,
                        s.total_frequency,
                        s.topic_count,
                        s.concept_count
                    );
                }
            })
        }

        Commands::Show { id, lesson, evidence } => {
            let detail = service
                .get_prerequisite_detail(id, lesson.as_deref(), evidence)
                .await?;
            out.emit(&detail, || {
                print_prerequisite(&detail.prerequisite);
                match detail.rank {
                    Some(rank) => println!(
                        "  Importance: {} (rank {} of {})",
                        detail.exam_importance, rank, detail.ranked_out_of
                    ),
                    None => println!("  Importance: 0 (unranked)"),
                }
                println!(
                    "  Pattern: {} strong, {} medium, {} weak",
                    detail.pattern.strong, detail.pattern.medium, detail.pattern.weak
                );
                if !detail.concepts.is_empty() {
                    println!("  Concepts:");
                    for c in &detail.concepts {
                        println!("    {} - {}", c.id, c.preferred_label);
                    }
                }
                if !detail.topics.is_empty() {
                    println!("  Topics:");
                    for t in &detail.topics {
                        println!(
                            "    {} / {} [{}] frequency {}",
                            t.lesson_name, t.topic_name, t.strength, t.frequency
                        );
                    }
                }
                if let Some(questions) = &detail.evidence {
                    println!("  Evidence questions: {}", questions.len());
                    for q in questions {
                        println!("    question {} (topic {})", q.question_id, q.topic_id);
                    }
                }
            })
        }

        Commands::Candidates { id, lesson } => {
            let candidates = service.find_merge_candidates(id, lesson.as_deref()).await?;
            out.emit(&candidates, || {
                if candidates.is_empty() {
                    println!("No merge candidates for #{}.", id);
                }
                for c in &candidates {
                    println!(
                        "  #{} {} ({}) score {} - {}",
                        c.prerequisite_id,
                        c.display_name,
                        c.status,
                        c.score,
                        c.reasons.join("; ")
                    );
                }
            })
        }

        Commands::Merge {
            ids,
            target_id,
            target_name,
        } => {
            let target = match (target_id, target_name) {
                (Some(id), _) => MergeTarget::Id(id),
                (None, Some(name)) => MergeTarget::Name(name),
                (None, None) => anyhow::bail!("Either --target-id or --target-name is required"),
            };
            let summary = service.merge_prerequisites(&ids, target).await?;
            out.emit(&summary, || {
                println!("Merged into #{}", summary.canonical_id);
                println!("  Removed: {:?}", summary.removed_ids);
                println!(
                    "  Concepts merged: {}, edges updated: {}",
                    summary.concepts_merged, summary.edges_updated
                );
            })
        }

        Commands::Upgrade { id, concepts, label } => {
            let outcome = service
                .merge_label_only_prerequisite(id, &concepts, label.as_deref())
                .await?;
            out.emit(&outcome, || match outcome.kind {
                LabelOnlyMergeKind::Merged { target_id } => println!(
                    "Merged #{} into existing #{} ({} edges updated)",
                    id, target_id, outcome.edges_updated
                ),
                LabelOnlyMergeKind::Upgraded => println!(
                    "Upgraded #{} in place ({} concepts linked, {} edges updated)",
                    id, outcome.concepts_linked, outcome.edges_updated
                ),
            })
        }

        Commands::Link { id, concepts } => {
            let node = service.link_concepts_to_prerequisite(id, &concepts).await?;
            out.emit(&node, || print_prerequisite(&node))
        }

        Commands::Deprecate { id } => {
            let node = service.deprecate_prerequisite(id).await?;
            out.emit(&node, || println!("Deprecated #{} {}", node.id, node.display_name))
        }

        Commands::Analytics { top } => {
            let stats = service.analytics(top).await?;
            out.emit(&stats, || {
                println!("Prerequisite Graph");
                println!("==================");
                println!(
                    "Prerequisites: {} ({} active, {} needs review, {} deprecated)",
                    stats.total_prerequisites,
                    stats.active_prerequisites,
                    stats.needs_review_prerequisites,
                    stats.deprecated_prerequisites
                );
                println!(
                    "Edges: {} ({} strong, {} medium, {} weak)",
                    stats.total_edges, stats.strong_edges, stats.medium_edges, stats.weak_edges
                );
                println!(
                    "Average prerequisites per topic: {:.2}",
                    stats.average_prerequisites_per_topic
                );
                if !stats.top_prerequisites.is_empty() {
                    println!("\nTop prerequisites by strong coverage:");
                    for entry in &stats.top_prerequisites {
                        println!(
                            "  #{} {} ({} strong topics)",
                            entry.prerequisite_id, entry.display_name, entry.strong_topic_count
                        );
                    }
                }
                if !stats.topics_without_strong_prerequisite.is_empty() {
                    println!(
                        "\nTopics without a strong prerequisite: {}",
                        stats.topics_without_strong_prerequisite.len()
                    );
                    for topic in &stats.topics_without_strong_prerequisite {
                        println!("  {} / {} (topic {})", topic.lesson_name, topic.name, topic.id);
                    }
                }
            })
        }

        Commands::Path { topic_id } => {
            let path = service.get_learning_path_for_topic(topic_id).await?;
            out.emit(&path, || {
                if path.is_empty() {
                    println!("No learning path for topic {}.", topic_id);
                }
                for (i, step) in path.iter().enumerate() {
                    println!("  {}. {}", i + 1, step);
                }
            })
        }

        Commands::Gate { topic_id } => {
            let blocked = service.should_block_advanced_content_generation(topic_id).await?;
            let body = serde_json::json!({ "topic_id": topic_id, "blocked": blocked });
            out.emit(&body, || {
                if blocked {
                    println!("Topic {}: blocked (no strong prerequisite yet)", topic_id);
                } else {
                    println!("Topic {}: open", topic_id);
                }
            })
        }

        Commands::Hints { action } => cmd_hints(service, action, out).await,

        Commands::Events { prerequisite, limit } => {
            let events = service.recent_events(prerequisite, limit).await?;
            out.emit(&events, || {
                if events.is_empty() {
                    println!("No events recorded.");
                }
                for e in &events {
                    let node = e
                        .prerequisite_id
                        .map(|id| format!("#{}", id))
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "  {} {:<18} {} {}",
                        e.created_at.to_rfc3339(),
                        e.event_type,
                        node,
                        e.payload
                    );
                }
            })
        }

        Commands::Import { .. } | Commands::Config { .. } | Commands::Doctor => Ok(()),
    }
}

async fn cmd_hints(service: &PrerequisiteGraphService, action: HintAction, out: Output) -> anyhow::Result<()> {
    match action {
        HintAction::List { status, topic, limit } => {
            let filter = HintFilter {
                status,
                topic_id: topic,
                limit,
            };
            let hints = service.list_unresolved_hints(&filter).await?;
            out.emit(&hints, || {
                if hints.is_empty() {
                    println!("No unresolved hints.");
                }
                for h in &hints {
                    print_hint(h);
                }
            })
        }
        HintAction::Resolve { id, note } => {
            let hint = service.resolve_hint(id, note.as_deref()).await?;
            out.emit(&hint, || print_hint(&hint))
        }
        HintAction::Ignore { id, note } => {
            let hint = service.ignore_hint(id, note.as_deref()).await?;
            out.emit(&hint, || print_hint(&hint))
        }
    }
}

async fn cmd_import(db_path: Option<PathBuf>, path: &std::path::Path, out: Output) -> anyhow::Result<()> {
    let config = Config::load()?;
    let db = open_database(db_path, &config).await?;
    let result = import_snapshot_file(db.pool(), path).await;
    db.close().await;
    let result = result?;

    out.emit(&result, || {
        println!("Imported {} records from {}", result.total_records, path.display());
        let mut counts: Vec<_> = result.record_counts.iter().collect();
        counts.sort();
        for (table, count) in counts {
            println!("  {}: {}", table, count);
        }
        for warning in &result.warnings {
            println!("  [!!] {}", warning);
        }
    })
}

fn cmd_config(action: ConfigAction, out: Output) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !out.quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            if out.format == OutputFormat::Json {
                let map: serde_json::Map<String, serde_json::Value> = items
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::String(v)))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&map)?);
            } else {
                for (key, value) in items {
                    println!("{} = {}", key, value);
                }
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !out.quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

async fn cmd_doctor(db_path: Option<PathBuf>, out: Output) -> anyhow::Result<()> {
    let quiet = out.quiet;
    if !quiet {
        println!("prereq-graph Health Check");
        println!("=========================");
        println!();
    }

    let mut all_ok = true;

    let config = match Config::load() {
        Ok(config) => {
            if !quiet {
                println!("[OK] Configuration: Valid");
            }
            config
        }
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] Configuration: Error - {:#}", e);
                println!("     Falling back to defaults");
            }
            Config::default()
        }
    };

    if !quiet {
        match Config::config_path() {
            Ok(path) if path.exists() => println!("[OK] Config file: {}", path.display()),
            Ok(path) => println!("[--] Config file: {} (using defaults)", path.display()),
            Err(e) => println!("[!!] Config file: Error - {}", e),
        }
    }

    match open_database(db_path, &config).await {
        Ok(db) => {
            match db.health_check().await {
                Ok(()) => {
                    if !quiet {
                        println!("[OK] Database: Connected");
                        println!("     Path: {}", db.path().display());
                    }
                    match db.migration_status().await {
                        Ok(status) if status.needs_migration => {
                            all_ok = false;
                            if !quiet {
                                println!(
                                    "[!!] Database: Migrations pending (v{} -> v{})",
                                    status.current_version, status.target_version
                                );
                            }
                        }
                        Ok(status) => {
                            if !quiet {
                                println!("[OK] Database: Schema v{}", status.current_version);
                            }
                        }
                        Err(e) => {
                            all_ok = false;
                            if !quiet {
                                println!("[!!] Database: Migration check failed - {:#}", e);
                            }
                        }
                    }

                    let service = PrerequisiteGraphService::from_database(&db, &config);
                    match service.analytics(Some(0)).await {
                        Ok(stats) if !quiet => {
                            println!(
                                "     Prerequisites: {} ({} needs review)",
                                stats.total_prerequisites, stats.needs_review_prerequisites
                            );
                            println!("     Edges: {}", stats.total_edges);
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "Could not read graph statistics"),
                    }
                }
                Err(e) => {
                    all_ok = false;
                    if !quiet {
                        println!("[!!] Database: Health check failed - {:#}", e);
                    }
                }
            }
            db.close().await;
        }
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] Database: Failed to initialize - {:#}", e);
            }
        }
    }

    if !quiet {
        println!();
        if all_ok {
            println!("All checks passed!");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }

    Ok(())
}

// ============================================================================
// Output
// ============================================================================

#[derive(Clone, Copy)]
struct Output {
    format: OutputFormat,
    quiet: bool,
}

impl Output {
    /// JSON prints `value`; text mode runs `text` unless quiet
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce()) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Text if !self.quiet => text(),
            OutputFormat::Text => {}
        }
        Ok(())
    }
}

fn print_prerequisite(p: &Prerequisite) {
    println!("#{} {}", p.id, p.display_name);
    println!("  Key: {}", p.canonical_key);
    println!("  Status: {}", p.status);
    if let Some(reason) = &p.review_reason {
        println!("  Reason: {}", reason);
    }
}

fn print_hint(h: &UnresolvedConceptHint) {
    println!(
        "  [{}] {} x{} (topic {}, {})",
        h.id, h.hint, h.occurrence_count, h.topic_id, h.status
    );
    if let Some(note) = &h.resolution_note {
        println!("      note: {}", note);
    }
}

#[cfg(test)]
mod main_tests;

//! PaperTrail CLI entry point.
//!
//! Drives the labeling pipeline and its evaluation, the manual review queue,
//! the project store, dataset cleaning and paper search from the terminal.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use std::io::{BufRead, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use papertrail::application::cleaning::{self, CleaningOptions};
use papertrail::application::labeling::{
    EvaluationReport, ExportFormat, PipelineController, PipelineModels, evaluation,
    export_results, label_batch,
};
use papertrail::application::projects::ProjectStore;
use papertrail::application::review_queue::ReviewQueue;
use papertrail::domain::{ArtifactKind, PipelineResult, TaskType, WorkItem};
use papertrail::infra::app_config::{self, AppConfig};
use papertrail::infra::capabilities::{Capabilities, Capability};
use papertrail::infra::db::Database;
use papertrail::infra::llm::OpenAiClient;
use papertrail::infra::paper_search::PaperSearch;
use papertrail::infra::payload::PayloadStore;

#[derive(Parser, Debug)]
#[command(name = "papertrail")]
#[command(version)]
#[command(about = "Research assistant: LLM labeling with review, projects and paper search", long_about = None)]
struct Args {
    /// Enable debug logging (RUST_LOG still wins when set)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Label items through the labeler → critic → validator pipeline
    Label {
        /// Task type (ner, sentiment, summarization, object_detection, ocr, visual_qa, captioning, grounded_description)
        #[arg(short, long, default_value = "sentiment")]
        task: String,

        /// Item text; repeat for several items. Reads one item per stdin line when omitted
        #[arg(long = "text")]
        texts: Vec<String>,

        /// Override labeling.max_retries
        #[arg(long)]
        max_retries: Option<u32>,

        /// Override labeling.min_confidence
        #[arg(long)]
        min_confidence: Option<u8>,

        /// Write results to a file (json or jsonl, see --format)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, default_value = "json")]
        format: String,

        /// Ground-truth labels (JSON object or JSON lines); prints evaluation metrics
        #[arg(long)]
        truth: Option<PathBuf>,
    },

    /// Score exported labeling results against ground truth
    Evaluate {
        /// Results written by `label --output` (json or jsonl)
        #[arg(short, long)]
        results: PathBuf,

        /// Ground-truth labels (JSON object or JSON lines)
        #[arg(short, long)]
        truth: PathBuf,
    },

    /// Clean a JSON dataset: PII masking, deduplication, quality scoring
    Clean {
        /// JSON array of row objects, or "-" for stdin
        #[arg(short, long)]
        file: PathBuf,

        /// Write the cleaned rows to a file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Save the cleaned rows as a cleaned_data artifact in this project
        #[arg(long, requires = "name")]
        project: Option<String>,

        /// Artifact name (with --project)
        #[arg(long)]
        name: Option<String>,

        /// Column to score for quality (defaults to the first text column)
        #[arg(long)]
        text_column: Option<String>,

        #[arg(long)]
        keep_pii: bool,

        #[arg(long)]
        keep_duplicates: bool,

        #[arg(long)]
        keep_low_quality: bool,

        /// Drop numeric outliers (3 × IQR fence)
        #[arg(long)]
        drop_outliers: bool,
    },

    /// Manual review queue
    Queue {
        #[command(subcommand)]
        command: QueueCommand,
    },

    /// Research projects
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },

    /// Artifacts saved into projects
    Artifact {
        #[command(subcommand)]
        command: ArtifactCommand,
    },

    /// Academic paper search
    Papers {
        #[command(subcommand)]
        command: PapersCommand,
    },

    /// Configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum QueueCommand {
    /// List pending items (or all with --all)
    List {
        #[arg(long)]
        all: bool,
    },
    /// Show one item with its attempt history
    Show { id: String },
    /// Resolve an item with a human label
    Resolve { id: String, label: String },
    /// Pending/resolved counts by reason
    Summary,
    /// Export as JSON lines
    Export {
        #[arg(long)]
        all: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum ProjectCommand {
    Create {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    List,
    /// Show a project with its artifact counts
    Show { id: String },
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a project, its artifacts and their payload files
    Delete {
        id: String,
        /// Skip the confirmation guard
        #[arg(long)]
        yes: bool,
    },
    /// Most recently active projects
    Recent {
        #[arg(short, long, default_value_t = 3)]
        limit: usize,
    },
}

#[derive(Subcommand, Debug)]
enum ArtifactCommand {
    /// Save a JSON payload as an artifact
    Save {
        project_id: String,
        #[arg(short, long)]
        kind: String,
        #[arg(short, long)]
        name: String,
        /// JSON file with the payload, or "-" for stdin
        #[arg(short, long)]
        file: PathBuf,
        /// Metadata entries as key=value
        #[arg(long = "meta")]
        meta: Vec<String>,
    },
    List { project_id: String },
    /// Render an artifact as Markdown (or raw JSON with --raw)
    Show {
        id: String,
        #[arg(long)]
        raw: bool,
    },
}

#[derive(Subcommand, Debug)]
enum PapersCommand {
    Search {
        #[arg(required = true)]
        query: Vec<String>,
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the effective configuration and capabilities
    Show,
    /// Write the effective configuration to the config file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = app_config::load_config();
    let caps = Capabilities::resolve(&config);

    match args.command {
        Commands::Label {
            task,
            texts,
            max_retries,
            min_confidence,
            output,
            format,
            truth,
        } => {
            caps.require(Capability::Llm)?;
            let truth = truth
                .map(|path| read_text(&path).and_then(|text| evaluation::parse_ground_truth(&text)))
                .transpose()?;
            let format = ExportFormat::from_str(&format).map_err(anyhow::Error::msg)?;
            let mut labeling = config.labeling.clone();
            if let Some(n) = max_retries {
                labeling.max_retries = n;
            }
            if let Some(c) = min_confidence {
                labeling.min_confidence = c;
            }

            let task_type = TaskType::from_str(&task).map_err(anyhow::Error::msg)?;
            let texts = if texts.is_empty() {
                read_stdin_lines()?
            } else {
                texts
            };
            if texts.is_empty() {
                anyhow::bail!("nothing to label: pass --text or pipe items on stdin");
            }
            let items: Vec<WorkItem> = texts
                .into_iter()
                .enumerate()
                .map(|(i, text)| WorkItem::new(format!("item-{}", i + 1), text, task_type))
                .collect();

            let llm = OpenAiClient::from_config(&config.llm)
                .context("LLM client is not configured")?;
            let db = open_database(&config)?;
            let queue = Arc::new(ReviewQueue::new(db.review_item_repo()));
            let controller = PipelineController::new(
                labeling,
                Arc::new(llm),
                PipelineModels::from_config(&config.llm),
                queue,
            )?;

            let report = label_batch(&controller, items).await;
            if args.json {
                print_json(&report)?;
            } else {
                for run in &report.runs {
                    print_result(&run.result, run.attempts.len());
                }
                println!(
                    "\n{} items: {} finalized, {} escalated, avg final confidence {:.1}",
                    report.total, report.finalized, report.escalated, report.avg_final_confidence
                );
            }
            if let Some(path) = output {
                let body = export_results(report.runs.iter().map(|r| &r.result), format)?;
                write_output(&path, &body)?;
            }
            if let Some(truth) = truth {
                print_evaluation(&report.evaluate(&truth), args.json)?;
            }
        }

        Commands::Evaluate { results, truth } => {
            let samples = evaluation::parse_exported(&read_text(&results)?)?;
            let truth = evaluation::parse_ground_truth(&read_text(&truth)?)?;
            print_evaluation(&evaluation::evaluate(&samples, &truth), args.json)?;
        }

        Commands::Clean {
            file,
            output,
            project,
            name,
            text_column,
            keep_pii,
            keep_duplicates,
            keep_low_quality,
            drop_outliers,
        } => {
            let rows = cleaning::rows_from_value(read_json_input(&file)?).map_err(anyhow::Error::msg)?;
            let options = CleaningOptions {
                mask_pii: !keep_pii,
                dedup: !keep_duplicates,
                quality_filter: !keep_low_quality,
                outlier_filter: drop_outliers,
                text_column,
            };
            let cleaned = cleaning::clean_rows(rows, &options);
            let data = Value::Array(cleaned.rows.into_iter().map(Value::Object).collect());

            if let Some(path) = output {
                write_output(&path, &serde_json::to_string_pretty(&data)?)?;
            }
            if let (Some(project_id), Some(name)) = (project, name) {
                let db = open_database(&config)?;
                let store = ProjectStore::new(&db, PayloadStore::new(config.projects_dir()));
                let metadata = match serde_json::to_value(&cleaned.report)? {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                let artifact = store.save_artifact(
                    &project_id,
                    ArtifactKind::CleanedData,
                    &name,
                    &data,
                    metadata,
                )?;
                log::info!("Saved cleaned_data artifact {}", artifact.id);
            }

            let report = &cleaned.report;
            if args.json {
                print_json(report)?;
            } else {
                println!("Rows:               {} → {}", report.original_rows, report.final_rows);
                println!("Empty rows removed: {}", report.empty_rows_removed);
                println!("PII masked:         {}", report.pii_found);
                println!("Duplicates removed: {}", report.duplicates_removed);
                println!("Low quality:        {}", report.low_quality_removed);
                println!("Outliers:           {}", report.outliers_removed);
            }
        }

        Commands::Queue { command } => {
            let db = open_database(&config)?;
            let queue = ReviewQueue::new(db.review_item_repo());
            match command {
                QueueCommand::List { all } => {
                    let items = if all {
                        queue.list_all()?
                    } else {
                        queue.list_pending()?
                    };
                    if args.json {
                        print_json(&items)?;
                    } else if items.is_empty() {
                        println!("Review queue is empty.");
                    } else {
                        for item in items {
                            println!(
                                "{}  {:<16} {:<9} {:<20} {}",
                                item.id,
                                item.reason.to_string(),
                                item.status.to_string(),
                                item.task_type.to_string(),
                                preview(&item.content, 60)
                            );
                        }
                    }
                }
                QueueCommand::Show { id } => {
                    let item = queue.find_by_id(&id)?;
                    if args.json {
                        print_json(&item)?;
                    } else {
                        println!("Item:    {} ({})", item.item_id, item.task_type);
                        println!("Reason:  {}", item.reason);
                        println!("Status:  {}", item.status);
                        if let Some(label) = &item.resolved_label {
                            println!("Label:   {}", label);
                        }
                        println!("Content: {}", item.content);
                        for attempt in &item.attempts {
                            println!(
                                "  #{} label={:?} confidence={} outcome={:?}",
                                attempt.attempt, attempt.label, attempt.confidence, attempt.outcome
                            );
                            if let Some(feedback) = &attempt.feedback_out {
                                println!("     feedback: {}", feedback);
                            }
                        }
                        for line in &item.error_log {
                            println!("  ! {}", line);
                        }
                    }
                }
                QueueCommand::Resolve { id, label } => {
                    let item = queue.resolve(&id, &label)?;
                    println!("Resolved {} as {}", item.id, label.trim());
                }
                QueueCommand::Summary => {
                    let summary = queue.summary()?;
                    if args.json {
                        print_json(&summary)?;
                    } else {
                        println!("Pending: {}  Resolved: {}", summary.pending, summary.resolved);
                        for (reason, count) in &summary.by_reason {
                            println!("  {:<16} {}", reason, count);
                        }
                    }
                }
                QueueCommand::Export { all, output } => {
                    let body = queue.export_jsonl(all)?;
                    match output {
                        Some(path) => write_output(&path, &body)?,
                        None => print!("{body}"),
                    }
                }
            }
        }

        Commands::Project { command } => {
            let db = open_database(&config)?;
            let store = ProjectStore::new(&db, PayloadStore::new(config.projects_dir()));
            match command {
                ProjectCommand::Create { name, description } => {
                    let project = store.create_project(&name, &description)?;
                    if args.json {
                        print_json(&project)?;
                    } else {
                        println!("Created project {} ({})", project.name, project.id);
                    }
                }
                ProjectCommand::List => {
                    let projects = store.list_projects()?;
                    if args.json {
                        print_json(&projects)?;
                    } else {
                        for p in projects {
                            println!("{}  {:<30} updated {}", p.id, p.name, p.updated_at);
                        }
                    }
                }
                ProjectCommand::Show { id } => {
                    let project = store.get_project(&id)?;
                    let stats = store.project_stats(&id)?;
                    if args.json {
                        print_json(&serde_json::json!({"project": project, "stats": stats}))?;
                    } else {
                        println!("{}", project.name);
                        if !project.description.is_empty() {
                            println!("{}", project.description);
                        }
                        println!(
                            "Created {} · Updated {}",
                            project.created_at, project.updated_at
                        );
                        println!("{} artifacts", stats.artifact_count);
                        for (kind, count) in &stats.by_kind {
                            println!("  {:<24} {}", kind.title(), count);
                        }
                    }
                }
                ProjectCommand::Update {
                    id,
                    name,
                    description,
                } => {
                    let project =
                        store.update_project(&id, name.as_deref(), description.as_deref())?;
                    println!("Updated project {} ({})", project.name, project.id);
                }
                ProjectCommand::Delete { id, yes } => {
                    if !yes {
                        anyhow::bail!(
                            "deleting a project removes all its artifacts permanently; re-run with --yes"
                        );
                    }
                    let removed = store.delete_project(&id)?;
                    println!(
                        "Deleted project {} ({} artifacts, {} files)",
                        id, removed.artifacts, removed.payload_files
                    );
                }
                ProjectCommand::Recent { limit } => {
                    let recent = store.recent_projects(limit)?;
                    if args.json {
                        print_json(&recent)?;
                    } else {
                        for summary in recent {
                            println!(
                                "{}  {:<30} {} artifacts",
                                summary.project.id, summary.project.name, summary.artifact_count
                            );
                        }
                    }
                }
            }
        }

        Commands::Artifact { command } => {
            let db = open_database(&config)?;
            let store = ProjectStore::new(&db, PayloadStore::new(config.projects_dir()));
            match command {
                ArtifactCommand::Save {
                    project_id,
                    kind,
                    name,
                    file,
                    meta,
                } => {
                    let kind = ArtifactKind::from_str(&kind).map_err(anyhow::Error::msg)?;
                    let data = read_json_input(&file)?;
                    let metadata = parse_metadata(&meta)?;
                    let artifact = store.save_artifact(&project_id, kind, &name, &data, metadata)?;
                    if args.json {
                        print_json(&artifact)?;
                    } else {
                        println!("Saved {} artifact {} ({})", kind, artifact.name, artifact.id);
                    }
                }
                ArtifactCommand::List { project_id } => {
                    let artifacts = store.list_artifacts(&project_id)?;
                    if args.json {
                        print_json(&artifacts)?;
                    } else {
                        for a in artifacts {
                            println!(
                                "{}  {:<22} {:<30} {}",
                                a.id,
                                a.kind.title(),
                                a.name,
                                a.created_at
                            );
                        }
                    }
                }
                ArtifactCommand::Show { id, raw } => {
                    let artifact = store.get_artifact(&id)?;
                    if raw || args.json {
                        let data = store
                            .load_artifact_data(&artifact)?
                            .context("artifact data file not found")?;
                        print_json(&data)?;
                    } else {
                        print!("{}", store.render_artifact(&artifact)?);
                    }
                }
            }
        }

        Commands::Papers {
            command: PapersCommand::Search { query, limit },
        } => {
            caps.require(Capability::PaperSearch)?;
            let search = PaperSearch::from_config(&config.paper_search);
            let papers = search.search(&query.join(" "), limit).await;
            if args.json {
                print_json(&papers)?;
            } else if papers.is_empty() {
                println!("No papers found.");
            } else {
                for (i, paper) in papers.iter().enumerate() {
                    let year = paper.year.map(|y| y.to_string()).unwrap_or_else(|| "n.d.".into());
                    println!("{}. {} ({})", i + 1, paper.title, year);
                    if !paper.authors.is_empty() {
                        println!("   {}", paper.authors.join(", "));
                    }
                    if let Some(url) = &paper.pdf_url {
                        println!("   {}", url);
                    }
                }
            }
        }

        Commands::Config { command } => match command {
            ConfigCommand::Show => {
                let mut shown = config.clone();
                if shown.llm.api_key.is_some() {
                    shown.llm.api_key = Some("********".into());
                }
                if shown.paper_search.semantic_scholar_api_key.is_some() {
                    shown.paper_search.semantic_scholar_api_key = Some("********".into());
                }
                if args.json {
                    print_json(&serde_json::json!({"config": shown, "capabilities": caps}))?;
                } else {
                    println!("# {}", app_config::config_path().display());
                    print!("{}", toml::to_string_pretty(&shown)?);
                    println!("\n# capabilities: llm={} paper_search={}", caps.llm, caps.paper_search);
                    println!("# database: {}", config.db_path().display());
                }
            }
            ConfigCommand::Init => {
                let mut to_save = config.clone();
                // Secrets from the environment are not written to disk.
                to_save.llm.api_key = None;
                to_save.paper_search.semantic_scholar_api_key = None;
                app_config::save_config(&to_save).context("writing config file")?;
                println!("Wrote {}", app_config::config_path().display());
            }
        },
    }

    Ok(())
}

fn open_database(config: &AppConfig) -> Result<Database> {
    let path = config.db_path();
    Database::open_at(&path).with_context(|| format!("opening database {}", path.display()))
}

fn print_result(result: &PipelineResult, attempts: usize) {
    match result {
        PipelineResult::Finalized(label) => println!(
            "{}  {:<14} confidence {:>3}  ({} attempts)",
            label.item_id, label.label, label.final_confidence, attempts
        ),
        PipelineResult::Escalated {
            item_id,
            reason,
            review_item_id,
        } => println!(
            "{}  escalated: {} ({} attempts) -> {}",
            item_id,
            reason,
            attempts,
            review_item_id.as_deref().unwrap_or("not queued")
        ),
    }
}

fn print_evaluation(report: &EvaluationReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }
    println!(
        "Evaluated {} samples ({} unlabeled, {} without ground truth)",
        report.total_samples, report.unlabeled, report.missing_ground_truth
    );
    println!("Accuracy: {:.4}  Macro F1: {:.4}", report.accuracy, report.macro_f1);
    if let Some(ece) = report.ece {
        println!("ECE:      {:.4}", ece);
    }
    for (class, m) in &report.per_class {
        println!(
            "  {:<16} precision {:.4}  recall {:.4}  f1 {:.4}",
            class, m.precision, m.recall, m.f1
        );
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn write_output(path: &Path, body: &str) -> Result<()> {
    std::fs::write(path, body).with_context(|| format!("writing {}", path.display()))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

fn read_stdin_lines() -> Result<Vec<String>> {
    let stdin = std::io::stdin();
    let mut lines = Vec::new();
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn read_json_input(path: &Path) -> Result<Value> {
    let contents = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading payload from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    };
    serde_json::from_str(&contents).context("payload is not valid JSON")
}

fn parse_metadata(entries: &[String]) -> Result<Map<String, Value>> {
    let mut metadata = Map::new();
    for entry in entries {
        let (key, value) = entry
            .split_once('=')
            .with_context(|| format!("metadata '{entry}' is not key=value"))?;
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.into()));
        metadata.insert(key.trim().to_string(), value);
    }
    Ok(metadata)
}

fn preview(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max).collect();
    format!("{cut}…")
}

//! Command-line access to the AINative platform.
//!
//! Credentials come from `--base-url`, the `AINATIVE_*` environment
//! variables, or `~/.ainative/config.toml` (see `ainative config`).
//!
//! # Examples
//!
//! ```sh
//! # Store credentials once
//! ainative config set api_key ak_live_...
//!
//! # List projects as a table
//! ainative --format table projects list --limit 20
//!
//! # Similarity search
//! ainative vectors search --project proj_1 --vector 0.1,0.2,0.3 --top-k 5
//!
//! # Start a swarm with two agents
//! ainative swarm start --project proj_1 --objective "triage issues" \
//!   --agent researcher --agent coder
//!
//! # Debug logging for every attempt
//! ainative -v health
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use ainative::auth::CredentialFragment;
use ainative::config::{CONFIG_KEYS, ConfigFile};
use ainative::prelude::*;
use ainative::resources::vectors::DEFAULT_NAMESPACE;
use chrono::{TimeDelta, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Command-line access to the AINative platform.
#[derive(Parser)]
#[command(name = "ainative", version)]
struct Cli {
    // ── Connection ─────────────────────────────────────────────
    /// Override the API base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Per-attempt timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Retries after the first attempt for transient failures
    #[arg(long, global = true)]
    max_retries: Option<u32>,

    // ── Output ─────────────────────────────────────────────────
    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Log every attempt to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Table,
}

#[derive(Subcommand)]
enum Command {
    /// Manage the local config file
    #[command(subcommand)]
    Config(ConfigCommand),
    /// ZeroDB projects
    #[command(subcommand)]
    Projects(ProjectsCommand),
    /// Vector storage and search
    #[command(subcommand)]
    Vectors(VectorsCommand),
    /// Memory entries
    #[command(subcommand)]
    Memory(MemoryCommand),
    /// Agent swarms
    #[command(subcommand)]
    Swarm(SwarmCommand),
    /// Usage and cost reports
    #[command(subcommand)]
    Analytics(AnalyticsCommand),
    /// Check that the platform is reachable
    Health,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Set one key in the config file
    Set { key: String, value: String },
    /// Remove one key from the config file
    Unset { key: String },
    /// Print the effective configuration with secrets masked
    Show,
    /// Print the config file location
    Path,
}

#[derive(Subcommand)]
enum ProjectsCommand {
    List {
        #[arg(long, default_value_t = 100)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long)]
        status: Option<ProjectStatus>,
    },
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    Get {
        id: String,
    },
    Suspend {
        id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    Activate {
        id: String,
    },
    /// Delete a project and all of its data
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum VectorsCommand {
    Search {
        #[arg(long)]
        project: String,
        /// Comma-separated components
        #[arg(long)]
        vector: String,
        #[arg(long, default_value_t = 10)]
        top_k: u32,
        #[arg(long, default_value = DEFAULT_NAMESPACE)]
        namespace: String,
        /// JSON metadata filter
        #[arg(long)]
        filter: Option<String>,
    },
    Upsert {
        #[arg(long)]
        project: String,
        /// Comma-separated components
        #[arg(long)]
        vector: String,
        #[arg(long)]
        id: Option<String>,
        /// JSON object stored with the vector
        #[arg(long)]
        metadata: Option<String>,
        #[arg(long, default_value = DEFAULT_NAMESPACE)]
        namespace: String,
    },
    Stats {
        #[arg(long)]
        project: String,
        #[arg(long)]
        namespace: Option<String>,
    },
}

#[derive(Subcommand)]
enum MemoryCommand {
    Create {
        content: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long, default_value = "medium")]
        priority: MemoryPriority,
        #[arg(long)]
        project: Option<String>,
    },
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: u32,
        #[arg(long)]
        project: Option<String>,
        /// Plain text match instead of semantic search
        #[arg(long)]
        exact: bool,
    },
    List {
        #[arg(long, default_value_t = 100)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long)]
        project: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
}

#[derive(Subcommand)]
enum SwarmCommand {
    /// List the available agent types
    AgentTypes,
    Start {
        #[arg(long)]
        project: String,
        #[arg(long)]
        objective: String,
        /// Agent type; repeat for several agents
        #[arg(long = "agent", required = true)]
        agents: Vec<AgentType>,
    },
    Status {
        swarm_id: String,
    },
    Orchestrate {
        swarm_id: String,
        task: String,
        /// Restrict the task to these agent ids
        #[arg(long = "agent")]
        agents: Vec<String>,
    },
    Stop {
        swarm_id: String,
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum AnalyticsCommand {
    Usage {
        #[arg(long)]
        project: Option<String>,
        /// Only the last N days
        #[arg(long)]
        days: Option<i64>,
        #[arg(long, default_value = "daily")]
        granularity: String,
    },
    Costs {
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        days: Option<i64>,
    },
    Trends {
        metric: String,
        #[arg(long)]
        project: Option<String>,
        #[arg(long, default_value_t = 30)]
        period: u32,
    },
}

// ── Setup ──────────────────────────────────────────────────────────

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("ainative=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn build_client(cli: &Cli) -> Result<AinativeClient> {
    let mut builder = AinativeClient::builder();
    if let Some(url) = &cli.base_url {
        builder = builder.base_url(url);
    }
    if let Some(secs) = cli.timeout {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    if let Some(retries) = cli.max_retries {
        builder = builder.max_attempts(retries.saturating_add(1));
    }
    builder.build()
}

fn config_path() -> Result<PathBuf> {
    ConfigFile::default_path().ok_or_else(|| {
        Error::configuration(
            ConfigProblem::ConfigFile,
            "cannot locate the config file: set AINATIVE_CONFIG or HOME",
        )
    })
}

// ── Helpers ────────────────────────────────────────────────────────

fn parse_vector(raw: &str) -> Result<Vec<f32>> {
    let components = raw
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| {
            c.parse::<f32>()
                .map_err(|_| Error::validation(format!("'{c}' is not a number")))
        })
        .collect::<Result<Vec<_>>>()?;
    if components.is_empty() {
        return Err(Error::validation("--vector needs at least one component"));
    }
    Ok(components)
}

fn parse_json(flag: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw).map_err(|e| Error::validation(format!("--{flag} is not valid JSON: {e}")))
}

fn window(project: Option<String>, days: Option<i64>) -> Window {
    let end = Utc::now();
    Window {
        project_id: project,
        start: days.map(|d| end - TimeDelta::days(d.clamp(0, 36_500))),
        end: days.map(|_| end),
    }
}

/// Show the first four characters of a secret.
fn mask(secret: &str) -> String {
    if secret.chars().count() <= 8 {
        return "****".to_string();
    }
    let head: String = secret.chars().take(4).collect();
    format!("{head}****")
}

fn confirm(prompt: &str) -> bool {
    eprint!("{prompt} [y/N] ");
    let _ = io::stderr().flush();
    let mut answer = String::new();
    if io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

// ── Output ─────────────────────────────────────────────────────────

fn render(value: &Value, format: Format) -> String {
    match (format, value) {
        (_, Value::String(s)) => s.clone(),
        (Format::Json, _) => serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
        (Format::Table, _) => render_table(value),
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The row set of a list response: a bare array, or the single array
/// inside an envelope object.
fn rows(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(map) => {
            let mut arrays = map.values().filter_map(Value::as_array);
            match (arrays.next(), arrays.next()) {
                (Some(items), None) => Some(items),
                _ => None,
            }
        }
        _ => None,
    }
}

fn render_table(value: &Value) -> String {
    let Some(items) = rows(value) else {
        return match value {
            Value::Object(map) => {
                let width = map.keys().map(|k| k.chars().count()).max().unwrap_or(0);
                map.iter()
                    .map(|(k, v)| format!("{k:<width$}  {}", cell(v)))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            other => cell(other),
        };
    };

    let mut columns: Vec<&str> = Vec::new();
    for item in items {
        if let Some(map) = item.as_object() {
            for key in map.keys() {
                if !columns.contains(&key.as_str()) {
                    columns.push(key);
                }
            }
        }
    }
    if columns.is_empty() {
        return items.iter().map(cell).collect::<Vec<_>>().join("\n");
    }

    let table: Vec<Vec<String>> = items
        .iter()
        .map(|item| columns.iter().map(|c| item.get(*c).map(cell).unwrap_or_default()).collect())
        .collect();
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            table
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(c.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(widths.iter().copied())
            .map(|(text, width)| format!("{text:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };
    let mut out = vec![line(columns.clone())];
    out.extend(table.iter().map(|row| line(row.iter().map(String::as_str).collect())));
    out.join("\n")
}

fn hint(err: &Error) -> Option<String> {
    let hint = match err.kind() {
        ErrorKind::Configuration(ConfigProblem::MissingApiKey) => {
            "Set AINATIVE_API_KEY or run `ainative config set api_key <KEY>`.".to_string()
        }
        ErrorKind::Configuration(ConfigProblem::InvalidBaseUrl) => {
            "Check --base-url, AINATIVE_BASE_URL, or the base_url config key.".to_string()
        }
        ErrorKind::Authentication => {
            "The API key was rejected. Inspect it with `ainative config show`.".to_string()
        }
        ErrorKind::Authorization => "The API key lacks permission for this resource.".to_string(),
        ErrorKind::RateLimit => match err.retry_after() {
            Some(wait) => format!("Rate limited. Try again in {}s.", wait.as_secs().max(1)),
            None => "Rate limited. Try again shortly.".to_string(),
        },
        ErrorKind::Timeout => "Raise --timeout or --max-retries.".to_string(),
        ErrorKind::Network => "Check connectivity and the base URL.".to_string(),
        ErrorKind::Server => "The platform is failing; try again later.".to_string(),
        ErrorKind::Validation if !err.field_errors().is_empty() => err
            .field_errors()
            .iter()
            .map(|f| format!("  {}: {}", f.field, f.message))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => return None,
    };
    Some(hint)
}

// ── Commands ───────────────────────────────────────────────────────

fn run_config(command: &ConfigCommand) -> Result<Value> {
    let path = config_path()?;
    match command {
        ConfigCommand::Set { key, value } => {
            let mut file = ConfigFile::load(&path)?;
            file.set(key, value)?;
            file.save(&path)?;
            Ok(Value::String(format!("Saved {key} to {}", path.display())))
        }
        ConfigCommand::Unset { key } => {
            let mut file = ConfigFile::load(&path)?;
            file.unset(key)?;
            file.save(&path)?;
            Ok(Value::String(format!("Removed {key} from {}", path.display())))
        }
        ConfigCommand::Path => Ok(Value::String(path.display().to_string())),
        ConfigCommand::Show => {
            let file = ConfigFile::load(&path)?;
            let effective = CredentialFragment::from_env()
                .or(file.fragment())
                .or(CredentialFragment::defaults());
            let mut shown = serde_json::Map::new();
            for key in CONFIG_KEYS {
                let value = match *key {
                    "api_key" => effective.api_key.as_deref().map(mask),
                    "api_secret" => effective.api_secret.as_deref().map(mask),
                    "organization_id" => effective.organization_id.clone(),
                    "base_url" => effective.base_url.clone(),
                    "timeout_secs" => file.timeout_secs.map(|v| v.to_string()),
                    "max_attempts" => file.max_attempts.map(|v| v.to_string()),
                    _ => None,
                };
                shown.insert(key.to_string(), value.map_or(Value::Null, Value::String));
            }
            shown.insert("config_file".into(), json!(path.display().to_string()));
            Ok(Value::Object(shown))
        }
    }
}

async fn run_projects(client: &AinativeClient, command: &ProjectsCommand) -> Result<Value> {
    let projects = client.projects();
    match command {
        ProjectsCommand::List {
            limit,
            offset,
            status,
        } => {
            let query = ListProjects {
                limit: *limit,
                offset: *offset,
                status: *status,
                ..Default::default()
            };
            projects.list(&query).await
        }
        ProjectsCommand::Create { name, description } => {
            let project = NewProject {
                description: description.clone(),
                ..NewProject::named(name)
            };
            projects.create(&project).await
        }
        ProjectsCommand::Get { id } => projects.get(id).await,
        ProjectsCommand::Suspend { id, reason } => projects.suspend(id, reason.as_deref()).await,
        ProjectsCommand::Activate { id } => projects.activate(id).await,
        ProjectsCommand::Delete { id, yes } => {
            if !*yes && !confirm(&format!("Delete project {id} and all of its data?")) {
                return Err(Error::new(ErrorKind::Cancelled, "deletion not confirmed"));
            }
            projects.delete(id).await
        }
    }
}

async fn run_vectors(client: &AinativeClient, command: &VectorsCommand) -> Result<Value> {
    let vectors = client.vectors();
    match command {
        VectorsCommand::Search {
            project,
            vector,
            top_k,
            namespace,
            filter,
        } => {
            let params = VectorSearch {
                top_k: *top_k,
                namespace: namespace.clone(),
                filter: filter.as_deref().map(|f| parse_json("filter", f)).transpose()?,
                ..VectorSearch::new(project, parse_vector(vector)?)
            };
            Ok(Value::Array(vectors.search(&params).await?))
        }
        VectorsCommand::Upsert {
            project,
            vector,
            id,
            metadata,
            namespace,
        } => {
            let mut record = VectorRecord::new(parse_vector(vector)?);
            if let Some(id) = id {
                record = record.with_id(id);
            }
            if let Some(metadata) = metadata {
                record = record.with_metadata(parse_json("metadata", metadata)?);
            }
            vectors.upsert(project, namespace, &[record]).await
        }
        VectorsCommand::Stats { project, namespace } => {
            vectors.stats(project, namespace.as_deref()).await
        }
    }
}

async fn run_memory(client: &AinativeClient, command: &MemoryCommand) -> Result<Value> {
    let memory = client.memory();
    match command {
        MemoryCommand::Create {
            content,
            title,
            tags,
            priority,
            project,
        } => {
            let entry = NewMemory {
                title: title.clone(),
                tags: tags.clone(),
                priority: *priority,
                project_id: project.clone(),
                ..NewMemory::new(content)
            };
            memory.create(&entry).await
        }
        MemoryCommand::Search {
            query,
            limit,
            project,
            exact,
        } => {
            let params = MemorySearch {
                limit: *limit,
                project_id: project.clone(),
                semantic: !*exact,
                ..MemorySearch::new(query)
            };
            Ok(Value::Array(memory.search(&params).await?))
        }
        MemoryCommand::List {
            limit,
            offset,
            project,
            tags,
        } => {
            let query = ListMemories {
                limit: *limit,
                offset: *offset,
                project_id: project.clone(),
                tags: tags.clone(),
                ..Default::default()
            };
            memory.list(&query).await
        }
    }
}

async fn run_swarm(client: &AinativeClient, command: &SwarmCommand) -> Result<Value> {
    let swarm = client.agent_swarm();
    match command {
        SwarmCommand::AgentTypes => Ok(Value::Array(swarm.agent_types().await?)),
        SwarmCommand::Start {
            project,
            objective,
            agents,
        } => {
            let agents = agents
                .iter()
                .map(|kind| json!({ "type": kind, "name": kind.as_str() }))
                .collect();
            swarm.start(project, objective, agents, None).await
        }
        SwarmCommand::Status { swarm_id } => swarm.status(swarm_id).await,
        SwarmCommand::Orchestrate {
            swarm_id,
            task,
            agents,
        } => swarm.orchestrate(swarm_id, task, None, agents).await,
        SwarmCommand::Stop { swarm_id, force } => swarm.stop(swarm_id, *force).await,
    }
}

async fn run_analytics(client: &AinativeClient, command: &AnalyticsCommand) -> Result<Value> {
    let analytics = client.analytics();
    match command {
        AnalyticsCommand::Usage {
            project,
            days,
            granularity,
        } => analytics.usage(&window(project.clone(), *days), granularity).await,
        AnalyticsCommand::Costs { project, days } => {
            analytics.costs(&window(project.clone(), *days)).await
        }
        AnalyticsCommand::Trends {
            metric,
            project,
            period,
        } => Ok(Value::Array(
            analytics.trends(metric, project.as_deref(), *period).await?,
        )),
    }
}

async fn run(cli: &Cli) -> Result<Value> {
    match &cli.command {
        Command::Config(command) => run_config(command),
        Command::Projects(command) => run_projects(&build_client(cli)?, command).await,
        Command::Vectors(command) => run_vectors(&build_client(cli)?, command).await,
        Command::Memory(command) => run_memory(&build_client(cli)?, command).await,
        Command::Swarm(command) => run_swarm(&build_client(cli)?, command).await,
        Command::Analytics(command) => run_analytics(&build_client(cli)?, command).await,
        Command::Health => build_client(cli)?.health_check().await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli).await {
        Ok(value) => println!("{}", render(&value, cli.format)),
        Err(e) => {
            eprintln!("Error: {e}");
            if let Some(hint) = hint(&e) {
                eprintln!("{hint}");
            }
            process::exit(1);
        }
    }
}

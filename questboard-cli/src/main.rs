use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use questboard_core::{
    authenticate, Caller, MemoryStore, Mode, Planner, QuestError, TaskInput, VerifiedIdentity,
};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

mod auth;
mod calendar;
mod config;
mod google_calendar;
mod identity;
mod state;

use calendar::CalendarBackend;
use identity::Verifier;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("QUESTBOARD_BUILD_SHA"), ")");

type App = Planner<MemoryStore, CalendarBackend>;

#[derive(Parser, Debug)]
#[command(name = "questboard", version = VERSION, about = "Gamified task planner")]
struct Cli {
    /// Bearer credential identifying the caller
    #[arg(long, global = true, env = "QUESTBOARD_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage ~/.questboard/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Sign-in and credential management
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },

    /// Create, edit and complete missions
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },

    /// Switch the XP preset
    Mode {
        #[command(subcommand)]
        command: ModeCommand,
    },

    /// Inspect the signed-in hero
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config file if none exists
    Init,
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    /// Verify the bearer, provision the profile and store calendar credentials
    Sync {
        /// Calendar access token captured at sign-in
        #[arg(long)]
        access_token: Option<String>,

        #[arg(long)]
        refresh_token: Option<String>,
    },

    /// List users with stored calendar credentials (token values are not shown)
    Status,

    /// Register a static bearer for the `tokens` identity provider
    AddToken {
        #[arg(long = "bearer")]
        bearer: String,

        #[arg(long)]
        subject: String,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Args, Debug, Default)]
struct TaskFields {
    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    description: Option<String>,

    /// study | gym | work | life | health
    #[arg(long)]
    category: Option<String>,

    /// easy | medium | hard
    #[arg(long)]
    difficulty: Option<String>,

    /// RFC 3339 or local "YYYY-MM-DD HH:MM"
    #[arg(long)]
    start: Option<String>,

    /// RFC 3339 or local "YYYY-MM-DD HH:MM"
    #[arg(long)]
    end: Option<String>,
}

impl From<TaskFields> for TaskInput {
    fn from(f: TaskFields) -> Self {
        TaskInput {
            title: f.title,
            description: f.description,
            category: f.category,
            difficulty: f.difficulty,
            scheduled_start: f.start,
            scheduled_end: f.end,
        }
    }
}

#[derive(Subcommand, Debug)]
enum TaskCommand {
    /// Create a mission
    Create(TaskFields),

    /// Change fields of a pending mission
    Update {
        id: String,

        #[command(flatten)]
        fields: TaskFields,
    },

    /// Delete a mission (no error if already gone)
    Delete { id: String },

    /// Complete a mission and collect its rewards
    Complete { id: String },

    /// List pending missions
    List,
}

#[derive(Subcommand, Debug)]
enum ModeCommand {
    /// monk | beast | recovery
    Set { mode: String },
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    Show,
}

fn init_tracing() {
    let filter = std::env::var("QUESTBOARD_LOG")
        .ok()
        .and_then(|s| EnvFilter::try_new(s).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(body) => print_json(&body),
        Err(e) => {
            print_json(&error_body(&e));
            std::process::exit(1);
        }
    }
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("failed to render output: {e}"),
    }
}

fn error_body(e: &anyhow::Error) -> Value {
    match e.downcast_ref::<QuestError>() {
        Some(qe) => json!({
            "status": "error",
            "code": qe.code(),
            "error": qe.to_string(),
            "details": qe.field_errors(),
        }),
        None => json!({
            "status": "error",
            "code": "internal",
            "error": format!("{e:#}"),
        }),
    }
}

fn success(data: Value) -> Value {
    json!({ "status": "success", "data": data })
}

async fn run(cli: Cli) -> Result<Value> {
    let cfg = config::load_config()?;

    match cli.command {
        Command::Config {
            command: ConfigCommand::Init,
        } => {
            let path = config::init_config()?;
            Ok(success(json!({ "path": path.display().to_string() })))
        }

        Command::Auth {
            command:
                AuthCommand::AddToken {
                    bearer,
                    subject,
                    email,
                    name,
                },
        } => {
            let path = auth::tokens_path()?;
            auth::add_token(
                &path,
                &bearer,
                auth::TokenEntry {
                    subject: subject.clone(),
                    email,
                    name,
                },
            )?;
            Ok(success(json!({ "subject": subject })))
        }

        Command::Auth {
            command: AuthCommand::Status,
        } => {
            let users = auth::credential_status(&auth::secrets_path()?)?;
            Ok(success(json!({ "users": users })))
        }

        command => {
            let app = build_app(&cfg)?;
            let (caller, identity) = sign_in(&cfg, cli.token.as_deref()).await?;
            dispatch(&app, &caller, &identity, command).await
        }
    }
}

fn build_app(cfg: &config::Config) -> Result<App> {
    let store_path = cfg.store_path()?;
    tracing::debug!(store = %store_path.display(), "opening store");
    let store = MemoryStore::open(&store_path)
        .with_context(|| format!("open store {}", store_path.display()))?;
    let calendar = CalendarBackend::from_config(&cfg.calendar, auth::secrets_path()?);
    Ok(Planner::with_config(store, calendar, cfg.planner_config()?))
}

async fn sign_in(cfg: &config::Config, token: Option<&str>) -> Result<(Caller, VerifiedIdentity)> {
    let verifier = Verifier::from_config(cfg, &auth::tokens_path()?)?;
    let bearer = token.unwrap_or_default();
    Ok(authenticate(&verifier, bearer, cfg.identity_timeout()).await?)
}

async fn dispatch(
    app: &App,
    caller: &Caller,
    identity: &VerifiedIdentity,
    command: Command,
) -> Result<Value> {
    let data = match command {
        Command::Auth {
            command:
                AuthCommand::Sync {
                    access_token,
                    refresh_token,
                },
        } => {
            let (profile, created) = app.sync_profile(caller, identity).await?;
            if let Some(access) = access_token.as_deref() {
                auth::store_calendar_credentials(
                    &auth::secrets_path()?,
                    caller.id(),
                    access,
                    refresh_token.as_deref(),
                )?;
            }
            json!({ "profile": profile, "created": created })
        }

        Command::Task { command } => match command {
            TaskCommand::Create(fields) => {
                let task = app.create_task(caller, &fields.into()).await?;
                json!({ "task": task })
            }
            TaskCommand::Update { id, fields } => {
                let changes = app.update_task(caller, &id, &fields.into()).await?;
                json!({ "id": id, "changes": changes })
            }
            TaskCommand::Delete { id } => {
                app.delete_task(caller, &id).await?;
                json!({ "id": id })
            }
            TaskCommand::Complete { id } => {
                let reward = app.complete_task(caller, &id).await?;
                json!({ "id": id, "reward": reward })
            }
            TaskCommand::List => {
                let tasks = app.pending_tasks(caller).await?;
                json!({ "tasks": tasks })
            }
        },

        Command::Mode {
            command: ModeCommand::Set { mode },
        } => {
            let mode: Mode = mode
                .parse()
                .map_err(|e: String| QuestError::validation("mode", e))?;
            let profile = app.switch_mode(caller, mode).await?;
            json!({ "profile": profile })
        }

        Command::Profile {
            command: ProfileCommand::Show,
        } => {
            let profile = app.profile(caller).await?;
            json!({ "profile": profile })
        }

        Command::Config { .. } | Command::Auth { .. } => {
            anyhow::bail!("command does not take a signed-in caller")
        }
    };
    Ok(success(data))
}

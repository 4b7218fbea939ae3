use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use roster_sync_lib::application::services::{Route, Routed};
use roster_sync_lib::domain::entities::{Student, StudentPatch};
use roster_sync_lib::domain::roster_query::{
    PageRequest, RosterFilter, RosterQuery, SortDirection, SortField,
};
use roster_sync_lib::domain::validation::StudentForm;
use roster_sync_lib::{AppConfig, AppError, AppState, init_logging};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "roster-sync")]
#[command(about = "Offline-aware student roster client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,

    /// Start with the network reported down
    #[arg(long)]
    offline: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show connectivity, pending operations and sync status
    Status,
    /// List students
    List(ListArgs),
    /// Add a student
    Add(AddArgs),
    /// Update a student by server or local id
    Update {
        id: String,
        #[command(flatten)]
        fields: PatchArgs,
    },
    /// Delete a student by server or local id
    Delete { id: String },
    /// Show queued operations
    Pending,
    /// Replay queued operations against the backend
    Sync,
    /// Drop every queued operation
    ClearPending {
        #[arg(long)]
        yes: bool,
    },
    /// Make parked operations eligible for sync again
    RetryParked,
    /// Keep monitoring connectivity and sync automatically until Ctrl-C
    Run,
}

#[derive(Args)]
struct ListArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    age: Option<u32>,
    #[arg(long)]
    gender: Option<String>,
    #[arg(long)]
    grade: Option<String>,
    /// name, age, gender or grade
    #[arg(long)]
    sort: Option<SortField>,
    #[arg(long)]
    desc: bool,
    #[arg(long)]
    page: Option<usize>,
    #[arg(long, default_value_t = 10)]
    per_page: usize,
}

#[derive(Args)]
struct AddArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    age: String,
    #[arg(long)]
    gender: String,
    #[arg(long)]
    grade: String,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    subject: Option<String>,
    #[arg(long)]
    photo: Option<String>,
}

#[derive(Args)]
struct PatchArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    age: Option<u32>,
    #[arg(long)]
    gender: Option<String>,
    #[arg(long)]
    grade: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    subject: Option<String>,
    #[arg(long)]
    photo: Option<String>,
}

impl From<PatchArgs> for StudentPatch {
    fn from(args: PatchArgs) -> Self {
        Self {
            name: args.name,
            age: args.age,
            gender: args.gender,
            grade: args.grade,
            email: args.email,
            subject: args.subject,
            photo: args.photo,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.json_logs)?;

    let mut config = AppConfig::from_env();
    if cli.offline {
        config.connectivity.assume_network_up = false;
    }

    let state = AppState::new(config).await?;

    state.monitor.refresh().await;
    let stored = state.storage.records().load().await;
    state.data.initialize(stored).await?;

    let result = execute(&state, cli.command).await;
    state.shutdown().await;
    result
}

async fn execute(state: &AppState, command: Commands) -> Result<()> {
    let data = &state.data;
    match command {
        Commands::Status => {
            let connectivity = data.connectivity();
            print_json(&json!({
                "mode": connectivity.mode(),
                "connectivity": connectivity,
                "pendingOperations": data.pending_operations_count().await,
                "sync": data.sync_status().await,
            }))?;
        }
        Commands::List(args) => {
            let query = RosterQuery {
                filter: RosterFilter {
                    name: args.name,
                    age: args.age,
                    gender: args.gender,
                    grade: args.grade,
                },
                sort: args.sort.map(|field| {
                    let direction = if args.desc {
                        SortDirection::Desc
                    } else {
                        SortDirection::Asc
                    };
                    (field, direction)
                }),
                page: args.page.map(|page| PageRequest {
                    page,
                    per_page: args.per_page,
                }),
            };
            print_json(&data.query(&query).await?)?;
        }
        Commands::Add(args) => {
            let draft = StudentForm {
                name: args.name,
                age: args.age,
                gender: args.gender,
                grade: args.grade,
                email: args.email,
                subject: args.subject,
                photo: args.photo,
            }
            .parse()
            .map_err(AppError::from)?;
            let mut routed = data.add_item(draft).await?;
            if routed.route == Route::Direct {
                routed.value = create_remotely(state, routed.value).await?;
            }
            print_json(&routed)?;
        }
        Commands::Update { id, fields } => {
            let routed = data.update_item(&id, fields.into()).await?;
            if routed.route == Route::Direct {
                let target = remote_id(&routed)?;
                state
                    .backend
                    .update_student(&target, &routed.value)
                    .await
                    .context("backend update failed; the local change was kept")?;
            }
            print_json(&routed)?;
        }
        Commands::Delete { id } => {
            let routed = data.delete_item(&id).await?;
            if routed.route == Route::Direct {
                let target = remote_id(&routed)?;
                state
                    .backend
                    .delete_student(&target)
                    .await
                    .context("backend delete failed; the local change was kept")?;
            }
            print_json(&routed)?;
        }
        Commands::Pending => print_json(&data.pending_operations().await)?,
        Commands::Sync => print_json(&data.sync_data().await?)?,
        Commands::ClearPending { yes } => {
            if !yes {
                bail!("refusing to drop pending operations without --yes");
            }
            data.clear_pending_operations().await?;
            print_json(&json!({ "pendingOperations": data.pending_operations_count().await }))?;
        }
        Commands::RetryParked => {
            let released = data.retry_parked().await?;
            print_json(&json!({ "released": released }))?;
        }
        Commands::Run => run_until_interrupted(state).await?,
    }
    Ok(())
}

async fn create_remotely(state: &AppState, local: Student) -> Result<Student> {
    let created = state
        .backend
        .create_student(&local)
        .await
        .context("backend create failed; the record was kept locally")?;
    if let (Some(local_id), Some(server_id)) = (&local.local_id, &created.server_id) {
        state.data.reconcile_item(local_id, server_id).await?;
    }
    Ok(created)
}

fn remote_id(routed: &Routed<Student>) -> Result<String> {
    match &routed.value.server_id {
        Some(id) => Ok(id.clone()),
        None => bail!("record has not been created on the backend yet"),
    }
}

async fn run_until_interrupted(state: &AppState) -> Result<()> {
    let mut transitions = state.data.subscribe();
    state.start().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            received = transitions.recv() => match received {
                Ok(transition) => info!(
                    from = %transition.previous.mode(),
                    to = %transition.current.mode(),
                    pending = state.data.pending_operations_count().await,
                    "Connectivity transition"
                ),
                Err(e) => {
                    warn!(error = %e, "Transition stream interrupted");
                    if matches!(e, tokio::sync::broadcast::error::RecvError::Closed) {
                        break;
                    }
                }
            },
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

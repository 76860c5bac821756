//! # Flowgate DAG CLI
//!
//! Command-line entry point for running and resuming checkpoint-gated DAG
//! workflows against the file-backed stores. Ships a few built-in workflow
//! handlers (`builtin.echo`, `builtin.sleep`, `builtin.fail`) so DAG files
//! can be exercised without writing any code.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use tracing::info;

use flowgate_core::config::FlowgateConfig;
use flowgate_core::error::FlowgateError;
use flowgate_core::events::{EventSink, FileEventSink};
use flowgate_core::graph::Dag;
use flowgate_core::logging::init_structured_logging;
use flowgate_core::runner::{
    ApprovalDecision, CheckpointStore, DagRunner, FileCheckpointStore, RunOutcome,
    WorkflowHandler, WorkflowRegistry,
};

#[derive(Parser, Debug)]
#[command(name = "flowgate-dag")]
#[command(about = "Run and resume checkpoint-gated DAG workflows")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Validate and execute a DAG definition
    Run {
        /// Path to the DAG YAML file
        #[arg(value_name = "DAG_FILE")]
        dag_file: PathBuf,

        /// Tenant the run is attributed to (overrides the file's tenant_id)
        #[arg(short, long)]
        tenant: Option<String>,

        /// Validate and print the planned task order without executing
        #[arg(long)]
        dry_run: bool,
    },
    /// Resume a paused run with an approval decision
    Resume {
        /// Run id printed when the run paused
        #[arg(value_name = "DAG_RUN_ID")]
        dag_run_id: String,

        /// Path to the DAG YAML file the run was started from
        #[arg(short, long, value_name = "DAG_FILE")]
        dag: PathBuf,

        /// Approve the pending checkpoint
        #[arg(long, conflicts_with = "reject")]
        approve: bool,

        /// Reject the pending checkpoint, failing the run
        #[arg(long)]
        reject: bool,

        /// Name of the person deciding
        #[arg(long, default_value = "cli-operator")]
        approver: String,

        /// Role the approver is acting under
        #[arg(long)]
        approver_role: Option<String>,
    },
    /// Show a run's lifecycle state derived from its event log
    Status {
        /// Run id to inspect
        #[arg(value_name = "DAG_RUN_ID")]
        dag_run_id: String,
    },
}

/// `builtin.sleep`: waits `duration_ms` (default 1000), useful for
/// exercising long-running task behavior from a DAG file
struct SleepWorkflow;

#[async_trait]
impl WorkflowHandler for SleepWorkflow {
    async fn execute(
        &self,
        params: &Map<String, Value>,
    ) -> flowgate_core::Result<Map<String, Value>> {
        let duration_ms = params
            .get("duration_ms")
            .and_then(Value::as_u64)
            .unwrap_or(1000);
        tokio::time::sleep(Duration::from_millis(duration_ms)).await;

        let mut output = Map::new();
        output.insert("slept_ms".to_string(), json!(duration_ms));
        Ok(output)
    }
}

fn register_builtin_workflows(registry: &WorkflowRegistry) {
    registry.register_fn("builtin.echo", |params| Ok(params.clone()));
    registry.register_fn("builtin.fail", |params| {
        let message = params
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("simulated failure");
        Err(FlowgateError::validation(message))
    });
    registry.register("builtin.sleep", Arc::new(SleepWorkflow));
}

fn build_runner(config: &FlowgateConfig) -> anyhow::Result<DagRunner> {
    let registry = Arc::new(WorkflowRegistry::new());
    register_builtin_workflows(&registry);

    let sink = Arc::new(FileEventSink::new(&config.events.events_path)?) as Arc<dyn EventSink>;
    let checkpoints = Arc::new(FileCheckpointStore::new(&config.events.checkpoints_path)?)
        as Arc<dyn CheckpointStore>;

    Ok(DagRunner::new(registry, sink, checkpoints, &config.runner))
}

async fn handle_run(
    runner: &DagRunner,
    dag_file: &PathBuf,
    tenant: Option<String>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let mut dag = Dag::from_yaml_file(dag_file)
        .with_context(|| format!("loading DAG from {}", dag_file.display()))?;
    if let Some(tenant) = tenant {
        dag.tenant_id = tenant;
    }

    let outcome = if dry_run {
        runner.dry_run(&dag).await?
    } else {
        runner.run_dag(&dag).await?
    };

    match outcome {
        RunOutcome::DryRun(report) => {
            println!(
                "DAG '{}' is valid; {} task(s) planned:",
                report.dag_name, report.tasks_planned
            );
            for (position, task_id) in report.planned_order.iter().enumerate() {
                println!("  {}. {}", position + 1, task_id);
            }
        }
        RunOutcome::Completed(summary) => {
            println!(
                "Run {} completed: {} task(s) succeeded in {:.2}s",
                summary.dag_run_id, summary.tasks_succeeded, summary.duration_seconds
            );
            println!("{}", serde_json::to_string_pretty(&summary.task_outputs)?);
        }
        RunOutcome::Paused(pause) => {
            print_pause_instructions(&pause.dag_run_id, &pause.checkpoint_id, dag_file);
        }
    }
    Ok(())
}

async fn handle_resume(
    runner: &DagRunner,
    dag_run_id: &str,
    dag_file: &PathBuf,
    decision: ApprovalDecision,
) -> anyhow::Result<()> {
    let dag = Dag::from_yaml_file(dag_file)
        .with_context(|| format!("loading DAG from {}", dag_file.display()))?;

    let outcome = runner.resume_dag(dag_run_id, &dag, decision).await?;
    match outcome {
        RunOutcome::Completed(summary) => {
            println!(
                "Run {} completed: {} task(s) succeeded in {:.2}s",
                summary.dag_run_id, summary.tasks_succeeded, summary.duration_seconds
            );
            println!("{}", serde_json::to_string_pretty(&summary.task_outputs)?);
        }
        RunOutcome::Paused(pause) => {
            print_pause_instructions(&pause.dag_run_id, &pause.checkpoint_id, dag_file);
        }
        RunOutcome::DryRun(_) => {}
    }
    Ok(())
}

fn print_pause_instructions(dag_run_id: &str, checkpoint_id: &str, dag_file: &PathBuf) {
    println!("Run {dag_run_id} paused at checkpoint '{checkpoint_id}'");
    println!(
        "To continue: flowgate-dag resume {} --dag {} --approve --approver <name>",
        dag_run_id,
        dag_file.display()
    );
    println!(
        "  To reject: flowgate-dag resume {} --dag {} --reject --approver <name>",
        dag_run_id,
        dag_file.display()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_structured_logging();

    let config = FlowgateConfig::from_env()?;
    let runner = build_runner(&config)?;

    info!(
        events_path = %config.events.events_path.display(),
        checkpoints_path = %config.events.checkpoints_path.display(),
        "flowgate-dag starting"
    );

    match cli.command {
        Commands::Run {
            dag_file,
            tenant,
            dry_run,
        } => handle_run(&runner, &dag_file, tenant, dry_run).await,
        Commands::Resume {
            dag_run_id,
            dag,
            approve,
            reject,
            approver,
            approver_role,
        } => {
            if !approve && !reject {
                anyhow::bail!("pass --approve or --reject to decide the pending checkpoint");
            }
            let decision = if approve {
                let decision = ApprovalDecision::approve(&approver);
                match approver_role {
                    Some(role) => decision.with_role(role),
                    None => decision,
                }
            } else {
                ApprovalDecision::reject(&approver)
            };
            handle_resume(&runner, &dag_run_id, &dag, decision).await
        }
        Commands::Status { dag_run_id } => {
            let state = runner.run_state(&dag_run_id).await?;
            println!("Run {dag_run_id}: {state}");
            if !state.is_terminal() {
                println!("The run can still progress; paused runs continue via 'flowgate-dag resume'");
            }
            Ok(())
        }
    }
}

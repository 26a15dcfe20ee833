//! Command-line front end: argument parsing, config layering and the
//! commands that drive a [`BoardEngine`].
//!
//! Settings resolve as CLI flag > environment > config file > default.

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;

use taskboard_core::{
    Board, BoardEngine, BoardEvent, ColumnId, EngineError, MoveResult, NoticeLevel, Priority,
    TaskDraft, TaskId,
};

use crate::config::{self, ClientConfig};
use crate::rest::RestApi;

#[derive(Parser, Debug)]
#[command(name = "taskboard", version, about = "Drive a Kanban board from the terminal")]
pub struct Cli {
    /// Path to config file (default: `~/.config/taskboard/client.json`).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL.
    #[arg(long, global = true, env = "TASKBOARD_URL")]
    pub base_url: Option<String>,

    /// Project whose board is loaded.
    #[arg(short, long, global = true, env = "TASKBOARD_PROJECT")]
    pub project: Option<i64>,

    /// Request timeout in seconds.
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// More log output (-v info, -vv debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the board in display order.
    Show,
    /// Move a task to a slot of a column (0 = top).
    MoveTask {
        task: i64,
        column: i64,
        #[arg(default_value_t = 0)]
        index: usize,
    },
    /// Move a column to a slot (0 = leftmost).
    MoveColumn { column: i64, index: usize },
    /// Add a column at a slot, appended when omitted.
    AddColumn {
        name: String,
        #[arg(long)]
        index: Option<usize>,
    },
    /// Rename a column. An empty name deletes it.
    RenameColumn { column: i64, name: String },
    DeleteColumn { column: i64 },
    /// Add a task at the top of a column.
    AddTask {
        column: i64,
        #[command(flatten)]
        fields: TaskFields,
    },
    /// Replace a task's editable fields.
    UpdateTask {
        task: i64,
        #[command(flatten)]
        fields: TaskFields,
    },
    DeleteTask { task: i64 },
    /// Respace a column's task scores when they got too close.
    Rebalance { column: i64 },
    /// Write the resolved settings to the config file.
    InitConfig,
}

#[derive(clap::Args, Debug, Clone)]
pub struct TaskFields {
    pub name: String,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long, default_value = "medium")]
    pub priority: Priority,
    /// RFC 3339 due date, e.g. 2025-03-01T09:00:00Z.
    #[arg(long)]
    pub due: Option<DateTime<Utc>>,
    #[arg(long = "assignee")]
    pub assignees: Vec<i64>,
    #[arg(long = "label")]
    pub labels: Vec<i64>,
}

impl From<TaskFields> for TaskDraft {
    fn from(fields: TaskFields) -> Self {
        TaskDraft {
            name: fields.name,
            description: fields.description,
            priority: fields.priority,
            assignee_ids: fields.assignees,
            label_ids: fields.labels,
            due_at: fields.due,
        }
    }
}

/// Merge CLI overrides onto the file config.
pub fn resolve(cli: &Cli, file: ClientConfig) -> ClientConfig {
    ClientConfig {
        base_url: cli.base_url.clone().unwrap_or(file.base_url),
        project_id: cli.project.or(file.project_id),
        timeout_secs: cli.timeout.unwrap_or(file.timeout_secs),
        ..file
    }
}

pub fn config_path(cli: &Cli) -> PathBuf {
    cli.config.clone().unwrap_or_else(config::default_config_path)
}

fn load(cli: &Cli) -> Result<ClientConfig, String> {
    let file = match &cli.config {
        Some(path) => config::read_config(path).map_err(|e| e.to_string())?,
        None => config::load_config(&config::default_config_path()),
    };
    Ok(resolve(cli, file))
}

pub async fn run(cli: Cli) -> Result<(), String> {
    let config = load(&cli)?;
    let path = config_path(&cli);

    if let Command::InitConfig = cli.command {
        config::save_config(&path, &config).map_err(|e| e.to_string())?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let project_id = config
        .project_id
        .ok_or("No project selected; pass --project or set project_id in the config")?;
    let api = RestApi::from_config(&config).map_err(|e| e.to_string())?;
    let engine = BoardEngine::new(api, config.scoring);
    let mut events = engine.subscribe();

    let loaded = engine.load(project_id).await;
    print_notices(&mut events);
    loaded.map_err(|e| e.to_string())?;

    let result = execute(&engine, cli.command).await;
    print_notices(&mut events);
    remember_token(&path, &config, engine.api().xsrf_token());
    result.map_err(|e| e.to_string())?;

    print!("{}", render_board(&engine.board()));
    Ok(())
}

async fn execute(engine: &BoardEngine<RestApi>, command: Command) -> Result<(), EngineError> {
    match command {
        Command::Show | Command::InitConfig => {}
        Command::MoveTask {
            task,
            column,
            index,
        } => {
            let result = engine.move_task(TaskId(task), ColumnId(column), index).await?;
            describe(&result);
        }
        Command::MoveColumn { column, index } => {
            let result = engine.move_column(ColumnId(column), index).await?;
            describe(&result);
        }
        Command::AddColumn { name, index } => {
            let index = index.unwrap_or(engine.board().columns.len());
            let id = engine.create_column(&name, index).await?;
            println!("Created {}", id);
        }
        Command::RenameColumn { column, name } => {
            engine.rename_column(ColumnId(column), &name).await?;
        }
        Command::DeleteColumn { column } => {
            engine.delete_column(ColumnId(column)).await?;
        }
        Command::AddTask { column, fields } => {
            let id = engine.create_task(ColumnId(column), fields.into()).await?;
            println!("Created {}", id);
        }
        Command::UpdateTask { task, fields } => {
            engine.update_task(TaskId(task), fields.into()).await?;
        }
        Command::DeleteTask { task } => {
            engine.delete_task(TaskId(task)).await?;
        }
        Command::Rebalance { column } => {
            let changed = engine.rebalance_column(ColumnId(column)).await?;
            println!("Rescored {} tasks", changed);
        }
    }
    Ok(())
}

fn describe(result: &MoveResult) {
    match result {
        MoveResult::Cancelled | MoveResult::NoOp => println!("Nothing to move"),
        MoveResult::TaskMoved {
            task_id,
            column_id,
            score,
        } => println!("Moved {} to {} (score {})", task_id, column_id, score),
        MoveResult::ColumnMoved { column_id, score } => {
            println!("Moved {} (score {})", column_id, score)
        }
    }
}

fn print_notices(events: &mut broadcast::Receiver<BoardEvent>) {
    while let Ok(event) = events.try_recv() {
        if let BoardEvent::Notice(notice) = event {
            match notice.level {
                NoticeLevel::Error => eprintln!("error: {}", notice.message),
                NoticeLevel::Info => eprintln!("{}", notice.message),
            }
        }
    }
}

/// Keep a refreshed CSRF token for the next run.
fn remember_token(path: &std::path::Path, config: &ClientConfig, token: Option<String>) {
    if token.is_none() || token == config.xsrf_token || !path.exists() {
        return;
    }
    let mut stored = config::load_config(path);
    stored.xsrf_token = token;
    if let Err(e) = config::save_config(path, &stored) {
        log::warn!("[taskboard.client] Could not store CSRF token: {}", e);
    }
}

/// Board as text, columns left to right and tasks top to bottom.
pub fn render_board(board: &Board) -> String {
    render_board_at(board, Utc::now())
}

fn render_board_at(board: &Board, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    if board.columns.is_empty() {
        out.push_str("(no columns)\n");
        return out;
    }
    for column in board.sorted_columns() {
        let _ = writeln!(out, "{} [{}]", column.name, column.id.0);
        for task in column.sorted_tasks() {
            let _ = write!(
                out,
                "  #{} {} ({}, score {})",
                task.id.0,
                task.name,
                task.priority.as_str(),
                task.score
            );
            if let Some(due) = task.due_at {
                let _ = write!(out, " due {}", due.format("%Y-%m-%d"));
                if board.is_overdue(task, now) {
                    out.push_str(" overdue");
                }
            }
            out.push('\n');
        }
    }
    out
}

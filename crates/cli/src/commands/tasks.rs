//! `localecho tasks` — List tasks without going through the agent.

use std::path::Path;

use anyhow::bail;
use localecho_core::store::{Task, TaskStatus, TaskStore};

use crate::TasksAction;

pub async fn run(config_path: Option<&Path>, action: TasksAction) -> anyhow::Result<()> {
    let runtime = super::runtime(config_path).await?;

    let tasks = match action {
        TasksAction::List { status } => {
            let status = match status.as_deref() {
                None | Some("all") => None,
                Some(raw) => match TaskStatus::parse(raw) {
                    Some(status) => Some(status),
                    None => bail!("Unknown task status '{raw}' (pending, completed, archived)"),
                },
            };
            runtime.store.list_tasks(status).await?
        }
        TasksAction::Archived => runtime.store.list_archived_tasks().await?,
    };

    if tasks.is_empty() {
        println!("No tasks.");
    }
    for task in &tasks {
        println!("{}", format_task(task));
    }
    Ok(())
}

fn format_task(task: &Task) -> String {
    let mark = match task.status {
        TaskStatus::Pending => "[ ]",
        TaskStatus::Completed => "[x]",
        TaskStatus::Archived => "[a]",
    };
    match &task.due_date {
        Some(due) => format!("{mark} #{} {} (due {due})", task.id, task.description),
        None => format!("{mark} #{} {}", task.id, task.description),
    }
}

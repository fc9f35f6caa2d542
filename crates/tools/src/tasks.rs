//! Task tools — thin wrappers over [`TaskStore`].
//!
//! Every message reports what the store says changed after commit.

use std::sync::Arc;

use async_trait::async_trait;
use localecho_core::error::ToolError;
use localecho_core::session::SessionContext;
use localecho_core::store::{TaskStatus, TaskStore};
use localecho_core::tool::{ParamKind, ParamSpec, Tool, ToolArgs};
use tracing::info;

pub struct AddTaskTool {
    store: Arc<dyn TaskStore>,
}

impl AddTaskTool {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

static ADD_TASK_PARAMS: [ParamSpec; 2] = [
    ParamSpec::required("description", ParamKind::Str),
    ParamSpec::optional("due_date", ParamKind::Str),
];

#[async_trait]
impl Tool for AddTaskTool {
    fn name(&self) -> &'static str {
        "add_task"
    }

    fn description(&self) -> &'static str {
        "Add a new task to the to-do list."
    }

    fn params(&self) -> &'static [ParamSpec] {
        &ADD_TASK_PARAMS
    }

    fn example(&self) -> Option<&'static str> {
        Some("add_task(\"Buy milk\")")
    }

    async fn execute(&self, args: ToolArgs, _session: &mut SessionContext) -> Result<String, ToolError> {
        let description = args.require_str("description")?;
        let id = self.store.add_task(description, args.str("due_date")).await?;
        info!(task_id = id, "Task added");
        Ok(format!("✅ Added task ID {id}: {description}"))
    }
}

pub struct ListTasksTool {
    store: Arc<dyn TaskStore>,
}

impl ListTasksTool {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ListTasksTool {
    fn name(&self) -> &'static str {
        "list_tasks"
    }

    fn description(&self) -> &'static str {
        "List all pending tasks, newest first."
    }

    fn example(&self) -> Option<&'static str> {
        Some("list_tasks()")
    }

    async fn execute(&self, _args: ToolArgs, _session: &mut SessionContext) -> Result<String, ToolError> {
        let tasks = self.store.list_tasks(Some(TaskStatus::Pending)).await?;
        if tasks.is_empty() {
            return Ok("No pending tasks.".into());
        }
        let lines: Vec<String> = tasks
            .iter()
            .map(|t| match &t.due_date {
                Some(due) => format!("- ID {}: {} (due {due})", t.id, t.description),
                None => format!("- ID {}: {}", t.id, t.description),
            })
            .collect();
        Ok(lines.join("\n"))
    }
}

static TASK_ID_PARAMS: [ParamSpec; 1] = [ParamSpec::required("task_id", ParamKind::Int)];

static DESCRIPTION_PARAMS: [ParamSpec; 1] = [ParamSpec::required("description", ParamKind::Str)];

pub struct CompleteTaskTool {
    store: Arc<dyn TaskStore>,
}

impl CompleteTaskTool {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CompleteTaskTool {
    fn name(&self) -> &'static str {
        "complete_task"
    }

    fn description(&self) -> &'static str {
        "Mark a pending task as complete by its ID."
    }

    fn params(&self) -> &'static [ParamSpec] {
        &TASK_ID_PARAMS
    }

    fn example(&self) -> Option<&'static str> {
        Some("complete_task(3)")
    }

    async fn execute(&self, args: ToolArgs, _session: &mut SessionContext) -> Result<String, ToolError> {
        let id = args.require_int("task_id")?;
        if self.store.complete_task(id).await? {
            Ok(format!("✅ Marked task {id} as complete."))
        } else {
            Ok(format!("❌ Task {id} not found."))
        }
    }
}

pub struct CompleteTaskByDescriptionTool {
    store: Arc<dyn TaskStore>,
}

impl CompleteTaskByDescriptionTool {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CompleteTaskByDescriptionTool {
    fn name(&self) -> &'static str {
        "complete_task_by_description"
    }

    fn description(&self) -> &'static str {
        "Complete the newest pending task whose description contains the given text."
    }

    fn params(&self) -> &'static [ParamSpec] {
        &DESCRIPTION_PARAMS
    }

    fn example(&self) -> Option<&'static str> {
        Some("complete_task_by_description(\"milk\")")
    }

    async fn execute(&self, args: ToolArgs, _session: &mut SessionContext) -> Result<String, ToolError> {
        let query = args.require_str("description")?;
        match self.store.complete_task_by_description(query).await? {
            Some(task) => Ok(format!("✅ Marked task '{}' as complete.", task.description)),
            None => Ok("❌ No matching pending task found.".into()),
        }
    }
}

pub struct DeleteTaskTool {
    store: Arc<dyn TaskStore>,
}

impl DeleteTaskTool {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for DeleteTaskTool {
    fn name(&self) -> &'static str {
        "delete_task"
    }

    fn description(&self) -> &'static str {
        "Delete a task by its ID."
    }

    fn params(&self) -> &'static [ParamSpec] {
        &TASK_ID_PARAMS
    }

    async fn execute(&self, args: ToolArgs, _session: &mut SessionContext) -> Result<String, ToolError> {
        let id = args.require_int("task_id")?;
        if self.store.delete_task(id).await? {
            Ok(format!("🗑️ Deleted task {id}."))
        } else {
            Ok(format!("❌ Task {id} not found."))
        }
    }
}

pub struct DeleteTaskByDescriptionTool {
    store: Arc<dyn TaskStore>,
}

impl DeleteTaskByDescriptionTool {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for DeleteTaskByDescriptionTool {
    fn name(&self) -> &'static str {
        "delete_task_by_description"
    }

    fn description(&self) -> &'static str {
        "Delete the newest pending task whose description contains the given text."
    }

    fn params(&self) -> &'static [ParamSpec] {
        &DESCRIPTION_PARAMS
    }

    fn example(&self) -> Option<&'static str> {
        Some("delete_task_by_description(\"dentist\")")
    }

    async fn execute(&self, args: ToolArgs, _session: &mut SessionContext) -> Result<String, ToolError> {
        let query = args.require_str("description")?;
        match self.store.delete_task_by_description(query).await? {
            Some(task) => Ok(format!("🗑️ Deleted task '{}'.", task.description)),
            None => Ok("❌ No matching task found.".into()),
        }
    }
}

pub struct CompleteAllTasksTool {
    store: Arc<dyn TaskStore>,
}

impl CompleteAllTasksTool {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CompleteAllTasksTool {
    fn name(&self) -> &'static str {
        "complete_all_tasks"
    }

    fn description(&self) -> &'static str {
        "Mark every pending task as complete."
    }

    async fn execute(&self, _args: ToolArgs, _session: &mut SessionContext) -> Result<String, ToolError> {
        let count = self.store.complete_all_tasks().await?;
        Ok(format!("✅ Completed {count} tasks."))
    }
}

pub struct DeleteCompletedTasksTool {
    store: Arc<dyn TaskStore>,
}

impl DeleteCompletedTasksTool {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for DeleteCompletedTasksTool {
    fn name(&self) -> &'static str {
        "delete_completed_tasks"
    }

    fn description(&self) -> &'static str {
        "Permanently delete every completed task."
    }

    async fn execute(&self, _args: ToolArgs, _session: &mut SessionContext) -> Result<String, ToolError> {
        let count = self.store.delete_completed_tasks().await?;
        Ok(format!("🗑️ Deleted {count} completed tasks."))
    }
}

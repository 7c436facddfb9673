use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Error;


#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn parse(s: &str) -> Result<Self, Error> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(Error::InvalidPriority(s.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct TaskList {
    pub id: i64,
    pub name: String,
    pub raw_input: String,
    pub analysis: String,
    pub created_at: String,
    pub updated_at: String,
}

impl fmt::Display for TaskList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}


#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct Task {
    pub id: i64,
    pub task_id: String,
    pub task_list_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub estimated_duration: u32,
    pub completed: bool,
    pub schedule_order: Option<u32>,
    pub can_run_parallel: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} min)", self.title, self.estimated_duration)
    }
}


/// Fields for inserting a task. `task_id` is generated when left empty.
#[derive(Clone, Debug, Default)]
pub struct NewTask {
    pub task_id: Option<String>,
    pub task_list_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub estimated_duration: u32,
    pub schedule_order: Option<u32>,
    pub can_run_parallel: bool,
}


#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskListDetail {
    pub task_list: TaskList,
    pub tasks: Vec<Task>,
    pub total_estimated_time: u64,
}


#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskDependencies {
    pub task: Task,
    pub dependencies: Vec<DependencyRef>,
    pub has_no_dependencies: bool,
}


#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct DependencyRef {
    pub task_id: String,
    pub title: String,
}


#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DependencyView {
    pub task_list: TaskList,
    pub tasks: Vec<TaskDependencies>,
}


/// Form body for grooming a new todo list.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProcessTodo {
    #[serde(default)]
    pub task_list_name: String,
    #[serde(default)]
    pub todo_text: String,
    #[serde(default)]
    pub context: String,
}


#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResetResult {
    pub success: bool,
    pub message: String,
}

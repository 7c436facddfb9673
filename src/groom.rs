use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::Config;
use crate::error::Error;
use crate::llm::{self, AnthropicClient, Completion};
use crate::store::{self, Store};
use crate::tasks::{NewTask, Priority, Task, TaskList};

pub const DEFAULT_DURATION: u32 = 30;


#[derive(Debug, thiserror::Error)]
pub enum GroomError {
    #[error("{0}")]
    NotConfigured(llm::Error),
    #[error("API request failed: {0}")]
    Request(llm::Error),
    #[error("Unexpected error: {0}")]
    Malformed(String),
    #[error(transparent)]
    Store(#[from] Error),
}

impl From<llm::Error> for GroomError {
    fn from(err: llm::Error) -> Self {
        match err {
            llm::Error::MissingApiKey => Self::NotConfigured(err),
            llm::Error::Reqwest(_) => Self::Request(err),
            llm::Error::EmptyResponse => Self::Malformed(err.to_string()),
        }
    }
}


/// What the model returned for one todo text.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Groomed {
    #[serde(default, deserialize_with = "text")]
    pub analysis: String,
    #[serde(default, deserialize_with = "descriptors")]
    pub tasks: Vec<GroomedTask>,
}


#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroomedTask {
    #[serde(default = "untitled", deserialize_with = "title")]
    pub task: String,
    /// Only meaningful inside one response.
    #[serde(default = "unknown_id", alias = "task_id", deserialize_with = "gen_id")]
    pub gen_task_id: String,
    #[serde(default = "default_estimate", deserialize_with = "estimate")]
    pub time_estimate: String,
    #[serde(default, deserialize_with = "priority")]
    pub priority: Priority,
    #[serde(default, deserialize_with = "gen_ids")]
    pub dependencies: Vec<String>,
    #[serde(default, deserialize_with = "flag")]
    pub can_run_parallel: bool,
}

fn untitled() -> String {
    "Untitled Task".to_string()
}

fn unknown_id() -> String {
    "unknown".to_string()
}

fn default_estimate() -> String {
    "00:30".to_string()
}

fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn title<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) if !s.trim().is_empty() => s,
        _ => untitled(),
    })
}

fn gen_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(id_from_value(&Value::deserialize(d)?).unwrap_or_else(unknown_id))
}

fn gen_ids<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(values) => values.iter().filter_map(id_from_value).collect(),
        _ => Vec::new(),
    })
}

fn estimate<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        _ => default_estimate(),
    })
}

fn priority<'de, D: Deserializer<'de>>(d: D) -> Result<Priority, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Priority::parse(&s).unwrap_or_default(),
        _ => Priority::default(),
    })
}

fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Bool(b) => b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    })
}

fn descriptors<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<GroomedTask>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(Vec::new()),
        value => serde_json::from_value(value).map_err(serde::de::Error::custom),
    }
}


/// Converts an `hh:mm` estimate to minutes, falling back to 30.
pub fn parse_time_estimate(time: &str) -> u32 {
    let parts: Vec<&str> = time.split(':').collect();
    let [hours, minutes] = parts.as_slice() else {
        return DEFAULT_DURATION;
    };

    match (hours.trim().parse::<u32>(), minutes.trim().parse::<u32>()) {
        (Ok(hours), Ok(minutes)) if minutes < 60 => hours
            .checked_mul(60)
            .and_then(|h| h.checked_add(minutes))
            .unwrap_or(DEFAULT_DURATION),
        _ => DEFAULT_DURATION,
    }
}


pub fn build_prompt(todo_text: &str, context: &str) -> String {
    let context = if context.trim().is_empty() {
        "No additional context provided"
    } else {
        context
    };

    format!(
        r#"
You are a personal assistant. Your client will give you a text listing things they must get done. Work out what is overwhelming them, split big tasks into smaller ones and add those to the list. Identify each individual task and suggest a realistic time in which it could be done. Reword every task so it is specific and actionable, no fluff, no emojis.

Original todo: "{todo_text}"

Additional context: {context}

Please provide:
1. A JSON array "tasks" of actionable tasks derived from the original todo. Each object has:
   - "task": the reworded task
   - "gen_task_id": an identifier you make up for this task, in any format. It is only used to refer to tasks inside this response.
   - "time_estimate": a realistic estimate in hh:mm format, not too short
   - "dependencies": the gen_task_id values this task depends on, if any
   - "priority": low, medium or high
   - "can_run_parallel": true if the task can be done alongside other tasks, false otherwise
2. "analysis": a brief explanation of the breakdown and the reasoning behind it, as concise as possible.

IMPORTANT: every gen_task_id must be unique within your response, because dependencies are mapped through them.

Format your response as a JSON object.
"#
    )
}


/// Parses model text, falling back to the outermost `{...}` span.
pub fn parse_groomed(text: &str) -> Result<Groomed, GroomError> {
    if let Ok(groomed) = serde_json::from_str::<Groomed>(text) {
        return Ok(groomed);
    }

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str(&text[start..=end])
                .map_err(|err| GroomError::Malformed(err.to_string()))
        }
        _ => Err(GroomError::Malformed(
            "Could not extract valid JSON from Claude response".to_string(),
        )),
    }
}


/// Stores a task list for `groomed` along with its tasks and dependency edges.
pub async fn persist(
    store: &Store,
    name: &str,
    raw_input: &str,
    groomed: &Groomed,
) -> Result<TaskList, GroomError> {
    let task_list = store
        .transaction(|conn| {
            let task_list = store::create_task_list(conn, name, raw_input, &groomed.analysis)?;

            let mut used = HashSet::new();
            let mut by_gen_id: HashMap<&str, Task> = HashMap::new();
            for (position, descriptor) in groomed.tasks.iter().enumerate() {
                let task_id = store::generate_task_id(conn, &used)?;
                used.insert(task_id.clone());

                let task = store::create_task(conn, &NewTask {
                    task_id: Some(task_id),
                    task_list_id: Some(task_list.id),
                    title: descriptor.task.clone(),
                    description: descriptor.task.clone(),
                    priority: descriptor.priority,
                    estimated_duration: parse_time_estimate(&descriptor.time_estimate),
                    schedule_order: u32::try_from(position).ok(),
                    can_run_parallel: descriptor.can_run_parallel,
                })?;
                by_gen_id.insert(descriptor.gen_task_id.as_str(), task);
            }

            for descriptor in groomed.tasks.iter() {
                let Some(task) = by_gen_id.get(descriptor.gen_task_id.as_str()) else {
                    continue;
                };
                for gen_dependency in descriptor.dependencies.iter() {
                    let Some(dependency) = by_gen_id.get(gen_dependency.as_str()) else {
                        tracing::debug!(gen_id = %gen_dependency, "unknown dependency skipped");
                        continue;
                    };
                    match store::add_dependency(conn, task, dependency) {
                        Ok(()) => {}
                        Err(Error::CircularDependency { task, dependency }) => {
                            tracing::warn!(%task, %dependency, "circular dependency skipped");
                        }
                        Err(err) => return Err(err),
                    }
                }
            }

            Ok::<_, Error>(task_list)
        })
        .await?;

    tracing::info!(
        task_list = task_list.id,
        tasks = groomed.tasks.len(),
        "stored groomed task list"
    );
    Ok(task_list)
}


#[derive(Clone)]
pub struct Groomer {
    completion: Arc<dyn Completion>,
}

impl Groomer {
    pub fn new(completion: Arc<dyn Completion>) -> Self {
        Self { completion }
    }

    pub fn from_config(config: &Config) -> Result<Self, GroomError> {
        Ok(Self::new(Arc::new(AnthropicClient::new(config)?)))
    }

    pub async fn groom(&self, todo_text: &str, context: &str) -> Result<Groomed, GroomError> {
        let prompt = build_prompt(todo_text, context);
        let text = self.completion.complete(&prompt).await?;
        parse_groomed(&text)
    }

    /// Grooms `todo_text` and stores the result. Nothing is written when
    /// grooming fails.
    pub async fn process_todo(
        &self,
        store: &Store,
        name: &str,
        todo_text: &str,
        context: &str,
    ) -> Result<(TaskList, String), GroomError> {
        let groomed = self.groom(todo_text, context).await?;
        let task_list = persist(store, name, todo_text, &groomed).await?;
        Ok((task_list, groomed.analysis))
    }
}

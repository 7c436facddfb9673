use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::Error;
use crate::tasks::{Task, TaskList};


#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Sequential,
    Parallel,
    #[default]
    Dependency,
}

impl Strategy {
    pub fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "sequential" => Ok(Self::Sequential),
            "parallel" => Ok(Self::Parallel),
            "dependency" => Ok(Self::Dependency),
            _ => Err(Error::InvalidStrategy(s.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::Dependency => "dependency",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


/// Stored result of the last timeline computation for a task list.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct Schedule {
    pub id: i64,
    pub task_list_id: i64,
    pub strategy: Strategy,
    pub total_estimated_duration: Option<u64>,
    pub parallel_blocks: Vec<Vec<String>>,
    pub created_at: String,
}


#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Plan {
    pub blocks: Vec<Vec<String>>,
    pub total: u64,
}


#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Timeline {
    pub task_list: TaskList,
    pub schedule: Schedule,
    pub blocks: Vec<Vec<Task>>,
    /// First block that still has work left in it.
    pub current: Option<usize>,
}


/// Groups `tasks` into blocks that can be worked on together. `edges` are
/// `(task, depends_on)` pairs of hex task ids.
pub fn plan(
    tasks: &[Task],
    edges: &[(String, String)],
    strategy: Strategy,
) -> Result<Plan, Error> {
    match strategy {
        Strategy::Sequential => Ok(Plan {
            blocks: tasks.iter().map(|t| vec![t.task_id.clone()]).collect(),
            total: tasks
                .iter()
                .fold(0, |total: u64, t| total.saturating_add(t.estimated_duration.into())),
        }),
        Strategy::Parallel => {
            let (parallel, serial): (Vec<&Task>, Vec<&Task>) =
                tasks.iter().partition(|t| t.can_run_parallel);

            let mut blocks = Vec::new();
            let mut total: u64 = 0;
            if !parallel.is_empty() {
                blocks.push(parallel.iter().map(|t| t.task_id.clone()).collect());
                total = total.saturating_add(longest(&parallel));
            }
            for task in serial {
                blocks.push(vec![task.task_id.clone()]);
                total = total.saturating_add(task.estimated_duration.into());
            }

            Ok(Plan { blocks, total })
        }
        Strategy::Dependency => layers(tasks, edges),
    }
}


fn layers(tasks: &[Task], edges: &[(String, String)]) -> Result<Plan, Error> {
    let known: HashSet<&str> = tasks.iter().map(|t| t.task_id.as_str()).collect();
    let mut depends_on: HashMap<&str, Vec<&str>> = HashMap::new();
    for (task, dependency) in edges {
        if known.contains(task.as_str()) && known.contains(dependency.as_str()) {
            depends_on.entry(task.as_str()).or_default().push(dependency.as_str());
        }
    }

    let mut placed: HashSet<&str> = HashSet::new();
    let mut pending: Vec<&Task> = tasks.iter().collect();
    let mut blocks = Vec::new();
    let mut total: u64 = 0;

    while !pending.is_empty() {
        let (ready, blocked): (Vec<&Task>, Vec<&Task>) = pending
            .into_iter()
            .partition(|t| {
                depends_on
                    .get(t.task_id.as_str())
                    .map_or(true, |deps| deps.iter().all(|d| placed.contains(d)))
            });

        if ready.is_empty() {
            return Err(Error::UnresolvedDependencies(
                blocked.iter().map(|t| t.task_id.clone()).collect(),
            ));
        }

        total = total.saturating_add(longest(&ready));
        placed.extend(ready.iter().map(|t| t.task_id.as_str()));
        blocks.push(ready.iter().map(|t| t.task_id.clone()).collect());
        pending = blocked;
    }

    Ok(Plan { blocks, total })
}


fn longest(tasks: &[&Task]) -> u64 {
    tasks.iter().map(|t| u64::from(t.estimated_duration)).max().unwrap_or(0)
}


pub fn timeline(task_list: TaskList, schedule: Schedule, tasks: Vec<Task>) -> Timeline {
    let mut by_id: HashMap<String, Task> = tasks
        .into_iter()
        .map(|t| (t.task_id.clone(), t))
        .collect();

    let blocks: Vec<Vec<Task>> = schedule
        .parallel_blocks
        .iter()
        .map(|block| block.iter().filter_map(|id| by_id.remove(id)).collect())
        .collect();

    let current = blocks
        .iter()
        .position(|block: &Vec<Task>| block.iter().any(|t| !t.completed));

    Timeline { task_list, schedule, blocks, current }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::Priority;

    fn task(id: &str, minutes: u32, parallel: bool) -> Task {
        Task {
            id: 0,
            task_id: id.to_string(),
            task_list_id: Some(1),
            title: format!("Task {id}"),
            description: String::new(),
            priority: Priority::Medium,
            estimated_duration: minutes,
            completed: false,
            schedule_order: None,
            can_run_parallel: parallel,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn edge(task: &str, dependency: &str) -> (String, String) {
        (task.to_string(), dependency.to_string())
    }

    #[test]
    fn sequential_sums_everything() {
        let tasks = vec![task("a", 120, false), task("b", 45, true)];
        let plan = plan(&tasks, &[], Strategy::Sequential).unwrap();
        assert_eq!(plan.blocks, vec![vec!["a".to_string()], vec!["b".to_string()]]);
        assert_eq!(plan.total, 165);
    }

    #[test]
    fn parallel_groups_flagged_tasks() {
        let tasks = vec![
            task("a", 120, false),
            task("b", 45, true),
            task("c", 30, true),
        ];
        let plan = plan(&tasks, &[], Strategy::Parallel).unwrap();
        assert_eq!(plan.blocks[0], vec!["b".to_string(), "c".to_string()]);
        assert_eq!(plan.blocks[1], vec!["a".to_string()]);
        assert_eq!(plan.total, 45 + 120);
    }

    #[test]
    fn dependency_layers() {
        let tasks = vec![
            task("a", 60, false),
            task("b", 90, false),
            task("c", 45, false),
            task("d", 10, false),
        ];
        let edges = vec![edge("c", "a"), edge("c", "b"), edge("d", "c")];
        let plan = plan(&tasks, &edges, Strategy::Dependency).unwrap();
        assert_eq!(plan.blocks.len(), 3);
        assert_eq!(plan.blocks[0], vec!["a".to_string(), "b".to_string()]);
        assert_eq!(plan.blocks[1], vec!["c".to_string()]);
        assert_eq!(plan.blocks[2], vec!["d".to_string()]);
        assert_eq!(plan.total, 90 + 45 + 10);
    }

    #[test]
    fn dependency_ignores_outside_edges() {
        let tasks = vec![task("a", 5, false)];
        let plan = plan(&tasks, &[edge("a", "zzzz")], Strategy::Dependency).unwrap();
        assert_eq!(plan.blocks, vec![vec!["a".to_string()]]);
    }

    #[test]
    fn dependency_reports_cycles() {
        let tasks = vec![task("a", 5, false), task("b", 5, false)];
        let edges = vec![edge("a", "b"), edge("b", "a")];
        assert!(matches!(
            plan(&tasks, &edges, Strategy::Dependency),
            Err(Error::UnresolvedDependencies(_))
        ));
    }

    #[test]
    fn timeline_points_at_first_open_block() {
        let mut done = task("a", 5, false);
        done.completed = true;
        let tasks = vec![done, task("b", 5, false)];
        let schedule = Schedule {
            id: 1,
            task_list_id: 1,
            strategy: Strategy::Sequential,
            total_estimated_duration: Some(10),
            parallel_blocks: vec![vec!["a".into()], vec!["b".into()]],
            created_at: String::new(),
        };
        let list = TaskList {
            id: 1,
            name: "List".into(),
            raw_input: String::new(),
            analysis: String::new(),
            created_at: String::new(),
            updated_at: String::new(),
        };
        let timeline = timeline(list, schedule, tasks);
        assert_eq!(timeline.current, Some(1));
        assert_eq!(timeline.blocks[1][0].task_id, "b");
    }

    #[test]
    fn huge_estimates_do_not_overflow() {
        let huge = crate::groom::parse_time_estimate("71582788:00");
        assert_eq!(huge, 4_294_967_280);
        let tasks = vec![task("a", huge, false), task("b", huge, true)];

        let sequential = plan(&tasks, &[], Strategy::Sequential).unwrap();
        assert_eq!(sequential.total, 2 * 4_294_967_280);
        let parallel = plan(&tasks, &[], Strategy::Parallel).unwrap();
        assert_eq!(parallel.total, 2 * 4_294_967_280);
        let layered = plan(&tasks, &[edge("b", "a")], Strategy::Dependency).unwrap();
        assert_eq!(layered.total, 2 * 4_294_967_280);
    }

    #[test]
    fn strategy_parse() {
        assert_eq!(Strategy::parse("parallel").unwrap(), Strategy::Parallel);
        assert!(Strategy::parse("random").is_err());
    }
}

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::Error;
use crate::schedule::{Schedule, Strategy};
use crate::tasks::{NewTask, Priority, Task, TaskList};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS task_lists (
    id          INTEGER PRIMARY KEY,
    name        TEXT NOT NULL,
    raw_input   TEXT NOT NULL,
    analysis    TEXT NOT NULL DEFAULT '',
    created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

CREATE TABLE IF NOT EXISTS tasks (
    id                 INTEGER PRIMARY KEY,
    task_id            TEXT NOT NULL UNIQUE,
    task_list_id       INTEGER REFERENCES task_lists(id) ON DELETE CASCADE,
    title              TEXT NOT NULL,
    description        TEXT NOT NULL DEFAULT '',
    priority           TEXT NOT NULL DEFAULT 'medium' CHECK(priority IN ('low', 'medium', 'high')),
    estimated_duration INTEGER NOT NULL CHECK(estimated_duration >= 0),
    completed          INTEGER NOT NULL DEFAULT 0,
    schedule_order     INTEGER,
    can_run_parallel   INTEGER NOT NULL DEFAULT 0,
    created_at         TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    updated_at         TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

CREATE TABLE IF NOT EXISTS task_dependencies (
    task       INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    depends_on INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    PRIMARY KEY (task, depends_on),
    CHECK (task != depends_on)
);

CREATE TABLE IF NOT EXISTS schedules (
    id                       INTEGER PRIMARY KEY,
    task_list_id             INTEGER NOT NULL REFERENCES task_lists(id) ON DELETE CASCADE,
    strategy                 TEXT NOT NULL CHECK(strategy IN ('sequential', 'parallel', 'dependency')),
    total_estimated_duration INTEGER,
    parallel_blocks          TEXT NOT NULL DEFAULT '[]',
    created_at               TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_tasks_task_list ON tasks(task_list_id);
";

const TASK_COLUMNS: &str = "id, task_id, task_list_id, title, description, priority, \
    estimated_duration, completed, schedule_order, can_run_parallel, created_at, updated_at";

const MAX_ID_ATTEMPTS: usize = 10_000;

fn set_pragmas(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    Ok(())
}

pub fn open(path: &Path) -> Result<Connection, Error> {
    let conn = Connection::open(path)?;
    set_pragmas(&conn)?;
    init(&conn)?;
    Ok(conn)
}

pub fn open_memory() -> Result<Connection, Error> {
    let conn = Connection::open_in_memory()?;
    set_pragmas(&conn)?;
    init(&conn)?;
    Ok(conn)
}

pub fn init(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}


fn task_from_row(row: &Row) -> rusqlite::Result<Task> {
    let priority: String = row.get(5)?;
    let priority = Priority::parse(&priority).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(err))
    })?;

    Ok(Task {
        id: row.get(0)?,
        task_id: row.get(1)?,
        task_list_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        priority,
        estimated_duration: row.get(6)?,
        completed: row.get(7)?,
        schedule_order: row.get(8)?,
        can_run_parallel: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn task_list_from_row(row: &Row) -> rusqlite::Result<TaskList> {
    Ok(TaskList {
        id: row.get(0)?,
        name: row.get(1)?,
        raw_input: row.get(2)?,
        analysis: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}


pub fn create_task_list(
    conn: &Connection,
    name: &str,
    raw_input: &str,
    analysis: &str,
) -> Result<TaskList, Error> {
    conn.execute(
        "INSERT INTO task_lists (name, raw_input, analysis) VALUES (?1, ?2, ?3)",
        params![name, raw_input, analysis],
    )?;
    get_task_list(conn, conn.last_insert_rowid())
}

pub fn get_task_list(conn: &Connection, id: i64) -> Result<TaskList, Error> {
    conn.query_row(
        "SELECT id, name, raw_input, analysis, created_at, updated_at
         FROM task_lists WHERE id = ?1",
        [id],
        task_list_from_row,
    )
    .optional()?
    .ok_or(Error::TaskListNotFound(id))
}

pub fn list_task_lists(conn: &Connection) -> Result<Vec<TaskList>, Error> {
    let mut stmt = conn.prepare(
        "SELECT id, name, raw_input, analysis, created_at, updated_at
         FROM task_lists ORDER BY id DESC",
    )?;
    let lists = stmt
        .query_map([], task_list_from_row)?
        .collect::<rusqlite::Result<_>>()?;
    Ok(lists)
}

pub fn delete_task_list(conn: &Connection, id: i64) -> Result<(), Error> {
    let deleted = conn.execute("DELETE FROM task_lists WHERE id = ?1", [id])?;
    if deleted == 0 {
        return Err(Error::TaskListNotFound(id));
    }
    Ok(())
}

pub fn total_estimated_time(conn: &Connection, task_list_id: i64) -> Result<u64, Error> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(estimated_duration), 0) FROM tasks WHERE task_list_id = ?1",
        [task_list_id],
        |row| row.get(0),
    )?;
    Ok(u64::try_from(total).unwrap_or(0))
}


fn task_id_exists(conn: &Connection, task_id: &str) -> Result<bool, Error> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM tasks WHERE task_id = ?1",
        [task_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Returns a random 4 character hex id that is neither in `used` nor stored.
pub fn generate_task_id(conn: &Connection, used: &HashSet<String>) -> Result<String, Error> {
    for _ in 0..MAX_ID_ATTEMPTS {
        let candidate = format!("{:04x}", rand::random::<u16>());
        if !used.contains(&candidate) && !task_id_exists(conn, &candidate)? {
            return Ok(candidate);
        }
    }
    Err(Error::TaskIdsExhausted)
}

pub fn create_task(conn: &Connection, task: &NewTask) -> Result<Task, Error> {
    let task_id = match task.task_id {
        Some(ref id) => id.clone(),
        None => generate_task_id(conn, &HashSet::new())?,
    };

    conn.execute(
        "INSERT INTO tasks (task_id, task_list_id, title, description, priority,
                            estimated_duration, schedule_order, can_run_parallel)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            task_id,
            task.task_list_id,
            task.title,
            task.description,
            task.priority.as_str(),
            task.estimated_duration,
            task.schedule_order,
            task.can_run_parallel,
        ],
    )?;
    get_task(conn, &task_id)
}

pub fn get_task(conn: &Connection, task_id: &str) -> Result<Task, Error> {
    conn.query_row(
        &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE task_id = ?1"),
        [task_id],
        task_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))
}

pub fn list_tasks(conn: &Connection, task_list_id: i64) -> Result<Vec<Task>, Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE task_list_id = ?1
         ORDER BY schedule_order IS NULL, schedule_order, id"
    ))?;
    let tasks = stmt
        .query_map([task_list_id], task_from_row)?
        .collect::<rusqlite::Result<_>>()?;
    Ok(tasks)
}

pub fn mark_completed(conn: &Connection, task_id: &str) -> Result<Task, Error> {
    let updated = conn.execute(
        "UPDATE tasks SET completed = 1, updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
         WHERE task_id = ?1",
        [task_id],
    )?;
    if updated == 0 {
        return Err(Error::TaskNotFound(task_id.to_string()));
    }
    get_task(conn, task_id)
}


fn depends_on_ids(conn: &Connection, id: i64) -> Result<Vec<i64>, Error> {
    let mut stmt =
        conn.prepare_cached("SELECT depends_on FROM task_dependencies WHERE task = ?1")?;
    let ids = stmt
        .query_map([id], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;
    Ok(ids)
}

/// Whether making `task` depend on `dependency` would close a loop.
pub fn detect_dependency_cycle(
    conn: &Connection,
    task: &Task,
    dependency: &Task,
) -> Result<bool, Error> {
    if task.id == dependency.id {
        return Ok(true);
    }

    // Depth-first from the new dependency along existing edges
    let mut visited = HashSet::new();
    let mut stack = vec![dependency.id];
    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        for next in depends_on_ids(conn, current)? {
            if next == task.id {
                return Ok(true);
            }
            stack.push(next);
        }
    }
    Ok(false)
}

pub fn add_dependency(conn: &Connection, task: &Task, dependency: &Task) -> Result<(), Error> {
    if detect_dependency_cycle(conn, task, dependency)? {
        return Err(Error::CircularDependency {
            task: task.task_id.clone(),
            dependency: dependency.task_id.clone(),
        });
    }
    conn.execute(
        "INSERT OR IGNORE INTO task_dependencies (task, depends_on) VALUES (?1, ?2)",
        params![task.id, dependency.id],
    )?;
    Ok(())
}

pub fn clear_dependencies(conn: &Connection, task: &Task) -> Result<(), Error> {
    conn.execute("DELETE FROM task_dependencies WHERE task = ?1", [task.id])?;
    Ok(())
}

/// Tasks that `task` depends on.
pub fn dependencies(conn: &Connection, task: &Task) -> Result<Vec<Task>, Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks
         WHERE id IN (SELECT depends_on FROM task_dependencies WHERE task = ?1)
         ORDER BY id"
    ))?;
    let tasks = stmt
        .query_map([task.id], task_from_row)?
        .collect::<rusqlite::Result<_>>()?;
    Ok(tasks)
}

/// `(task, depends_on)` hex id pairs for every edge leaving a task in the list.
pub fn dependency_edges(
    conn: &Connection,
    task_list_id: i64,
) -> Result<Vec<(String, String)>, Error> {
    let mut stmt = conn.prepare(
        "SELECT t.task_id, d.task_id
         FROM task_dependencies td
         JOIN tasks t ON t.id = td.task
         JOIN tasks d ON d.id = td.depends_on
         WHERE t.task_list_id = ?1
         ORDER BY t.id, d.id",
    )?;
    let edges = stmt
        .query_map([task_list_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<_>>()?;
    Ok(edges)
}


pub fn save_schedule(
    conn: &Connection,
    task_list_id: i64,
    strategy: Strategy,
    total: u64,
    blocks: &[Vec<String>],
) -> Result<Schedule, Error> {
    conn.execute(
        "INSERT INTO schedules (task_list_id, strategy, total_estimated_duration, parallel_blocks)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            task_list_id,
            strategy.as_str(),
            i64::try_from(total).unwrap_or(i64::MAX),
            serde_json::to_string(blocks)?
        ],
    )?;
    let id = conn.last_insert_rowid();
    let created_at: String = conn.query_row(
        "SELECT created_at FROM schedules WHERE id = ?1",
        [id],
        |row| row.get(0),
    )?;

    Ok(Schedule {
        id,
        task_list_id,
        strategy,
        total_estimated_duration: Some(total),
        parallel_blocks: blocks.to_vec(),
        created_at,
    })
}

pub fn latest_schedule(conn: &Connection, task_list_id: i64) -> Result<Option<Schedule>, Error> {
    let row = conn
        .query_row(
            "SELECT id, strategy, total_estimated_duration, parallel_blocks, created_at
             FROM schedules WHERE task_list_id = ?1 ORDER BY id DESC LIMIT 1",
            [task_list_id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((id, strategy, total, blocks, created_at)) => Ok(Some(Schedule {
            id,
            task_list_id,
            strategy: Strategy::parse(&strategy)?,
            total_estimated_duration: total.and_then(|t| u64::try_from(t).ok()),
            parallel_blocks: serde_json::from_str(&blocks)?,
            created_at,
        })),
        None => Ok(None),
    }
}


/// Deletes every task and task list, returning `(tasks, task_lists)` removed.
/// Run it through [`Store::transaction`].
pub fn reset(conn: &Connection) -> Result<(usize, usize), Error> {
    let tasks = conn.execute("DELETE FROM tasks", [])?;
    let task_lists = conn.execute("DELETE FROM task_lists", [])?;
    Ok((tasks, task_lists))
}


/// Shared handle on the database.
#[derive(Clone, Debug)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn new(conn: Connection) -> Self {
        Self { conn: Arc::new(Mutex::new(conn)) }
    }

    pub fn open(path: &Path) -> Result<Self, Error> {
        Ok(Self::new(open(path)?))
    }

    pub fn memory() -> Result<Self, Error> {
        Ok(Self::new(open_memory()?))
    }

    /// Runs `f` with the connection held.
    pub async fn with<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
    {
        let conn = self.conn.lock().await;
        f(&*conn)
    }

    /// Runs `f` inside a transaction, committing only when it succeeds.
    pub async fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<Error>,
    {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction().map_err(Error::from)?;
        let value = f(&*tx)?;
        tx.commit().map_err(Error::from)?;
        Ok(value)
    }
}

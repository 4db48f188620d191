//! SQLite-backed todo repository.
//!
//! # Responsibility
//! - Persist todos across restarts with the same contract as the in-memory store.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths call `Todo::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Every multi-statement write runs in one transaction.
//! - Insertion order is the monotonic `seq` column.
//! - `apply_planned` holds the write lock from snapshot read to commit.

use crate::model::todo::{OwnerId, Priority, Todo, TodoId, TodoSource, TodoStatus};
use crate::repo::todo_repo::{BatchWrite, RepoError, RepoResult, TodoRepository};
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use uuid::Uuid;

const TODO_SELECT_SQL: &str = "SELECT
    id,
    owner,
    content,
    description,
    status,
    archived,
    priority,
    category,
    assigned_to,
    due_date,
    due_time,
    created_at,
    updated_at,
    completed_at,
    source
FROM todos";

/// SQLite-backed todo repository over a migrated connection.
pub struct SqliteTodoRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteTodoRepository<'conn> {
    /// Constructs a repository from a connection opened by `db::open_db*`.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl TodoRepository for SqliteTodoRepository<'_> {
    fn insert(&mut self, todo: &Todo) -> RepoResult<()> {
        todo.validate()?;
        let tx = self.conn.transaction()?;

        let retired: Option<String> = tx
            .query_row(
                "SELECT id FROM retired_todo_ids WHERE id = ?1;",
                [todo.id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let live: Option<String> = tx
            .query_row(
                "SELECT id FROM todos WHERE id = ?1;",
                [todo.id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if retired.is_some() || live.is_some() {
            return Err(RepoError::InvalidData(format!(
                "todo id `{}` was already issued",
                todo.id
            )));
        }

        tx.execute(
            "INSERT INTO todos (
                id,
                owner,
                content,
                description,
                status,
                archived,
                priority,
                category,
                assigned_to,
                due_date,
                due_time,
                created_at,
                updated_at,
                completed_at,
                source
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15);",
            params![
                todo.id.to_string(),
                todo.owner.as_str(),
                todo.content.as_str(),
                todo.description.as_deref(),
                todo.status.as_str(),
                bool_to_int(todo.archived),
                todo.priority.as_str(),
                todo.category.as_str(),
                todo.assigned_to.as_deref(),
                todo.due_date.map(date_to_db),
                todo.due_time.map(time_to_db),
                timestamp_to_db(todo.created_at),
                timestamp_to_db(todo.updated_at),
                todo.completed_at.map(timestamp_to_db),
                todo.source.as_str(),
            ],
        )?;
        write_tags(&tx, todo)?;
        tx.commit()?;
        Ok(())
    }

    fn get(&self, owner: &OwnerId, id: TodoId) -> RepoResult<Option<Todo>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TODO_SELECT_SQL} WHERE id = ?1 AND owner = ?2;"))?;
        let mut rows = stmt.query(params![id.to_string(), owner.as_str()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let mut tags_by_id = load_tags(self.conn, owner)?;
        let tags = tags_by_id.remove(&id).unwrap_or_default();
        Ok(Some(parse_todo_row(row, tags)?))
    }

    fn replace(&mut self, todo: &Todo) -> RepoResult<()> {
        let tx = self.conn.transaction()?;
        replace_in(&tx, todo)?;
        tx.commit()?;
        Ok(())
    }

    fn remove(&mut self, owner: &OwnerId, id: TodoId) -> RepoResult<bool> {
        let tx = self.conn.transaction()?;
        let removed = remove_in(&tx, owner, id)?;
        tx.commit()?;
        Ok(removed)
    }

    fn list(&self, owner: &OwnerId) -> RepoResult<Vec<Todo>> {
        list_in(self.conn, owner)
    }

    fn apply_batch(&mut self, owner: &OwnerId, writes: &[BatchWrite]) -> RepoResult<()> {
        let tx = self.conn.transaction()?;
        apply_in(&tx, owner, writes)?;
        tx.commit()?;
        Ok(())
    }

    fn apply_planned(
        &mut self,
        owner: &OwnerId,
        plan: &mut dyn FnMut(Vec<Todo>) -> RepoResult<Vec<BatchWrite>>,
    ) -> RepoResult<Vec<BatchWrite>> {
        // IMMEDIATE takes the write lock before the snapshot is read.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let snapshot = list_in(&tx, owner)?;
        let writes = plan(snapshot)?;
        apply_in(&tx, owner, &writes)?;
        tx.commit()?;
        Ok(writes)
    }
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let exists: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'todo_tags';",
            [],
            |row| row.get(0),
        )
        .optional()?;
    if exists.is_none() {
        return Err(RepoError::InvalidData(
            "connection is not migrated; open it with db::open_db".to_string(),
        ));
    }
    Ok(())
}

fn list_in(conn: &Connection, owner: &OwnerId) -> RepoResult<Vec<Todo>> {
    let mut tags_by_id = load_tags(conn, owner)?;
    let mut stmt = conn.prepare(&format!("{TODO_SELECT_SQL} WHERE owner = ?1 ORDER BY seq ASC;"))?;
    let mut rows = stmt.query([owner.as_str()])?;

    let mut todos = Vec::new();
    while let Some(row) = rows.next()? {
        let id = parse_uuid(&row.get::<_, String>("id")?)?;
        let tags = tags_by_id.remove(&id).unwrap_or_default();
        todos.push(parse_todo_row(row, tags)?);
    }
    Ok(todos)
}

fn apply_in(conn: &Connection, owner: &OwnerId, writes: &[BatchWrite]) -> RepoResult<()> {
    for write in writes {
        match write {
            BatchWrite::Replace(todo) => {
                if &todo.owner != owner {
                    return Err(RepoError::NotFound(todo.id));
                }
                replace_in(conn, todo)?;
            }
            BatchWrite::Remove(id) => {
                remove_in(conn, owner, *id)?;
            }
        }
    }
    Ok(())
}

fn replace_in(conn: &Connection, todo: &Todo) -> RepoResult<()> {
    todo.validate()?;
    let changed = conn.execute(
        "UPDATE todos
         SET
            content = ?3,
            description = ?4,
            status = ?5,
            archived = ?6,
            priority = ?7,
            category = ?8,
            assigned_to = ?9,
            due_date = ?10,
            due_time = ?11,
            updated_at = ?12,
            completed_at = ?13,
            source = ?14
         WHERE id = ?1
           AND owner = ?2;",
        params![
            todo.id.to_string(),
            todo.owner.as_str(),
            todo.content.as_str(),
            todo.description.as_deref(),
            todo.status.as_str(),
            bool_to_int(todo.archived),
            todo.priority.as_str(),
            todo.category.as_str(),
            todo.assigned_to.as_deref(),
            todo.due_date.map(date_to_db),
            todo.due_time.map(time_to_db),
            timestamp_to_db(todo.updated_at),
            todo.completed_at.map(timestamp_to_db),
            todo.source.as_str(),
        ],
    )?;
    if changed == 0 {
        return Err(RepoError::NotFound(todo.id));
    }

    conn.execute(
        "DELETE FROM todo_tags WHERE todo_id = ?1;",
        [todo.id.to_string()],
    )?;
    write_tags(conn, todo)
}

fn remove_in(conn: &Connection, owner: &OwnerId, id: TodoId) -> RepoResult<bool> {
    let changed = conn.execute(
        "DELETE FROM todos WHERE id = ?1 AND owner = ?2;",
        params![id.to_string(), owner.as_str()],
    )?;
    if changed == 0 {
        return Ok(false);
    }
    conn.execute(
        "INSERT OR IGNORE INTO retired_todo_ids (id) VALUES (?1);",
        [id.to_string()],
    )?;
    Ok(true)
}

fn write_tags(conn: &Connection, todo: &Todo) -> RepoResult<()> {
    let mut stmt = conn.prepare("INSERT INTO todo_tags (todo_id, tag) VALUES (?1, ?2);")?;
    for tag in &todo.tags {
        stmt.execute(params![todo.id.to_string(), tag.as_str()])?;
    }
    Ok(())
}

fn load_tags(conn: &Connection, owner: &OwnerId) -> RepoResult<HashMap<TodoId, BTreeSet<String>>> {
    let mut stmt = conn.prepare(
        "SELECT tt.todo_id, tt.tag
         FROM todo_tags tt
         INNER JOIN todos t ON t.id = tt.todo_id
         WHERE t.owner = ?1;",
    )?;
    let mut rows = stmt.query([owner.as_str()])?;
    let mut tags: HashMap<TodoId, BTreeSet<String>> = HashMap::new();
    while let Some(row) = rows.next()? {
        let id = parse_uuid(&row.get::<_, String>(0)?)?;
        tags.entry(id).or_default().insert(row.get(1)?);
    }
    Ok(tags)
}

fn parse_todo_row(row: &Row<'_>, tags: BTreeSet<String>) -> RepoResult<Todo> {
    let status_text: String = row.get("status")?;
    let priority_text: String = row.get("priority")?;
    let source_text: String = row.get("source")?;
    let owner_text: String = row.get("owner")?;

    let archived = match row.get::<_, i64>("archived")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid archived value `{other}` in todos.archived"
            )));
        }
    };

    let todo = Todo {
        id: parse_uuid(&row.get::<_, String>("id")?)?,
        owner: OwnerId::new(owner_text)?,
        content: row.get("content")?,
        description: row.get("description")?,
        status: TodoStatus::from_str(&status_text)?,
        archived,
        priority: Priority::from_str(&priority_text)?,
        category: row.get("category")?,
        tags,
        assigned_to: row.get("assigned_to")?,
        due_date: row
            .get::<_, Option<String>>("due_date")?
            .map(|value| parse_date(&value))
            .transpose()?,
        due_time: row
            .get::<_, Option<String>>("due_time")?
            .map(|value| parse_time(&value))
            .transpose()?,
        created_at: parse_timestamp(&row.get::<_, String>("created_at")?)?,
        updated_at: parse_timestamp(&row.get::<_, String>("updated_at")?)?,
        completed_at: row
            .get::<_, Option<String>>("completed_at")?
            .map(|value| parse_timestamp(&value))
            .transpose()?,
        source: TodoSource::from_str(&source_text)?,
    };
    todo.validate()?;
    Ok(todo)
}

fn parse_uuid(value: &str) -> RepoResult<TodoId> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in todos.id")))
}

fn parse_date(value: &str) -> RepoResult<NaiveDate> {
    NaiveDate::from_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid date `{value}` in todos.due_date")))
}

fn parse_time(value: &str) -> RepoResult<NaiveTime> {
    NaiveTime::from_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid time `{value}` in todos.due_time")))
}

fn parse_timestamp(value: &str) -> RepoResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| RepoError::InvalidData(format!("invalid timestamp `{value}`")))
}

fn date_to_db(value: NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

fn time_to_db(value: NaiveTime) -> String {
    value.to_string()
}

// AutoSi keeps sub-second precision so values read back compare equal.
fn timestamp_to_db(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

//! Todo repository contract and shared error types.
//!
//! # Responsibility
//! - Define the persistence seam used by services.
//! - Keep storage details (process memory, SQLite) behind one trait.
//!
//! # Invariants
//! - Every read and write is scoped by `OwnerId`; a record owned by another
//!   identity behaves exactly like a missing record.
//! - `list` returns records in insertion order, archived ones included.
//! - `apply_batch` is all-or-nothing.
//! - `apply_planned` reads and writes as one unit; no other writer can
//!   change the owner's records between the snapshot and the commit.

use crate::db::DbError;
use crate::model::todo::{OwnerId, Todo, TodoId, TodoValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for todo persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(TodoValidationError),
    Db(DbError),
    NotFound(TodoId),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "todo not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted todo data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<TodoValidationError> for RepoError {
    fn from(value: TodoValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One write inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchWrite {
    /// Replace an existing record; fails the whole batch if it is missing.
    Replace(Todo),
    /// Remove a record; a missing id is a no-op.
    Remove(TodoId),
}

/// Repository interface for todo persistence.
pub trait TodoRepository {
    /// Stores a new record. Reusing an id is rejected.
    fn insert(&mut self, todo: &Todo) -> RepoResult<()>;
    fn get(&self, owner: &OwnerId, id: TodoId) -> RepoResult<Option<Todo>>;
    /// Overwrites an existing record of `todo.owner`.
    fn replace(&mut self, todo: &Todo) -> RepoResult<()>;
    /// Returns whether a record was removed.
    fn remove(&mut self, owner: &OwnerId, id: TodoId) -> RepoResult<bool>;
    fn list(&self, owner: &OwnerId) -> RepoResult<Vec<Todo>>;
    /// Applies all writes or none of them.
    fn apply_batch(&mut self, owner: &OwnerId, writes: &[BatchWrite]) -> RepoResult<()>;
    /// Hands the owner's records to `plan` and commits the writes it
    /// returns against that same snapshot. Returns the committed writes.
    fn apply_planned(
        &mut self,
        owner: &OwnerId,
        plan: &mut dyn FnMut(Vec<Todo>) -> RepoResult<Vec<BatchWrite>>,
    ) -> RepoResult<Vec<BatchWrite>>;
}

impl<R: TodoRepository + ?Sized> TodoRepository for Box<R> {
    fn insert(&mut self, todo: &Todo) -> RepoResult<()> {
        (**self).insert(todo)
    }

    fn get(&self, owner: &OwnerId, id: TodoId) -> RepoResult<Option<Todo>> {
        (**self).get(owner, id)
    }

    fn replace(&mut self, todo: &Todo) -> RepoResult<()> {
        (**self).replace(todo)
    }

    fn remove(&mut self, owner: &OwnerId, id: TodoId) -> RepoResult<bool> {
        (**self).remove(owner, id)
    }

    fn list(&self, owner: &OwnerId) -> RepoResult<Vec<Todo>> {
        (**self).list(owner)
    }

    fn apply_batch(&mut self, owner: &OwnerId, writes: &[BatchWrite]) -> RepoResult<()> {
        (**self).apply_batch(owner, writes)
    }

    fn apply_planned(
        &mut self,
        owner: &OwnerId,
        plan: &mut dyn FnMut(Vec<Todo>) -> RepoResult<Vec<BatchWrite>>,
    ) -> RepoResult<Vec<BatchWrite>> {
        (**self).apply_planned(owner, plan)
    }
}

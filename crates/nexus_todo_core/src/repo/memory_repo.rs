//! Process-local todo store.
//!
//! # Invariants
//! - Each owner bucket keeps insertion order in `order`.
//! - Ids are tracked for the lifetime of the store, so a deleted id can
//!   never be inserted again.

use crate::model::todo::{OwnerId, Todo, TodoId};
use crate::repo::todo_repo::{BatchWrite, RepoError, RepoResult, TodoRepository};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Default)]
struct OwnerBucket {
    order: Vec<TodoId>,
    records: HashMap<TodoId, Todo>,
}

impl OwnerBucket {
    fn remove(&mut self, id: TodoId) -> bool {
        if self.records.remove(&id).is_none() {
            return false;
        }
        self.order.retain(|candidate| *candidate != id);
        true
    }

    /// Drops every listed id with a single pass over `order`.
    fn remove_all(&mut self, ids: &HashSet<TodoId>) {
        if ids.is_empty() {
            return;
        }
        self.records.retain(|id, _| !ids.contains(id));
        self.order.retain(|id| !ids.contains(id));
    }
}

/// In-memory repository. Owned by the host; construct one per test for isolation.
#[derive(Debug, Default)]
pub struct InMemoryTodoRepository {
    buckets: BTreeMap<OwnerId, OwnerBucket>,
    issued_ids: HashSet<TodoId>,
}

impl InMemoryTodoRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records across all owners.
    pub fn len(&self) -> usize {
        self.buckets.values().map(|bucket| bucket.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_replaceable(&self, todo: &Todo) -> RepoResult<()> {
        todo.validate()?;
        let exists = self
            .buckets
            .get(&todo.owner)
            .is_some_and(|bucket| bucket.records.contains_key(&todo.id));
        if !exists {
            return Err(RepoError::NotFound(todo.id));
        }
        Ok(())
    }
}

impl TodoRepository for InMemoryTodoRepository {
    fn insert(&mut self, todo: &Todo) -> RepoResult<()> {
        todo.validate()?;
        if !self.issued_ids.insert(todo.id) {
            return Err(RepoError::InvalidData(format!(
                "todo id `{}` was already issued",
                todo.id
            )));
        }

        let bucket = self.buckets.entry(todo.owner.clone()).or_default();
        bucket.order.push(todo.id);
        bucket.records.insert(todo.id, todo.clone());
        Ok(())
    }

    fn get(&self, owner: &OwnerId, id: TodoId) -> RepoResult<Option<Todo>> {
        Ok(self
            .buckets
            .get(owner)
            .and_then(|bucket| bucket.records.get(&id))
            .cloned())
    }

    fn replace(&mut self, todo: &Todo) -> RepoResult<()> {
        self.ensure_replaceable(todo)?;
        if let Some(bucket) = self.buckets.get_mut(&todo.owner) {
            bucket.records.insert(todo.id, todo.clone());
        }
        Ok(())
    }

    fn remove(&mut self, owner: &OwnerId, id: TodoId) -> RepoResult<bool> {
        Ok(self
            .buckets
            .get_mut(owner)
            .is_some_and(|bucket| bucket.remove(id)))
    }

    fn list(&self, owner: &OwnerId) -> RepoResult<Vec<Todo>> {
        let Some(bucket) = self.buckets.get(owner) else {
            return Ok(Vec::new());
        };
        Ok(bucket
            .order
            .iter()
            .filter_map(|id| bucket.records.get(id))
            .cloned()
            .collect())
    }

    fn apply_batch(&mut self, owner: &OwnerId, writes: &[BatchWrite]) -> RepoResult<()> {
        // Check every write up front so a failure leaves the store untouched.
        for write in writes {
            if let BatchWrite::Replace(todo) = write {
                if &todo.owner != owner {
                    return Err(RepoError::NotFound(todo.id));
                }
                self.ensure_replaceable(todo)?;
            }
        }

        let Some(bucket) = self.buckets.get_mut(owner) else {
            return Ok(());
        };
        let mut removed = HashSet::new();
        for write in writes {
            match write {
                BatchWrite::Replace(todo) => {
                    if !removed.contains(&todo.id) {
                        bucket.records.insert(todo.id, todo.clone());
                    }
                }
                BatchWrite::Remove(id) => {
                    removed.insert(*id);
                }
            }
        }
        bucket.remove_all(&removed);
        Ok(())
    }

    fn apply_planned(
        &mut self,
        owner: &OwnerId,
        plan: &mut dyn FnMut(Vec<Todo>) -> RepoResult<Vec<BatchWrite>>,
    ) -> RepoResult<Vec<BatchWrite>> {
        let writes = plan(self.list(owner)?)?;
        self.apply_batch(owner, &writes)?;
        Ok(writes)
    }
}

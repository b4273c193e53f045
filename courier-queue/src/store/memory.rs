//! In-process store backend.
//!
//! Mirrors the Redis semantics the queue relies on: lists and sorted sets
//! disappear when emptied, range reads are ordered by score then member, and
//! a commit fails when a watched key was modified after the watch.

use super::{Batch, Command, ScoreBound, Store, StoreConnection};
use crate::error::QueueResult;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct MemoryState {
    lists: HashMap<String, VecDeque<String>>,
    sets: HashMap<String, HashMap<String, i64>>,
    /// Bumped on every effective write; compared on commit.
    versions: HashMap<String, u64>,
}

impl MemoryState {
    fn version(&self, key: &str) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn touch(&mut self, key: &str) {
        *self.versions.entry(key.to_string()).or_insert(0) += 1;
    }

    fn push_right(&mut self, list: &str, values: &[String]) {
        if values.is_empty() {
            return;
        }
        self.lists
            .entry(list.to_string())
            .or_default()
            .extend(values.iter().cloned());
        self.touch(list);
    }

    fn pop_left(&mut self, list: &str) -> Option<String> {
        let entries = self.lists.get_mut(list)?;
        let value = entries.pop_front();
        if entries.is_empty() {
            self.lists.remove(list);
        }
        if value.is_some() {
            self.touch(list);
        }
        value
    }

    fn scored_add(&mut self, set: &str, score: i64, member: &str) {
        let previous = self
            .sets
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string(), score);
        if previous != Some(score) {
            self.touch(set);
        }
    }

    fn range(&self, set: &str, min: ScoreBound, max: ScoreBound) -> Vec<(String, i64)> {
        let Some(members) = self.sets.get(set) else {
            return Vec::new();
        };
        let mut due: Vec<(String, i64)> = members
            .iter()
            .filter(|(_, score)| min.admits_from_below(**score) && max.admits_from_above(**score))
            .map(|(member, score)| (member.clone(), *score))
            .collect();
        due.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        due
    }

    fn scored_remove(&mut self, set: &str, member: &str) -> bool {
        let Some(members) = self.sets.get_mut(set) else {
            return false;
        };
        let removed = members.remove(member).is_some();
        if members.is_empty() {
            self.sets.remove(set);
        }
        if removed {
            self.touch(set);
        }
        removed
    }

    fn scored_remove_range(&mut self, set: &str, min: ScoreBound, max: ScoreBound) -> u64 {
        let Some(members) = self.sets.get_mut(set) else {
            return 0;
        };
        let before = members.len();
        members.retain(|_, score| !(min.admits_from_below(*score) && max.admits_from_above(*score)));
        let removed = (before - members.len()) as u64;
        if members.is_empty() {
            self.sets.remove(set);
        }
        if removed > 0 {
            self.touch(set);
        }
        removed
    }

    fn delete(&mut self, key: &str) {
        let existed = self.lists.remove(key).is_some() | self.sets.remove(key).is_some();
        if existed {
            self.touch(key);
        }
    }

    fn apply(&mut self, command: &Command) {
        match command {
            Command::PushRight { list, values } => self.push_right(list, values),
            Command::ScoredAdd { set, score, member } => self.scored_add(set, *score, member),
            Command::ScoredRemove { set, member } => {
                self.scored_remove(set, member);
            }
            Command::ScoredRemoveRangeByScore { set, min, max } => {
                self.scored_remove_range(set, *min, *max);
            }
        }
    }
}

/// Store that keeps everything in process memory.
///
/// Clones share the same data, like clones of a Redis pool share a server.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a list, head first.
    pub async fn list(&self, key: &str) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .lists
            .get(key)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of a sorted set as `(member, score)`, ascending.
    pub async fn scored(&self, key: &str) -> Vec<(String, i64)> {
        let state = self.state.lock().await;
        state.range(key, ScoreBound::NegInfinity, ScoreBound::PosInfinity)
    }

    /// Modification counter of a key; unchanged means no effective write.
    pub async fn version(&self, key: &str) -> u64 {
        self.state.lock().await.version(key)
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Connection = MemoryConnection;

    async fn connection(&self) -> QueueResult<Self::Connection> {
        Ok(MemoryConnection {
            state: self.state.clone(),
            watched: Vec::new(),
        })
    }
}

/// Connection to a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
    watched: Vec<(String, u64)>,
}

#[async_trait]
impl StoreConnection for MemoryConnection {
    async fn push_right(&mut self, list: &str, values: &[String]) -> QueueResult<()> {
        self.state.lock().await.push_right(list, values);
        Ok(())
    }

    async fn pop_left(&mut self, list: &str) -> QueueResult<Option<String>> {
        Ok(self.state.lock().await.pop_left(list))
    }

    async fn scored_add(&mut self, set: &str, score: i64, member: &str) -> QueueResult<()> {
        self.state.lock().await.scored_add(set, score, member);
        Ok(())
    }

    async fn scored_range_by_score(
        &mut self,
        set: &str,
        min: ScoreBound,
        max: ScoreBound,
    ) -> QueueResult<Vec<String>> {
        let state = self.state.lock().await;
        Ok(state
            .range(set, min, max)
            .into_iter()
            .map(|(member, _)| member)
            .collect())
    }

    async fn scored_remove(&mut self, set: &str, member: &str) -> QueueResult<bool> {
        Ok(self.state.lock().await.scored_remove(set, member))
    }

    async fn scored_remove_range_by_score(
        &mut self,
        set: &str,
        min: ScoreBound,
        max: ScoreBound,
    ) -> QueueResult<u64> {
        Ok(self.state.lock().await.scored_remove_range(set, min, max))
    }

    async fn list_len(&mut self, list: &str) -> QueueResult<u64> {
        let state = self.state.lock().await;
        Ok(state.lists.get(list).map_or(0, |entries| entries.len() as u64))
    }

    async fn scored_count(&mut self, set: &str) -> QueueResult<u64> {
        let state = self.state.lock().await;
        Ok(state.sets.get(set).map_or(0, |members| members.len() as u64))
    }

    async fn delete(&mut self, keys: &[&str]) -> QueueResult<()> {
        let mut state = self.state.lock().await;
        for key in keys {
            state.delete(key);
        }
        Ok(())
    }

    async fn watch(&mut self, keys: &[&str]) -> QueueResult<()> {
        let state = self.state.lock().await;
        for key in keys {
            self.watched.push((key.to_string(), state.version(key)));
        }
        Ok(())
    }

    async fn unwatch(&mut self) -> QueueResult<()> {
        self.watched.clear();
        Ok(())
    }

    async fn commit(&mut self, batch: &Batch) -> QueueResult<bool> {
        let watched = std::mem::take(&mut self.watched);
        let mut state = self.state.lock().await;

        if watched
            .iter()
            .any(|(key, version)| state.version(key) != *version)
        {
            return Ok(false);
        }

        for command in batch.commands() {
            state.apply(command);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_list_is_fifo() {
        let store = MemoryStore::new();
        let mut conn = store.connection().await.unwrap();

        conn.push_right("q", &strings(&["a", "b"])).await.unwrap();
        conn.push_right("q", &strings(&["c"])).await.unwrap();

        assert_eq!(conn.list_len("q").await.unwrap(), 3);
        assert_eq!(conn.pop_left("q").await.unwrap().as_deref(), Some("a"));
        assert_eq!(conn.pop_left("q").await.unwrap().as_deref(), Some("b"));
        assert_eq!(conn.pop_left("q").await.unwrap().as_deref(), Some("c"));
        assert_eq!(conn.pop_left("q").await.unwrap(), None);
        assert_eq!(conn.list_len("q").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_range_orders_by_score_then_member() {
        let store = MemoryStore::new();
        let mut conn = store.connection().await.unwrap();

        conn.scored_add("s", 5, "late").await.unwrap();
        conn.scored_add("s", 1, "b").await.unwrap();
        conn.scored_add("s", 1, "a").await.unwrap();
        conn.scored_add("s", 9, "future").await.unwrap();

        let due = conn
            .scored_range_by_score("s", ScoreBound::NegInfinity, ScoreBound::Inclusive(5))
            .await
            .unwrap();
        assert_eq!(due, strings(&["a", "b", "late"]));
    }

    #[tokio::test]
    async fn test_scored_add_rescores_existing_member() {
        let store = MemoryStore::new();
        let mut conn = store.connection().await.unwrap();

        conn.scored_add("s", 1, "job").await.unwrap();
        conn.scored_add("s", 7, "job").await.unwrap();

        assert_eq!(conn.scored_count("s").await.unwrap(), 1);
        assert_eq!(store.scored("s").await, vec![("job".to_string(), 7)]);
    }

    #[tokio::test]
    async fn test_remove_range() {
        let store = MemoryStore::new();
        let mut conn = store.connection().await.unwrap();

        for (score, member) in [(1, "a"), (2, "b"), (3, "c")] {
            conn.scored_add("s", score, member).await.unwrap();
        }

        let removed = conn
            .scored_remove_range_by_score("s", ScoreBound::NegInfinity, ScoreBound::Inclusive(2))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.scored("s").await, vec![("c".to_string(), 3)]);
    }

    #[tokio::test]
    async fn test_commit_applies_batch() {
        let store = MemoryStore::new();
        let mut conn = store.connection().await.unwrap();
        conn.scored_add("s", 1, "a").await.unwrap();

        conn.watch(&["s"]).await.unwrap();
        let mut batch = Batch::new();
        batch
            .scored_remove("s", "a")
            .push_right("q", strings(&["a"]));
        assert!(conn.commit(&batch).await.unwrap());

        assert!(store.scored("s").await.is_empty());
        assert_eq!(store.list("q").await, strings(&["a"]));
    }

    #[tokio::test]
    async fn test_commit_fails_after_concurrent_write() {
        let store = MemoryStore::new();
        let mut first = store.connection().await.unwrap();
        let mut second = store.connection().await.unwrap();

        first.watch(&["s"]).await.unwrap();
        second.scored_add("s", 1, "intruder").await.unwrap();

        let mut batch = Batch::new();
        batch.push_right("q", strings(&["x"]));
        assert!(!first.commit(&batch).await.unwrap());
        assert!(store.list("q").await.is_empty());

        // The failed commit cleared the watch
        assert!(first.commit(&batch).await.unwrap());
        assert_eq!(store.list("q").await, strings(&["x"]));
    }

    #[tokio::test]
    async fn test_noop_writes_do_not_invalidate_watch() {
        let store = MemoryStore::new();
        let mut first = store.connection().await.unwrap();
        let mut second = store.connection().await.unwrap();

        first.watch(&["s"]).await.unwrap();
        second
            .scored_remove_range_by_score("s", ScoreBound::NegInfinity, ScoreBound::PosInfinity)
            .await
            .unwrap();
        assert!(!second.scored_remove("s", "missing").await.unwrap());

        assert!(first.commit(&Batch::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_unwatch() {
        let store = MemoryStore::new();
        let mut first = store.connection().await.unwrap();
        let mut second = store.connection().await.unwrap();

        first.watch(&["s"]).await.unwrap();
        first.unwatch().await.unwrap();
        second.scored_add("s", 1, "a").await.unwrap();

        assert!(first.commit(&Batch::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::new();
        let mut conn = store.connection().await.unwrap();
        conn.push_right("q", &strings(&["a"])).await.unwrap();
        conn.scored_add("s", 1, "a").await.unwrap();

        conn.delete(&["q", "s", "missing"]).await.unwrap();
        assert_eq!(conn.list_len("q").await.unwrap(), 0);
        assert_eq!(conn.scored_count("s").await.unwrap(), 0);
    }
}

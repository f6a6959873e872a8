//! Pending save requests, at most one per workout key.

use tokio::sync::oneshot;

use crate::models::{SaveRequest, SaveResult, Workout, WorkoutId};
use crate::Result;

pub(crate) type Waiter = oneshot::Sender<Result<SaveResult>>;

pub(crate) struct QueuedSave {
    pub request: SaveRequest,
    pub waiters: Vec<Waiter>,
    sequence: i64,
}

/// Whether a push created a new entry or replaced a pending one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pushed {
    Queued,
    Replaced,
}

#[derive(Default)]
pub(crate) struct SaveQueue {
    entries: Vec<QueuedSave>,
    next_sequence: i64,
}

impl SaveQueue {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Enqueue, replacing any pending request for the same key.
    ///
    /// A replacement keeps its queue position and the higher of the two
    /// priorities; the draft, overwrite flag and retry counter come from the
    /// new request.
    pub fn push(&mut self, request: SaveRequest, waiter: Option<Waiter>) -> Pushed {
        if let Some(existing) = self.find_mut(request.key) {
            let priority = existing.request.priority.max(request.priority);
            let enqueued_at = existing.request.enqueued_at;
            existing.request = SaveRequest {
                priority,
                enqueued_at,
                ..request
            };
            existing.waiters.extend(waiter);
            return Pushed::Replaced;
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.push(QueuedSave {
            request,
            waiters: waiter.into_iter().collect(),
            sequence,
        });
        Pushed::Queued
    }

    /// Put a request back at the front of its priority band.
    ///
    /// Returns `false` when a newer request for the same key is already
    /// pending; the newer draft supersedes the one being re-queued.
    pub fn push_front(&mut self, request: SaveRequest, waiters: Vec<Waiter>) -> bool {
        if let Some(existing) = self.find_mut(request.key) {
            existing.request.overwrite |= request.overwrite;
            existing.waiters.extend(waiters);
            return false;
        }

        let sequence = self
            .entries
            .iter()
            .map(|entry| entry.sequence)
            .min()
            .map_or(self.next_sequence, |lowest| lowest - 1);
        self.entries.push(QueuedSave {
            request,
            waiters,
            sequence,
        });
        true
    }

    /// Highest priority first, then oldest.
    pub fn pop_next(&mut self) -> Option<QueuedSave> {
        let index = self.next_index()?;
        Some(self.entries.swap_remove(index))
    }

    pub fn peek_next_mut(&mut self) -> Option<&mut QueuedSave> {
        let index = self.next_index()?;
        self.entries.get_mut(index)
    }

    pub fn take(&mut self, key: Option<WorkoutId>) -> Option<QueuedSave> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.request.key == key)?;
        Some(self.entries.swap_remove(index))
    }

    /// Point pending drafts at the stored copy's id and revision so they do
    /// not conflict with a save this coordinator just made.
    pub fn rebase(&mut self, previous_key: Option<WorkoutId>, saved: &Workout) {
        for entry in &mut self.entries {
            if entry.request.key == previous_key || entry.request.key == saved.id {
                entry.request.key = saved.id;
                entry.request.draft.id = saved.id;
                entry.request.draft.metadata.revision = saved.metadata.revision;
            }
        }
    }

    pub fn clear(&mut self) -> Vec<QueuedSave> {
        std::mem::take(&mut self.entries)
    }

    fn find_mut(&mut self, key: Option<WorkoutId>) -> Option<&mut QueuedSave> {
        self.entries.iter_mut().find(|entry| entry.request.key == key)
    }

    fn next_index(&self) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .max_by(|(_, left), (_, right)| {
                left.request
                    .priority
                    .cmp(&right.request.priority)
                    .then_with(|| right.sequence.cmp(&left.sequence))
            })
            .map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Difficulty, SavePriority};

    fn request(title: &str, id: Option<WorkoutId>, priority: SavePriority) -> SaveRequest {
        let mut draft = Workout::new(title, 30, Difficulty::Beginner);
        draft.id = id;
        SaveRequest::new(draft, priority)
    }

    #[test]
    fn push_replaces_pending_request_for_same_key() {
        let mut queue = SaveQueue::default();
        let id = Some(WorkoutId::new());
        assert_eq!(queue.push(request("a", id, SavePriority::High), None), Pushed::Queued);
        assert_eq!(queue.push(request("b", id, SavePriority::Low), None), Pushed::Replaced);

        assert_eq!(queue.len(), 1);
        let next = queue.pop_next().unwrap();
        assert_eq!(next.request.draft.title, "b");
        assert_eq!(next.request.priority, SavePriority::High);
    }

    #[test]
    fn pop_orders_by_priority_then_age() {
        let mut queue = SaveQueue::default();
        queue.push(request("low", Some(WorkoutId::new()), SavePriority::Low), None);
        queue.push(request("normal-1", Some(WorkoutId::new()), SavePriority::Normal), None);
        queue.push(request("normal-2", Some(WorkoutId::new()), SavePriority::Normal), None);
        queue.push(request("high", Some(WorkoutId::new()), SavePriority::High), None);

        let order: Vec<String> = std::iter::from_fn(|| queue.pop_next())
            .map(|entry| entry.request.draft.title)
            .collect();
        assert_eq!(order, ["high", "normal-1", "normal-2", "low"]);
    }

    #[test]
    fn push_front_goes_ahead_of_same_priority() {
        let mut queue = SaveQueue::default();
        queue.push(request("queued", Some(WorkoutId::new()), SavePriority::Normal), None);
        assert!(queue.push_front(request("retry", Some(WorkoutId::new()), SavePriority::Normal), Vec::new()));

        assert_eq!(queue.pop_next().unwrap().request.draft.title, "retry");
    }

    #[test]
    fn push_front_is_superseded_by_newer_request() {
        let mut queue = SaveQueue::default();
        let id = Some(WorkoutId::new());
        queue.push(request("newer", id, SavePriority::Normal), None);
        assert!(!queue.push_front(request("failed", id, SavePriority::Normal), Vec::new()));

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop_next().unwrap().request.draft.title, "newer");
    }

    #[test]
    fn rebase_assigns_saved_identity() {
        let mut queue = SaveQueue::default();
        queue.push(request("unsaved", None, SavePriority::Normal), None);
        let mut saved = Workout::new("unsaved", 30, Difficulty::Beginner);
        saved.id = Some(WorkoutId::new());
        saved.metadata.revision = 1;

        queue.rebase(None, &saved);
        let entry = queue.pop_next().unwrap();
        assert_eq!(entry.request.key, saved.id);
        assert_eq!(entry.request.draft.metadata.revision, 1);
    }
}

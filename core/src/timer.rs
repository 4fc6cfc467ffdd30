//! One-shot timers keyed by due tick.
//!
//! Every timer belongs to a StageToken. Tearing a stage down cancels
//! everything it owns; anything that still slips through is filtered
//! by the engine comparing tokens before dispatch.

use crate::types::Tick;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimerId(u64);

/// Identity of one operation instance. Never reused within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StageToken(pub u64);

/// Owner of the notification feed timer. Operation tokens start at 1.
pub const FEED_TOKEN: StageToken = StageToken(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    CountdownTick,
    ResolveDelay,
    RevealDelay,
    ResultDelay,
    NotificationTick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredTimer {
    pub id:    TimerId,
    pub owner: StageToken,
    pub kind:  TimerKind,
    pub due:   Tick,
}

#[derive(Debug, Clone, Copy)]
struct PendingTimer {
    owner: StageToken,
    kind:  TimerKind,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    next_id: u64,
    // (due, id) keeps same-tick timers in scheduling order.
    pending: BTreeMap<(Tick, TimerId), PendingTimer>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `kind` to fire `delay` ticks after `now`. A zero delay
    /// fires on the next drain.
    pub fn schedule(&mut self, now: Tick, delay: Tick, owner: StageToken, kind: TimerKind) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.insert((now + delay, id), PendingTimer { owner, kind });
        id
    }

    /// Returns true if the timer was still pending. Cancelling twice is fine.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let key = self.pending.keys().find(|(_, tid)| *tid == id).copied();
        match key {
            Some(k) => self.pending.remove(&k).is_some(),
            None => false,
        }
    }

    /// Cancel every timer owned by `owner`. Returns how many were removed.
    pub fn cancel_owner(&mut self, owner: StageToken) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, t| t.owner != owner);
        before - self.pending.len()
    }

    pub fn clear(&mut self) -> usize {
        let n = self.pending.len();
        self.pending.clear();
        n
    }

    /// Remove and return every timer due at or before `now`.
    pub fn drain_due(&mut self, now: Tick) -> Vec<FiredTimer> {
        let later = self.pending.split_off(&(now + 1, TimerId(0)));
        let due = std::mem::replace(&mut self.pending, later);
        due.into_iter()
            .map(|((due, id), t)| FiredTimer { id, owner: t.owner, kind: t.kind, due })
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_for(&self, owner: StageToken) -> usize {
        self.pending.values().filter(|t| t.owner == owner).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: StageToken = StageToken(1);
    const B: StageToken = StageToken(2);

    #[test]
    fn drains_in_due_then_schedule_order() {
        let mut q = TimerQueue::new();
        q.schedule(0, 5, A, TimerKind::ResolveDelay);
        q.schedule(0, 2, A, TimerKind::CountdownTick);
        q.schedule(0, 2, B, TimerKind::RevealDelay);

        assert!(q.drain_due(1).is_empty());

        let fired = q.drain_due(2);
        let kinds: Vec<_> = fired.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![TimerKind::CountdownTick, TimerKind::RevealDelay]);
        assert_eq!(q.pending_count(), 1);

        let fired = q.drain_due(10);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].due, 5);
        assert_eq!(q.pending_count(), 0);
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut q = TimerQueue::new();
        let id = q.schedule(0, 3, A, TimerKind::ResultDelay);
        assert!(q.cancel(id));
        assert!(!q.cancel(id));
        assert!(q.drain_due(3).is_empty());
    }

    #[test]
    fn cancel_owner_leaves_other_stages_alone() {
        let mut q = TimerQueue::new();
        q.schedule(0, 1, A, TimerKind::CountdownTick);
        q.schedule(0, 4, A, TimerKind::ResolveDelay);
        q.schedule(0, 4, B, TimerKind::ResolveDelay);

        assert_eq!(q.cancel_owner(A), 2);
        assert_eq!(q.cancel_owner(A), 0);
        assert_eq!(q.pending_for(B), 1);
    }
}

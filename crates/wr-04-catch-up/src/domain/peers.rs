//! # Peer Table
//!
//! What the last health probes said about each member, plus which peers are
//! benched after serving a bad batch.

use shared_types::{NodeId, PeerInfo, PeerView};
use std::collections::{BTreeMap, HashMap};

/// Peer views keyed by id (iteration order drives rotation).
#[derive(Debug, Default)]
pub struct PeerTable {
    views: BTreeMap<NodeId, PeerView>,
    benched_until: HashMap<NodeId, u64>,
    step: u64,
    last_pick: Option<NodeId>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track exactly `members`, keeping what is known about survivors.
    pub fn sync_members<'a>(&mut self, members: impl IntoIterator<Item = &'a PeerInfo>) {
        let mut next = BTreeMap::new();
        for info in members {
            let view = self
                .views
                .remove(&info.id)
                .unwrap_or_else(|| PeerView::new(info));
            next.insert(info.id, view);
        }
        self.views = next;
        let views = &self.views;
        self.benched_until.retain(|id, _| views.contains_key(id));
    }

    /// Start a new step; benches expire by step count.
    pub fn advance_step(&mut self) {
        self.step += 1;
    }

    /// Successful probe. Returns true when the peer became reachable.
    pub fn record_health(&mut self, id: &NodeId, committed_height: u64, now_ms: u64) -> bool {
        let Some(view) = self.views.get_mut(id) else {
            return false;
        };
        let changed = !view.reachable;
        view.reachable = true;
        view.committed_height = committed_height;
        view.last_seen = Some(now_ms);
        view.consecutive_failures = 0;
        changed
    }

    /// Failed probe. Returns true when the peer became unreachable.
    pub fn record_failure(&mut self, id: &NodeId) -> bool {
        let Some(view) = self.views.get_mut(id) else {
            return false;
        };
        let changed = view.reachable;
        view.reachable = false;
        view.consecutive_failures = view.consecutive_failures.saturating_add(1);
        changed
    }

    /// Skip `id` for the next `steps` steps.
    pub fn penalise(&mut self, id: &NodeId, steps: u64) {
        if let Some(view) = self.views.get_mut(id) {
            view.consecutive_failures = view.consecutive_failures.saturating_add(1);
        }
        self.benched_until.insert(*id, self.step + steps);
    }

    pub fn is_benched(&self, id: &NodeId) -> bool {
        self.benched_until
            .get(id)
            .map_or(false, |until| *until > self.step)
    }

    /// Next reachable peer whose height covers `to`, rotating after the
    /// previous pick and preferring peers that are not benched.
    pub fn pick(&mut self, to: u64) -> Option<NodeId> {
        let covering: Vec<NodeId> = self
            .views
            .values()
            .filter(|v| v.reachable && v.committed_height >= to)
            .map(|v| v.id)
            .collect();
        if covering.is_empty() {
            return None;
        }

        let start = self
            .last_pick
            .and_then(|last| covering.iter().position(|id| *id > last))
            .unwrap_or(0);
        let rotated = covering[start..].iter().chain(covering[..start].iter());

        let mut fallback = None;
        for id in rotated {
            if !self.is_benched(id) {
                self.last_pick = Some(*id);
                return Some(*id);
            }
            fallback.get_or_insert(*id);
        }
        self.last_pick = fallback;
        fallback
    }

    pub fn reachable_count(&self) -> usize {
        self.views.values().filter(|v| v.reachable).count()
    }

    pub fn view(&self, id: &NodeId) -> Option<&PeerView> {
        self.views.get(id)
    }

    pub fn views(&self) -> impl Iterator<Item = &PeerView> {
        self.views.values()
    }
}

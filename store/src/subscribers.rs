//! Ordered subscriber registry with delta-gated notification.

use crate::diff::Delta;

/// Token returned by subscribe; redeem it to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&Delta) + Send>;

pub(crate) struct Subscribers {
    entries: Vec<(SubscriptionId, Callback)>,
    next_id: u64,
}

impl Subscribers {
    pub(crate) fn new() -> Self {
        Subscribers {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    pub(crate) fn subscribe(&mut self, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, callback));
        id
    }

    /// Remove a subscription. Redeeming an id twice is a no-op.
    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) {
        self.entries.retain(|(existing, _)| *existing != id);
    }

    /// Invoke every callback synchronously, in subscription order.
    ///
    /// Empty deltas notify nobody. Callbacks are not isolated from each
    /// other: a panicking callback unwinds into the dispatch caller and
    /// the rest of the round never runs.
    pub(crate) fn notify(&mut self, delta: &Delta) {
        if delta.is_empty() {
            return;
        }
        for (_, callback) in &mut self.entries {
            callback(delta);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

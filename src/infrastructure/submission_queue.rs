use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Lanes = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Per-identity submission lanes.
///
/// While a [`SubmissionLane`] is held no other submission from the same
/// identity can read its sequence number or broadcast. Different identities
/// never wait on each other. A lane is forgotten once nobody holds or waits
/// for it.
#[derive(Clone, Default)]
pub struct SubmissionQueue {
    lanes: Lanes,
}

/// Exclusive hold on one identity's lane, released on drop
pub struct SubmissionLane {
    guard: Option<OwnedMutexGuard<()>>,
    identity: String,
    lanes: Lanes,
}

impl SubmissionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, identity: &str) -> SubmissionLane {
        let lane = {
            let mut lanes = self.lanes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            lanes
                .entry(identity.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        SubmissionLane {
            guard: Some(lane.lock_owned().await),
            identity: identity.to_string(),
            lanes: self.lanes.clone(),
        }
    }

    /// Identities with a live lane
    pub fn active_lanes(&self) -> usize {
        self.lanes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl Drop for SubmissionLane {
    fn drop(&mut self) {
        let mut lanes = self.lanes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        drop(self.guard.take());
        // Only the map itself still points at the lane: no holder, no waiter.
        let idle = lanes
            .get(&self.identity)
            .map_or(false, |lane| Arc::strong_count(lane) == 1);
        if idle {
            lanes.remove(&self.identity);
        }
    }
}

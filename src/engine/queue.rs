// src/engine/queue.rs

use std::collections::VecDeque;

use tracing::debug;

use super::RunRequest;

/// Run requests that arrive while a run is already executing.
///
/// Requests are started one at a time in arrival order once the scheduler
/// becomes idle. A request identical to one already queued is dropped.
#[derive(Debug, Default)]
pub struct RunQueue {
    pending: VecDeque<RunRequest>,
}

impl RunQueue {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
        }
    }

    /// Returns true if there are no queued requests.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Remember a request for after the current run.
    pub fn record(&mut self, request: RunRequest) {
        if self.pending.contains(&request) {
            debug!(dag = %request.dag_id, "identical run request already queued; dropping");
            return;
        }

        debug!(
            dag = %request.dag_id,
            logical_date = %request.logical_date,
            queued = self.pending.len() + 1,
            "queued run request"
        );
        self.pending.push_back(request);
    }

    /// Next request to start, if any.
    pub fn pop(&mut self) -> Option<RunRequest> {
        self.pending.pop_front()
    }

    /// Drop every queued request, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        if dropped > 0 {
            debug!(dropped, "cleared queued run requests");
        }
        dropped
    }
}

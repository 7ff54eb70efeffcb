use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

use crate::interview::engine::InterviewEngine;
use crate::taxonomy::Taxonomy;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<InterviewEngine>,
    /// Loaded once at startup; every session shares this copy read-only.
    pub taxonomy: Arc<Taxonomy>,
    pub session_locks: Arc<SessionLocks>,
}

type ThreadLock = Arc<tokio::sync::Mutex<()>>;

/// One async mutex per interview thread. Handlers hold it for the whole
/// start/resume/retry call so a thread never has two writers.
///
/// Entries only live while someone holds or waits on them.
#[derive(Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<String, ThreadLock>>,
}

impl SessionLocks {
    /// Waits for exclusive access to `thread_id`. Released when the guard drops.
    pub async fn lock(&self, thread_id: &str) -> ThreadGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks
                .entry(thread_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        let guard = lock.lock_owned().await;
        ThreadGuard {
            locks: self,
            thread_id: thread_id.to_string(),
            guard: Some(guard),
        }
    }

    fn release(&self, thread_id: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // the map's own Arc is the only one left: nobody holds or waits on it
        if locks
            .get(thread_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(thread_id);
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().unwrap().len()
    }
}

pub struct ThreadGuard<'a> {
    locks: &'a SessionLocks,
    thread_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ThreadGuard<'_> {
    fn drop(&mut self) {
        // unlock before checking whether anyone else still references the mutex
        self.guard.take();
        self.locks.release(&self.thread_id);
    }
}

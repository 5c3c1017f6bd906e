use crate::{TaskforceError, TaskforceResult};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, RwLock};
use uuid::Uuid;

/// Clonable handle used to cancel an in-flight run.
///
/// Cancellation is a flag checked at every suspension point; it also wakes
/// tasks parked on the human-input gate.
#[derive(Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl CancelHandle {
    /// Request cancellation and wake any parked waiters.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.wake.notify_waiters();
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn notified(&self) -> tokio::sync::futures::Notified<'_> {
        self.wake.notified()
    }

    fn wake_waiters(&self) {
        self.wake.notify_waiters();
    }
}

/// Mutable state visible to tasks during one run. Created at run start,
/// dropped at run end.
///
/// `task_outputs` is write-once per task id: concurrent writers in a
/// parallel wave each write only their own key, so no read/write race
/// exists as long as readers only consume keys from earlier waves. The
/// write-once rule is enforced here rather than trusted.
pub struct ExecutionContext {
    inputs: HashMap<String, serde_json::Value>,
    task_outputs: RwLock<HashMap<Uuid, serde_json::Value>>,
    shared_memory: RwLock<HashMap<String, serde_json::Value>>,
    cancel: CancelHandle,
    resumed: Mutex<HashSet<Uuid>>,
}

impl ExecutionContext {
    /// Create a context seeded with the caller-provided run inputs.
    pub fn new(inputs: HashMap<String, serde_json::Value>) -> Self {
        Self {
            inputs,
            task_outputs: RwLock::new(HashMap::new()),
            shared_memory: RwLock::new(HashMap::new()),
            cancel: CancelHandle::default(),
            resumed: Mutex::new(HashSet::new()),
        }
    }

    /// The caller-provided run inputs.
    pub fn inputs(&self) -> &HashMap<String, serde_json::Value> {
        &self.inputs
    }

    /// Look up a single run input.
    pub fn input(&self, key: &str) -> Option<&serde_json::Value> {
        self.inputs.get(key)
    }

    /// Record a task's output. Each task id may be written exactly once.
    pub async fn record_output(
        &self,
        task_id: Uuid,
        output: serde_json::Value,
    ) -> TaskforceResult<()> {
        let mut outputs = self.task_outputs.write().await;
        if outputs.contains_key(&task_id) {
            return Err(TaskforceError::Execution(format!(
                "output for task {task_id} already recorded"
            )));
        }
        outputs.insert(task_id, output);
        Ok(())
    }

    /// Fetch one task's recorded output.
    pub async fn output(&self, task_id: Uuid) -> Option<serde_json::Value> {
        self.task_outputs.read().await.get(&task_id).cloned()
    }

    /// Snapshot the outputs for the given task ids, preserving their order.
    /// Ids with no recorded output are omitted.
    pub async fn outputs_for(&self, task_ids: &[Uuid]) -> Vec<(Uuid, serde_json::Value)> {
        let outputs = self.task_outputs.read().await;
        task_ids
            .iter()
            .filter_map(|id| outputs.get(id).map(|v| (*id, v.clone())))
            .collect()
    }

    /// Snapshot every recorded output.
    pub async fn all_outputs(&self) -> HashMap<Uuid, serde_json::Value> {
        self.task_outputs.read().await.clone()
    }

    /// Write a shared-memory entry.
    pub async fn set_shared(&self, key: impl Into<String>, value: serde_json::Value) {
        self.shared_memory.write().await.insert(key.into(), value);
    }

    /// Read a shared-memory entry.
    pub async fn shared(&self, key: &str) -> Option<serde_json::Value> {
        self.shared_memory.read().await.get(key).cloned()
    }

    /// Handle for cancelling this run from another task or thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Whether the run has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Deliver the external resume signal for a waiting task.
    pub fn resume_human(&self, task_id: Uuid) {
        let mut resumed = match self.resumed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        resumed.insert(task_id);
        drop(resumed);
        self.cancel.wake_waiters();
    }

    fn is_resumed(&self, task_id: Uuid) -> bool {
        match self.resumed.lock() {
            Ok(guard) => guard.contains(&task_id),
            Err(poisoned) => poisoned.into_inner().contains(&task_id),
        }
    }

    /// Park until [`ExecutionContext::resume_human`] is called for this
    /// task, or the run is cancelled.
    pub async fn wait_for_human(&self, task_id: Uuid) -> TaskforceResult<()> {
        loop {
            if self.is_resumed(task_id) {
                return Ok(());
            }
            if self.is_cancelled() {
                return Err(TaskforceError::Cancelled);
            }
            let notified = self.cancel.notified();
            // Re-check after arming the waiter so a signal delivered in
            // between is not lost.
            if self.is_resumed(task_id) {
                return Ok(());
            }
            if self.is_cancelled() {
                return Err(TaskforceError::Cancelled);
            }
            notified.await;
        }
    }
}

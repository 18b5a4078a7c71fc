//! Orchestrator: single source of truth for task scheduling and worker
//! liveness (spec §4.1).

use std::collections::{BTreeSet, BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::OrchestratorConfig;
use crate::domain::{Payload, Priority, Task, TaskStatus, Worker, WorkerStatus};
use crate::persistence;

use super::error::OrchestratorError;
use super::queue::QueueEntry;

/// State guarded together because scheduling (`poll_task`) must see a
/// consistent view of both the queue and the task table.
struct TaskState {
    tasks: HashMap<String, Task>,
    queue: BinaryHeap<QueueEntry>,
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    // Lock order: workers, then task_state (spec §5 recommended total order).
    workers: Mutex<HashMap<String, Worker>>,
    task_state: Mutex<TaskState>,
    shutting_down: AtomicBool,
    data_dir: std::path::PathBuf,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, data_dir: std::path::PathBuf) -> Self {
        Self {
            config,
            workers: Mutex::new(HashMap::new()),
            task_state: Mutex::new(TaskState { tasks: HashMap::new(), queue: BinaryHeap::new() }),
            shutting_down: AtomicBool::new(false),
            data_dir,
        }
    }

    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, AtomicOrdering::SeqCst);
    }

    fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(AtomicOrdering::SeqCst)
    }

    pub async fn register_worker(&self, worker_type: impl Into<String>, capabilities: BTreeSet<String>) -> String {
        let worker = Worker::new(worker_type, capabilities);
        let worker_id = worker.worker_id.clone();
        let mut workers = self.workers.lock().await;
        workers.insert(worker_id.clone(), worker);
        info!(worker_id = %worker_id, "worker registered");
        worker_id
    }

    pub async fn heartbeat(&self, worker_id: &str) -> Result<(), OrchestratorError> {
        let mut workers = self.workers.lock().await;
        let worker = workers.get_mut(worker_id).ok_or_else(|| OrchestratorError::UnknownWorker(worker_id.to_string()))?;
        worker.last_heartbeat = Utc::now();
        Ok(())
    }

    pub async fn submit_task(&self, payload: Payload, priority: Priority, required_capabilities: BTreeSet<String>) -> String {
        let task = Task::new(payload, priority, required_capabilities);
        let task_id = task.task_id.clone();
        let entry = QueueEntry { task_id: task_id.clone(), priority: task.priority, created_at: task.created_at };

        let mut state = self.task_state.lock().await;
        state.tasks.insert(task_id.clone(), task);
        state.queue.push(entry);
        debug!(task_id = %task_id, "task submitted");
        task_id
    }

    /// Return the highest-priority pending task this worker can run, or
    /// `None` if nothing matches (spec §4.1 scheduling algorithm).
    pub async fn poll_task(&self, worker_id: &str) -> Result<Option<Task>, OrchestratorError> {
        if self.is_shutting_down() {
            return Err(OrchestratorError::ShuttingDown);
        }

        let workers = self.workers.lock().await;
        let worker = workers.get(worker_id).ok_or_else(|| OrchestratorError::UnknownWorker(worker_id.to_string()))?;
        if worker.status != WorkerStatus::Online {
            return Ok(None);
        }
        let capabilities = worker.capabilities.clone();

        let mut state = self.task_state.lock().await;
        // Scan in priority order, bounded by queue length, looking for the
        // first task whose requirements this worker satisfies.
        let mut held_back = Vec::new();
        let mut matched_task_id = None;
        while let Some(entry) = state.queue.pop() {
            let Some(task) = state.tasks.get(&entry.task_id) else {
                // Task was cancelled/removed after being queued; drop the entry.
                continue;
            };
            if task.status != TaskStatus::Pending {
                continue;
            }
            if task.required_capabilities.is_subset(&capabilities) {
                matched_task_id = Some(entry.task_id.clone());
                break;
            }
            held_back.push(entry);
        }
        for entry in held_back {
            state.queue.push(entry);
        }

        let Some(task_id) = matched_task_id else {
            return Ok(None);
        };

        let task = state.tasks.get_mut(&task_id).expect("matched task must exist");
        task.status = TaskStatus::Assigned;
        task.assigned_worker_id = Some(worker_id.to_string());
        task.assigned_at = Some(Utc::now());
        let snapshot = task.clone();
        drop(state);

        drop(workers);
        let mut workers = self.workers.lock().await;
        if let Some(worker) = workers.get_mut(worker_id) {
            worker.status = WorkerStatus::Busy;
        }

        debug!(task_id = %task_id, worker_id = %worker_id, "task assigned");
        Ok(Some(snapshot))
    }

    pub async fn submit_result(&self, task_id: &str, worker_id: &str, result: serde_json::Value) -> Result<(), OrchestratorError> {
        let mut state = self.task_state.lock().await;
        let task = state.tasks.get_mut(task_id).ok_or_else(|| OrchestratorError::TaskNotFound(task_id.to_string()))?;

        if task.status.is_terminal() {
            return Err(OrchestratorError::AlreadyTerminal(task_id.to_string()));
        }
        if task.assigned_worker_id.as_deref() != Some(worker_id) {
            return Err(OrchestratorError::WrongWorker { task_id: task_id.to_string(), worker_id: worker_id.to_string() });
        }

        let malformed = result.get("error").and_then(|v| v.as_str()).is_some();
        if malformed {
            task.status = TaskStatus::Failed;
            task.failure_reason = Some("worker_reported_failure".to_string());
        } else {
            task.status = TaskStatus::Completed;
        }
        task.result = Some(result);
        task.completed_at = Some(Utc::now());
        drop(state);

        let mut workers = self.workers.lock().await;
        if let Some(worker) = workers.get_mut(worker_id) {
            worker.status = WorkerStatus::Online;
            if malformed {
                worker.tasks_failed += 1;
            } else {
                worker.tasks_completed += 1;
            }
        }
        Ok(())
    }

    pub async fn get_status(&self, task_id: &str) -> Option<Task> {
        let state = self.task_state.lock().await;
        state.tasks.get(task_id).cloned()
    }

    pub async fn list_workers(&self) -> Vec<Worker> {
        let workers = self.workers.lock().await;
        workers.values().cloned().collect()
    }

    /// Open question §9 resolution: explicit producer-initiated cancellation.
    pub async fn cancel_task(&self, task_id: &str) -> Result<(), OrchestratorError> {
        let mut state = self.task_state.lock().await;
        let task = state.tasks.get_mut(task_id).ok_or_else(|| OrchestratorError::TaskNotFound(task_id.to_string()))?;
        if task.status.is_terminal() {
            return Err(OrchestratorError::AlreadyTerminal(task_id.to_string()));
        }
        let was_assigned_worker = task.assigned_worker_id.take();
        task.status = TaskStatus::Failed;
        task.failure_reason = Some("cancelled".to_string());
        task.completed_at = Some(Utc::now());
        drop(state);

        if let Some(worker_id) = was_assigned_worker {
            let mut workers = self.workers.lock().await;
            if let Some(worker) = workers.get_mut(&worker_id) {
                worker.status = WorkerStatus::Online;
            }
        }
        Ok(())
    }

    pub async fn health_snapshot(&self) -> (usize, usize) {
        let workers = self.workers.lock().await;
        let online = workers.values().filter(|w| w.status == WorkerStatus::Online).count();
        let state = self.task_state.lock().await;
        let pending = state.tasks.values().filter(|t| t.status == TaskStatus::Pending).count();
        (online, pending)
    }

    /// Heartbeat sweep (spec §4.1): workers silent beyond `heartbeat_timeout`
    /// die and their assigned tasks are requeued (or failed if exhausted).
    pub async fn sweep_heartbeats(&self) {
        let now = Utc::now();
        let timeout = chrono::Duration::seconds(self.config.heartbeat_timeout_secs as i64);

        let mut workers = self.workers.lock().await;
        let dead: Vec<String> = workers
            .iter()
            .filter(|(_, w)| w.status != WorkerStatus::Dead && now.signed_duration_since(w.last_heartbeat) > timeout)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &dead {
            if let Some(w) = workers.get_mut(id) {
                w.status = WorkerStatus::Dead;
                warn!(worker_id = %id, "worker missed heartbeat, marked dead");
            }
        }
        drop(workers);

        if !dead.is_empty() {
            self.reclaim_tasks_of(&dead).await;
        }
    }

    /// Task timeout sweep (spec §4.1): tasks whose `assigned_at + task_timeout`
    /// has elapsed are returned to pending and their worker marked dead.
    pub async fn sweep_timeouts(&self) {
        let now = Utc::now();
        let timeout = chrono::Duration::seconds(self.config.task_timeout_secs as i64);

        let state = self.task_state.lock().await;
        let timed_out_workers: Vec<String> = state
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Assigned)
            .filter(|t| t.assigned_at.map(|at| now.signed_duration_since(at) > timeout).unwrap_or(false))
            .filter_map(|t| t.assigned_worker_id.clone())
            .collect();
        drop(state);

        if timed_out_workers.is_empty() {
            return;
        }

        {
            let mut workers = self.workers.lock().await;
            for id in &timed_out_workers {
                if let Some(w) = workers.get_mut(id) {
                    w.status = WorkerStatus::Dead;
                }
            }
        }
        self.reclaim_tasks_of(&timed_out_workers).await;
    }

    /// Shared by both sweepers: requeue (or fail) every task assigned to one
    /// of `dead_worker_ids`.
    async fn reclaim_tasks_of(&self, dead_worker_ids: &[String]) {
        let dead: std::collections::HashSet<&str> = dead_worker_ids.iter().map(|s| s.as_str()).collect();
        let mut state = self.task_state.lock().await;
        let mut requeue = Vec::new();
        for task in state.tasks.values_mut() {
            if task.status != TaskStatus::Assigned {
                continue;
            }
            let Some(worker_id) = &task.assigned_worker_id else { continue };
            if !dead.contains(worker_id.as_str()) {
                continue;
            }

            task.attempt_count += 1;
            task.assigned_worker_id = None;
            task.assigned_at = None;

            if task.attempt_count >= self.config.max_attempts {
                task.status = TaskStatus::Failed;
                task.failure_reason = Some("exhausted_retries".to_string());
                warn!(task_id = %task.task_id, "task exhausted retries after worker loss");
            } else {
                task.status = TaskStatus::Pending;
                requeue.push(QueueEntry { task_id: task.task_id.clone(), priority: task.priority, created_at: task.created_at });
                info!(task_id = %task.task_id, attempt = task.attempt_count, "task requeued after worker loss");
            }
        }
        for entry in requeue {
            state.queue.push(entry);
        }
    }

    /// Best-effort audit persistence: dumps assigned/completed tasks to disk
    /// (spec §6 `tasks/assignments.json`, `tasks/completed.json`).
    pub async fn persist_audit(&self) {
        let state = self.task_state.lock().await;
        let assigned: Vec<&Task> = state.tasks.values().filter(|t| t.status == TaskStatus::Assigned).collect();
        let completed: Vec<&Task> = state.tasks.values().filter(|t| t.status.is_terminal()).collect();

        if let Err(e) = persistence::write_json_atomic(&self.data_dir.join("tasks").join("assignments.json"), &assigned) {
            warn!(error = %e, "failed to persist task assignments");
        }
        if let Err(e) = persistence::write_json_atomic(&self.data_dir.join("tasks").join("completed.json"), &completed) {
            warn!(error = %e, "failed to persist completed tasks");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_orchestrator() -> Orchestrator {
        Orchestrator::new(OrchestratorConfig::default(), std::env::temp_dir().join("taskgrid-test"))
    }

    fn chat_payload() -> Payload {
        Payload::LlmChat { messages: vec![], options: serde_json::Value::Null }
    }

    #[tokio::test]
    async fn basic_dispatch_end_to_end() {
        let orch = test_orchestrator();
        let mut caps = BTreeSet::new();
        caps.insert("groq".to_string());
        let worker_id = orch.register_worker("groq", caps.clone()).await;

        let mut required = BTreeSet::new();
        required.insert("groq".to_string());
        let task_id = orch.submit_task(chat_payload(), 5, required).await;

        let polled = orch.poll_task(&worker_id).await.unwrap().expect("task should be assigned");
        assert_eq!(polled.task_id, task_id);

        orch.submit_result(&task_id, &worker_id, serde_json::json!({"ok": true, "text": "hello"})).await.unwrap();

        let status = orch.get_status(&task_id).await.unwrap();
        assert_eq!(status.status, TaskStatus::Completed);
        assert_eq!(status.result.unwrap()["text"], "hello");
    }

    #[tokio::test]
    async fn capability_mismatch_leaves_task_pending() {
        let orch = test_orchestrator();
        let mut gemini = BTreeSet::new();
        gemini.insert("gemini".to_string());
        let worker_id = orch.register_worker("gemini", gemini).await;

        let mut required = BTreeSet::new();
        required.insert("groq".to_string());
        let task_id = orch.submit_task(chat_payload(), 5, required).await;

        let polled = orch.poll_task(&worker_id).await.unwrap();
        assert!(polled.is_none());

        let status = orch.get_status(&task_id).await.unwrap();
        assert_eq!(status.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn heartbeat_death_requeues_task() {
        let config = OrchestratorConfig { heartbeat_timeout_secs: 0, ..OrchestratorConfig::default() };
        let orch = Orchestrator::new(config, std::env::temp_dir().join("taskgrid-test-hb"));

        let worker_id = orch.register_worker("groq", BTreeSet::new()).await;
        let task_id = orch.submit_task(chat_payload(), 5, BTreeSet::new()).await;
        orch.poll_task(&worker_id).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        orch.sweep_heartbeats().await;

        let workers = orch.list_workers().await;
        let worker = workers.iter().find(|w| w.worker_id == worker_id).unwrap();
        assert_eq!(worker.status, WorkerStatus::Dead);

        let status = orch.get_status(&task_id).await.unwrap();
        assert_eq!(status.status, TaskStatus::Pending);
        assert_eq!(status.attempt_count, 1);
    }

    #[tokio::test]
    async fn exhausted_retries_fails_task_instead_of_requeue() {
        let config = OrchestratorConfig { heartbeat_timeout_secs: 0, max_attempts: 1, ..OrchestratorConfig::default() };
        let orch = Orchestrator::new(config, std::env::temp_dir().join("taskgrid-test-exhaust"));

        let worker_id = orch.register_worker("groq", BTreeSet::new()).await;
        let task_id = orch.submit_task(chat_payload(), 5, BTreeSet::new()).await;
        orch.poll_task(&worker_id).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        orch.sweep_heartbeats().await;

        let status = orch.get_status(&task_id).await.unwrap();
        assert_eq!(status.status, TaskStatus::Failed);
        assert_eq!(status.failure_reason.as_deref(), Some("exhausted_retries"));
    }

    #[tokio::test]
    async fn priority_ordering_respected() {
        let orch = test_orchestrator();
        let worker_id = orch.register_worker("groq", BTreeSet::new()).await;

        let low = orch.submit_task(chat_payload(), 2, BTreeSet::new()).await;
        let high = orch.submit_task(chat_payload(), 9, BTreeSet::new()).await;

        let polled = orch.poll_task(&worker_id).await.unwrap().unwrap();
        assert_eq!(polled.task_id, high);
        assert_ne!(polled.task_id, low);
    }

    #[tokio::test]
    async fn wrong_worker_cannot_complete_task() {
        let orch = test_orchestrator();
        let worker_a = orch.register_worker("groq", BTreeSet::new()).await;
        let worker_b = orch.register_worker("groq", BTreeSet::new()).await;
        let task_id = orch.submit_task(chat_payload(), 5, BTreeSet::new()).await;
        orch.poll_task(&worker_a).await.unwrap();

        let err = orch.submit_result(&task_id, &worker_b, serde_json::json!({})).await.unwrap_err();
        assert_eq!(err, OrchestratorError::WrongWorker { task_id, worker_id: worker_b });
    }

    #[tokio::test]
    async fn cancel_pending_task() {
        let orch = test_orchestrator();
        let task_id = orch.submit_task(chat_payload(), 5, BTreeSet::new()).await;
        orch.cancel_task(&task_id).await.unwrap();
        let status = orch.get_status(&task_id).await.unwrap();
        assert_eq!(status.status, TaskStatus::Failed);
        assert_eq!(status.failure_reason.as_deref(), Some("cancelled"));

        let err = orch.cancel_task(&task_id).await.unwrap_err();
        assert_eq!(err, OrchestratorError::AlreadyTerminal(task_id));
    }
}

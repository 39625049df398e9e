use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
};
use tracing::warn;

mod error;

pub use error::{map_api_result, TaskError, TaskErrorCode, TaskResult};

use crate::errors::ApiResult;

pub type TaskId = u64;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDescriptor {
    pub kind: String,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

impl TaskDescriptor {
    pub fn new(kind: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            label: label.into(),
            created_at: Utc::now(),
        }
    }
}

/// Lifecycle notification handed to the host's event sink. Transports
/// typically forward these to their UI layer verbatim.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "event")]
pub enum TaskEvent {
    Created {
        id: TaskId,
        descriptor: TaskDescriptor,
    },
    Updated {
        id: TaskId,
        metadata: Value,
    },
    Progress {
        id: TaskId,
        percent: u8,
    },
    Finished {
        id: TaskId,
        result: ApiResult<Value>,
    },
    Aborted {
        id: TaskId,
    },
}

pub type TaskSink = Box<dyn Fn(&TaskEvent) + Send + Sync>;

struct TaskRecord {
    descriptor: TaskDescriptor,
    metadata: serde_json::Map<String, Value>,
    percent: u8,
    cancel: Arc<AtomicBool>,
}

/// Registry of in-flight engine tasks. Hands out abort tokens and fans
/// lifecycle events out to an optional sink.
#[derive(Default)]
pub struct TaskTracker {
    inner: Mutex<HashMap<TaskId, TaskRecord>>,
    next_id: AtomicU64,
    sink: Option<TaskSink>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(sink: TaskSink) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            sink: Some(sink),
        }
    }

    fn emit(&self, event: TaskEvent) {
        if let Some(sink) = &self.sink {
            sink(&event);
        }
    }

    fn with_registry<T>(
        &self,
        f: impl FnOnce(&mut HashMap<TaskId, TaskRecord>) -> TaskResult<T>,
    ) -> TaskResult<T> {
        let mut map = self.inner.lock().map_err(|_| {
            TaskError::new(
                TaskErrorCode::RegistryLockFailed,
                "Failed to lock task registry",
            )
        })?;
        f(&mut map)
    }

    pub fn create(&self, descriptor: TaskDescriptor) -> TaskResult<TaskId> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.with_registry(|map| {
            map.insert(
                id,
                TaskRecord {
                    descriptor: descriptor.clone(),
                    metadata: serde_json::Map::new(),
                    percent: 0,
                    cancel: Arc::new(AtomicBool::new(false)),
                },
            );
            Ok(())
        })?;
        self.emit(TaskEvent::Created { id, descriptor });
        Ok(id)
    }

    /// Merge a JSON object patch into the task metadata. Non-object patches
    /// are rejected as they would clobber the map.
    pub fn update(&self, id: TaskId, patch: Value) -> TaskResult<()> {
        let merged = self.with_registry(|map| {
            let record = map.get_mut(&id).ok_or_else(task_not_found)?;
            if let Value::Object(fields) = patch {
                for (key, value) in fields {
                    record.metadata.insert(key, value);
                }
            }
            Ok(Value::Object(record.metadata.clone()))
        })?;
        self.emit(TaskEvent::Updated {
            id,
            metadata: merged,
        });
        Ok(())
    }

    pub fn progress(&self, id: TaskId, percent: u8) -> TaskResult<()> {
        let percent = percent.min(100);
        self.with_registry(|map| {
            let record = map.get_mut(&id).ok_or_else(task_not_found)?;
            record.percent = percent;
            Ok(())
        })?;
        self.emit(TaskEvent::Progress { id, percent });
        Ok(())
    }

    /// Terminal transition: removes the record and reports the outcome.
    pub fn result(&self, id: TaskId, result: ApiResult<Value>) -> TaskResult<()> {
        self.with_registry(|map| {
            map.remove(&id).ok_or_else(task_not_found)?;
            Ok(())
        })?;
        self.emit(TaskEvent::Finished { id, result });
        Ok(())
    }

    /// Request cancellation. The flag is sampled by the running task at its
    /// own boundaries; the record stays until the task reports its result.
    pub fn abort(&self, id: TaskId) -> TaskResult<()> {
        self.with_registry(|map| {
            let record = map.get(&id).ok_or_else(task_not_found)?;
            record.cancel.store(true, Ordering::Relaxed);
            Ok(())
        })?;
        self.emit(TaskEvent::Aborted { id });
        Ok(())
    }

    pub fn abort_signal(&self, id: TaskId) -> TaskResult<Arc<AtomicBool>> {
        self.with_registry(|map| {
            map.get(&id)
                .map(|record| record.cancel.clone())
                .ok_or_else(task_not_found)
        })
    }

    pub fn descriptor(&self, id: TaskId) -> TaskResult<TaskDescriptor> {
        self.with_registry(|map| {
            map.get(&id)
                .map(|record| record.descriptor.clone())
                .ok_or_else(task_not_found)
        })
    }

    pub fn percent(&self, id: TaskId) -> TaskResult<u8> {
        self.with_registry(|map| {
            map.get(&id)
                .map(|record| record.percent)
                .ok_or_else(task_not_found)
        })
    }

    /// Flag every registered task for cancellation, e.g. on host shutdown.
    pub fn abort_all(&self) -> TaskResult<usize> {
        let flagged = self.with_registry(|map| {
            for record in map.values() {
                record.cancel.store(true, Ordering::Relaxed);
            }
            Ok(map.len())
        })?;
        if flagged > 0 {
            warn!(count = flagged, "aborting all in-flight tasks");
        }
        Ok(flagged)
    }
}

fn task_not_found() -> TaskError {
    TaskError::new(
        TaskErrorCode::TaskNotFound,
        "Task not found or already finished",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn create_abort_and_finish_round_trip() {
        let tracker = TaskTracker::new();
        let id = tracker
            .create(TaskDescriptor::new("paste", "2 items"))
            .unwrap();
        assert_eq!(tracker.descriptor(id).unwrap().label, "2 items");

        let signal = tracker.abort_signal(id).unwrap();
        assert!(!signal.load(Ordering::Relaxed));

        tracker.abort(id).unwrap();
        assert!(signal.load(Ordering::Relaxed));

        tracker.result(id, Ok(serde_json::json!({"done": true}))).unwrap();
        assert!(matches!(
            tracker.abort(id).unwrap_err().code(),
            TaskErrorCode::TaskNotFound
        ));
    }

    #[test]
    fn update_merges_metadata_patches() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let tracker = TaskTracker::with_sink(Box::new(move |event| {
            if let TaskEvent::Updated { metadata, .. } = event {
                sink_seen.lock().unwrap().push(metadata.clone());
            }
        }));

        let id = tracker
            .create(TaskDescriptor::new("paste", "3 items"))
            .unwrap();
        tracker
            .update(id, serde_json::json!({"estimated": true}))
            .unwrap();
        tracker
            .update(id, serde_json::json!({"destination": "/tmp"}))
            .unwrap();

        let snapshots = seen.lock().unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[1]["estimated"], serde_json::json!(true));
        assert_eq!(snapshots[1]["destination"], serde_json::json!("/tmp"));
    }

    #[test]
    fn progress_is_clamped() {
        let tracker = TaskTracker::new();
        let id = tracker
            .create(TaskDescriptor::new("paste", "1 item"))
            .unwrap();
        tracker.progress(id, 250).unwrap();
        assert_eq!(tracker.percent(id).unwrap(), 100);
    }
}

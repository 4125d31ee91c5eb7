//! Scheduler implementation

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

use crate::error::{QueueError, TaskError, TaskResult};

use super::config::SchedulerConfig;
use super::events::{DEFAULT_EVENT_CAPACITY, EventBus, QueueEvent};
use super::item::{PriorityPolicy, QueueItem};
use super::listener::QueueListener;
use super::queue::PendingQueue;
use super::state::{InFlight, QueueEntry, QueueEntryStatus, QueueState, RunState, SchedulerStats};
use super::task::{BoxedTask, Completion, RequestTask};

/// Internal state protected by mutex
struct SchedulerInner<T> {
    /// Requests not yet started
    pending: PendingQueue<T>,

    state: RunState,

    auto_run: bool,

    /// The single running request, if any
    in_flight: Option<InFlight>,

    stats: SchedulerStats,
}

struct Shared<T> {
    name: String,
    inner: Mutex<SchedulerInner<T>>,
    listener: RwLock<Option<Arc<dyn QueueListener>>>,
    events: EventBus,
    runtime: RwLock<Option<Handle>>,
}

/// Lifecycle transitions reported to the listener and event stream
#[derive(Debug, Clone, Copy)]
enum Transition {
    Started,
    Paused,
    Finished,
}

/// Outcome of one pass of the execution step
enum Step<T> {
    Idle,
    Launch(QueueItem<T>),
    Finished,
}

/// Single-flight, priority-ordered request scheduler
///
/// At most one request runs at a time. Requests run in ascending priority
/// order (ties in enqueue order), and the drain loop can be started, paused,
/// resumed and stopped while requests are queued or running. Cloning gives
/// another handle to the same scheduler.
pub struct Scheduler<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Scheduler<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Send + 'static> Scheduler<T> {
    /// Create a new scheduler
    ///
    /// Tasks are spawned on the tokio runtime active at construction if
    /// there is one, otherwise on whichever runtime is current when a task
    /// is launched. If that runtime shuts down, later tasks fall back to the
    /// current one.
    pub fn new(config: SchedulerConfig) -> Self {
        debug!(?config, "Scheduler::new: called");
        Self::build(config, Handle::try_current().ok())
    }

    /// Create a new scheduler that spawns its tasks on `runtime`
    pub fn with_runtime(config: SchedulerConfig, runtime: Handle) -> Self {
        debug!(?config, "Scheduler::with_runtime: called");
        Self::build(config, Some(runtime))
    }

    fn build(config: SchedulerConfig, runtime: Option<Handle>) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: config.name,
                inner: Mutex::new(SchedulerInner {
                    pending: PendingQueue::new(),
                    state: RunState::Stopped,
                    auto_run: config.auto_run,
                    in_flight: None,
                    stats: SchedulerStats::default(),
                }),
                listener: RwLock::new(None),
                events: EventBus::new(DEFAULT_EVENT_CAPACITY),
                runtime: RwLock::new(runtime),
            }),
        }
    }

    /// Register the lifecycle listener, replacing any previous one
    pub fn set_listener(&self, listener: Arc<dyn QueueListener>) {
        debug!(name = %self.shared.name, "Scheduler::set_listener: called");
        *self.shared.listener.write() = Some(listener);
    }

    /// Builder-style [`set_listener`](Self::set_listener)
    pub fn with_listener(self, listener: Arc<dyn QueueListener>) -> Self {
        self.set_listener(listener);
        self
    }

    /// Remove the lifecycle listener
    pub fn clear_listener(&self) {
        debug!(name = %self.shared.name, "Scheduler::clear_listener: called");
        *self.shared.listener.write() = None;
    }

    /// Subscribe to queue events
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        debug!(name = %self.shared.name, "Scheduler::subscribe: called");
        self.shared.events.subscribe()
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> RunState {
        self.shared.inner.lock().state
    }

    pub fn auto_run(&self) -> bool {
        self.shared.inner.lock().auto_run
    }

    /// Enable or disable auto-run for subsequent enqueues
    pub fn set_auto_run(&self, auto_run: bool) {
        debug!(name = %self.shared.name, auto_run, "Scheduler::set_auto_run: called");
        self.shared.inner.lock().auto_run = auto_run;
    }

    /// Number of pending requests (the in-flight one is not counted)
    pub fn len(&self) -> usize {
        self.shared.inner.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.inner.lock().pending.is_empty()
    }

    /// Check whether a request with this tag is pending
    pub fn contains(&self, tag: &str) -> bool {
        self.shared.inner.lock().pending.contains(tag)
    }

    /// Tag of the running request
    pub fn in_flight(&self) -> Option<String> {
        self.shared.inner.lock().in_flight.as_ref().map(|f| f.tag.clone())
    }

    /// Enqueue a request behind everything pending
    pub fn enqueue(
        &self,
        tag: impl Into<String>,
        task: impl RequestTask<T> + 'static,
        completion: Completion<T>,
    ) -> i64 {
        self.insert(tag.into(), PriorityPolicy::Append, Box::new(task), completion)
    }

    /// Enqueue a request with an explicit priority (lower runs earlier)
    pub fn enqueue_with_priority(
        &self,
        tag: impl Into<String>,
        task: impl RequestTask<T> + 'static,
        completion: Completion<T>,
        priority: i64,
    ) -> i64 {
        self.insert(tag.into(), PriorityPolicy::Explicit(priority), Box::new(task), completion)
    }

    /// Enqueue a request ahead of everything pending
    pub fn enqueue_front(
        &self,
        tag: impl Into<String>,
        task: impl RequestTask<T> + 'static,
        completion: Completion<T>,
    ) -> i64 {
        self.insert(tag.into(), PriorityPolicy::Prepend, Box::new(task), completion)
    }

    /// Enqueue a request and get its result through a channel
    pub fn enqueue_with_reply(
        &self,
        tag: impl Into<String>,
        task: impl RequestTask<T> + 'static,
    ) -> oneshot::Receiver<TaskResult<T>> {
        let (completion, rx) = Completion::channel();
        self.enqueue(tag, task, completion);
        rx
    }

    /// Enqueue several requests in order, each behind the previous one
    ///
    /// The three vectors must have the same length; otherwise nothing is
    /// enqueued. Auto-run triggers once, after the last insertion.
    pub fn enqueue_batch(
        &self,
        tags: Vec<String>,
        tasks: Vec<BoxedTask<T>>,
        completions: Vec<Completion<T>>,
    ) -> Result<Vec<i64>, QueueError> {
        debug!(
            name = %self.shared.name,
            tags = tags.len(),
            tasks = tasks.len(),
            completions = completions.len(),
            "Scheduler::enqueue_batch: called"
        );
        if tasks.len() != completions.len() || tasks.len() != tags.len() {
            debug!("Scheduler::enqueue_batch: length mismatch, rejecting");
            return Err(QueueError::InvalidArgument {
                tags: tags.len(),
                tasks: tasks.len(),
                completions: completions.len(),
            });
        }

        let mut inserted = Vec::with_capacity(tags.len());
        let should_start = {
            let mut inner = self.shared.inner.lock();
            for ((tag, task), completion) in tags.into_iter().zip(tasks).zip(completions) {
                let priority = inner.pending.push(tag.clone(), PriorityPolicy::Append, task, completion);
                inner.stats.total_enqueued += 1;
                inserted.push((tag, priority));
            }
            inner.stats.peak_queue_depth = inner.stats.peak_queue_depth.max(inner.pending.len());
            inner.auto_run && inner.state != RunState::Running
        };

        let priorities = inserted.iter().map(|(_, priority)| *priority).collect();
        for (tag, priority) in inserted {
            self.shared.events.emit(QueueEvent::Enqueued { tag, priority });
        }

        if should_start {
            debug!("Scheduler::enqueue_batch: auto-run, starting");
            self.start();
        }
        Ok(priorities)
    }

    /// Enqueue a boxed request under an arbitrary priority policy
    pub fn enqueue_with_policy(
        &self,
        tag: impl Into<String>,
        task: BoxedTask<T>,
        completion: Completion<T>,
        policy: PriorityPolicy,
    ) -> i64 {
        self.insert(tag.into(), policy, task, completion)
    }

    fn insert(&self, tag: String, policy: PriorityPolicy, task: BoxedTask<T>, completion: Completion<T>) -> i64 {
        debug!(name = %self.shared.name, %tag, ?policy, "Scheduler::insert: called");
        let (priority, should_start) = {
            let mut inner = self.shared.inner.lock();
            let priority = inner.pending.push(tag.clone(), policy, task, completion);
            inner.stats.total_enqueued += 1;
            inner.stats.peak_queue_depth = inner.stats.peak_queue_depth.max(inner.pending.len());
            (priority, inner.auto_run && inner.state != RunState::Running)
        };

        debug!(name = %self.shared.name, %tag, priority, "Request added to the queue");
        self.shared.events.emit(QueueEvent::Enqueued { tag, priority });

        if should_start {
            debug!("Scheduler::insert: auto-run, starting");
            self.start();
        }
        priority
    }

    /// Cancel the first pending request with this tag
    ///
    /// Returns false if no pending request matches. A request that already
    /// started cannot be cancelled. The cancelled request's completion never
    /// fires.
    pub fn cancel(&self, tag: &str) -> bool {
        debug!(name = %self.shared.name, %tag, "Scheduler::cancel: called");
        let removed = {
            let mut inner = self.shared.inner.lock();
            let removed = inner.pending.remove_first(tag);
            if removed.is_some() {
                inner.stats.total_cancelled += 1;
            }
            removed
        };

        match removed {
            Some(item) => {
                debug!(%tag, priority = item.priority, "Scheduler::cancel: removed from queue");
                drop(item);
                self.shared.events.emit(QueueEvent::Cancelled { tag: tag.to_string() });
                true
            }
            None => {
                debug!(%tag, "Scheduler::cancel: not found in queue");
                false
            }
        }
    }

    /// Cancel every pending request whose tag is in `tags`
    pub fn cancel_all<S: AsRef<str>>(&self, tags: &[S]) -> usize {
        let tags: HashSet<&str> = tags.iter().map(AsRef::as_ref).collect();
        debug!(name = %self.shared.name, ?tags, "Scheduler::cancel_all: called");
        let removed = {
            let mut inner = self.shared.inner.lock();
            let removed = inner.pending.remove_tagged(&tags);
            inner.stats.total_cancelled += removed.len() as u64;
            removed
        };

        let count = removed.len();
        for item in removed {
            self.shared.events.emit(QueueEvent::Cancelled { tag: item.tag });
        }
        debug!(count, "Scheduler::cancel_all: removed");
        count
    }

    /// Drop every pending request without touching the run state
    pub fn clear(&self) -> usize {
        debug!(name = %self.shared.name, "Scheduler::clear: called");
        let removed = {
            let mut inner = self.shared.inner.lock();
            let removed = inner.pending.drain_all();
            inner.stats.total_cleared += removed.len() as u64;
            removed
        };
        removed.len()
    }

    /// Start (or resume) draining the queue
    ///
    /// Returns false if the scheduler was already running.
    pub fn start(&self) -> bool {
        debug!(name = %self.shared.name, "Scheduler::start: called");
        {
            let mut inner = self.shared.inner.lock();
            if inner.state == RunState::Running {
                debug!("Scheduler::start: already running");
                return false;
            }
            inner.state = RunState::Running;
        }

        info!(name = %self.shared.name, "Queue started");
        self.notify(Transition::Started);
        self.advance();
        true
    }

    /// Pause after the in-flight request completes
    ///
    /// Returns false if the scheduler was not running.
    pub fn pause(&self) -> bool {
        debug!(name = %self.shared.name, "Scheduler::pause: called");
        {
            let mut inner = self.shared.inner.lock();
            if inner.state != RunState::Running {
                debug!(state = %inner.state, "Scheduler::pause: not running");
                return false;
            }
            inner.state = RunState::Paused;
        }

        info!(name = %self.shared.name, "Queue paused");
        self.notify(Transition::Paused);
        true
    }

    /// Stop and drop every pending request
    ///
    /// An in-flight request still completes and its completion still fires.
    pub fn stop(&self) {
        debug!(name = %self.shared.name, "Scheduler::stop: called");
        let removed = {
            let mut inner = self.shared.inner.lock();
            let removed = inner.pending.drain_all();
            inner.stats.total_cleared += removed.len() as u64;
            inner.state = RunState::Stopped;
            removed
        };
        drop(removed);

        info!(name = %self.shared.name, "Queue stopped");
        self.notify(Transition::Finished);
    }

    /// Get current queue state
    pub fn queue_state(&self) -> QueueState {
        debug!(name = %self.shared.name, "Scheduler::queue_state: called");
        let inner = self.shared.inner.lock();
        QueueState {
            state: inner.state,
            pending: inner.pending.len(),
            in_flight: inner.in_flight.as_ref().map(|f| f.tag.clone()),
            auto_run: inner.auto_run,
            stats: inner.stats.clone(),
        }
    }

    /// List the running request followed by pending ones in execution order
    pub fn queue_details(&self) -> Vec<QueueEntry> {
        debug!(name = %self.shared.name, "Scheduler::queue_details: called");
        let inner = self.shared.inner.lock();
        let now = Instant::now();

        inner
            .in_flight
            .iter()
            .map(|f| QueueEntry {
                tag: f.tag.clone(),
                priority: f.priority,
                status: QueueEntryStatus::Running,
                wait_time: f.started_at - f.enqueued_at,
            })
            .chain(inner.pending.ordered().into_iter().map(|item| QueueEntry {
                tag: item.tag.clone(),
                priority: item.priority,
                status: QueueEntryStatus::Queued,
                wait_time: now - item.enqueued_at,
            }))
            .collect()
    }

    /// Get the scheduler statistics
    pub fn stats(&self) -> SchedulerStats {
        self.shared.inner.lock().stats.clone()
    }

    /// Execution step: launch the next request if running and idle
    fn advance(&self) {
        loop {
            let step = {
                let mut inner = self.shared.inner.lock();
                if inner.state != RunState::Running {
                    debug!(state = %inner.state, "Scheduler::advance: not running");
                    Step::Idle
                } else if inner.in_flight.is_some() {
                    debug!("Scheduler::advance: request in flight");
                    Step::Idle
                } else if let Some(item) = inner.pending.pop() {
                    inner.in_flight = Some(InFlight {
                        tag: item.tag.clone(),
                        priority: item.priority,
                        started_at: Instant::now(),
                        enqueued_at: item.enqueued_at,
                    });
                    inner.stats.total_started += 1;
                    Step::Launch(item)
                } else {
                    inner.state = RunState::Stopped;
                    Step::Finished
                }
            };

            match step {
                Step::Idle => return,
                Step::Finished => {
                    info!(name = %self.shared.name, "Queue is empty, stop running");
                    self.notify(Transition::Finished);
                    return;
                }
                Step::Launch(item) => {
                    if self.launch(item) {
                        return;
                    }
                }
            }
        }
    }

    /// Spawn the request; returns false if it completed without running
    fn launch(&self, item: QueueItem<T>) -> bool {
        let QueueItem {
            tag,
            priority,
            task,
            completion,
            ..
        } = item;
        debug!(name = %self.shared.name, %tag, priority, "Start sending request");
        self.shared.events.emit(QueueEvent::RequestStarted {
            tag: tag.clone(),
            priority,
        });

        let runtime = self.shared.runtime.read().clone().or_else(|| Handle::try_current().ok());
        match runtime {
            Some(runtime) => {
                let mut running = Running {
                    scheduler: self.clone(),
                    tag,
                    priority,
                    completion: Some(completion),
                    started: None,
                };
                runtime.spawn(async move {
                    running.started = Some(Instant::now());
                    let result = match AssertUnwindSafe(task.run()).catch_unwind().await {
                        Ok(result) => result,
                        Err(payload) => {
                            warn!(tag = %running.tag, priority, "Request task panicked");
                            Err(TaskError::from_panic(payload))
                        }
                    };
                    running.finish(result);
                });
                true
            }
            None => {
                warn!(name = %self.shared.name, %tag, "No tokio runtime available, failing request");
                drop(task);
                self.complete(tag, priority, completion, Err(TaskError::NoRuntime), Duration::ZERO);
                false
            }
        }
    }

    /// Stop spawning on the stored runtime; later launches use the current one
    fn forget_runtime(&self) {
        if self.shared.runtime.write().take().is_some() {
            warn!(name = %self.shared.name, "Stored runtime is gone, falling back to the current runtime");
        }
    }

    /// Deliver a result and release the in-flight slot
    fn complete(
        &self,
        tag: String,
        priority: i64,
        completion: Completion<T>,
        result: TaskResult<T>,
        elapsed: Duration,
    ) {
        let success = result.is_ok();
        match &result {
            Ok(_) => debug!(%tag, priority, ?elapsed, "Response received successfully"),
            Err(e) => debug!(%tag, priority, error = %e, "Failure in executing request"),
        }

        // Deliver before releasing the slot, so a callback can pause the queue
        completion.deliver(&tag, result);

        {
            let mut inner = self.shared.inner.lock();
            if success {
                inner.stats.total_succeeded += 1;
            } else {
                inner.stats.total_failed += 1;
            }
            inner.stats.total_run_time_ms += elapsed.as_millis() as u64;
        }

        // Emitted while the slot is still held, so it precedes the next RequestStarted
        self.shared.events.emit(QueueEvent::RequestCompleted {
            tag,
            priority,
            success,
            elapsed,
        });

        self.shared.inner.lock().in_flight = None;
    }

    fn notify(&self, transition: Transition) {
        debug!(name = %self.shared.name, ?transition, "Scheduler::notify: called");
        let event = match transition {
            Transition::Started => QueueEvent::Started,
            Transition::Paused => QueueEvent::Paused,
            Transition::Finished => QueueEvent::Finished,
        };
        self.shared.events.emit(event);

        let listener = self.shared.listener.read().clone();
        if let Some(listener) = listener {
            match transition {
                Transition::Started => listener.on_queue_start(),
                Transition::Paused => listener.on_queue_pause(),
                Transition::Finished => listener.on_queue_finish(),
            }
        }
    }
}

/// The in-flight slot, owned by the spawned future
///
/// If the future is dropped before `finish` (runtime shut down, task
/// aborted), the completion still fires with [`TaskError::Aborted`] and the
/// slot is released so the queue keeps draining.
struct Running<T: Send + 'static> {
    scheduler: Scheduler<T>,
    tag: String,
    priority: i64,
    completion: Option<Completion<T>>,
    started: Option<Instant>,
}

impl<T: Send + 'static> Running<T> {
    fn elapsed(&self) -> Duration {
        self.started.map_or(Duration::ZERO, |started| started.elapsed())
    }

    fn finish(mut self, result: TaskResult<T>) {
        if let Some(completion) = self.completion.take() {
            let elapsed = self.elapsed();
            self.scheduler
                .complete(self.tag.clone(), self.priority, completion, result, elapsed);
        }
        self.scheduler.advance();
    }
}

impl<T: Send + 'static> Drop for Running<T> {
    fn drop(&mut self) {
        let Some(completion) = self.completion.take() else {
            return;
        };

        if self.started.is_none() {
            // Never polled: the runtime refused or discarded the task
            self.scheduler.forget_runtime();
        }
        warn!(tag = %self.tag, priority = self.priority, "Request dropped before completing");
        let elapsed = self.elapsed();
        self.scheduler
            .complete(self.tag.clone(), self.priority, completion, Err(TaskError::Aborted), elapsed);
        self.scheduler.advance();
    }
}

//! Queue-partitioned worker pool.
//!
//! Each queue owns a FIFO channel and a fixed set of worker threads; a worker
//! only ever pulls from its own queue. The split of the global concurrency
//! across queues is computed once per generation by [`allocate_workers`].
//! A restart drains the current generation and spawns a new one from a fresh
//! read of the queue configuration.
//!
//! Every job runs under a permit from a pool shared by all generations, sized
//! to the current global concurrency. A job detached by a drain keeps its
//! permit until it returns, so the new generation cannot push the number of
//! running jobs past the limit.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};

use super::allocation::{allocate_workers, WorkerAllocation};
use super::error::SchedulerError;
use super::job::{panic_message, ErrorSink, Job, JobFailure};
use super::queue::{QueueName, SchedulerConfig};
use crate::settings::SettingsStore;

const RECV_TIMEOUT: Duration = Duration::from_millis(100);
const DRAIN_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    /// Finishing its current job during a restart.
    Draining,
    Stopped,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Idle,
            1 => WorkerState::Running,
            2 => WorkerState::Draining,
            _ => WorkerState::Stopped,
        }
    }
}

struct StateCell(AtomicU8);

impl StateCell {
    fn new(state: WorkerState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    fn get(&self) -> WorkerState {
        WorkerState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: WorkerState) {
        self.0.store(state as u8, Ordering::Release);
    }

    fn transition(&self, from: WorkerState, to: WorkerState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[derive(Debug, Default)]
struct PermitCount {
    capacity: usize,
    in_use: usize,
}

/// Execution permits shared across generations.
#[derive(Default)]
struct Permits {
    count: Mutex<PermitCount>,
    released: Condvar,
}

impl Permits {
    fn lock(&self) -> MutexGuard<'_, PermitCount> {
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_capacity(&self, capacity: usize) {
        self.lock().capacity = capacity;
        self.released.notify_all();
    }

    fn in_use(&self) -> usize {
        self.lock().in_use
    }

    /// Blocks until a permit is free. Gives up with `None` once `draining` is set.
    fn acquire(self: &Arc<Self>, draining: &AtomicBool) -> Option<Permit> {
        let mut count = self.lock();
        loop {
            if draining.load(Ordering::Acquire) {
                return None;
            }
            if count.in_use < count.capacity {
                count.in_use += 1;
                return Some(Permit(Arc::clone(self)));
            }
            count = self
                .released
                .wait_timeout(count, RECV_TIMEOUT)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

struct Permit(Arc<Permits>);

impl Drop for Permit {
    fn drop(&mut self) {
        let mut count = self.0.lock();
        count.in_use = count.in_use.saturating_sub(1);
        drop(count);
        self.0.released.notify_one();
    }
}

/// What happened to the work of a drained generation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Queued jobs that never started.
    pub discarded: usize,
    /// Jobs that were running when the drain began and finished within the grace period.
    pub completed_in_flight: usize,
    /// Workers still busy when the grace period ran out. Their threads are detached.
    pub abandoned: usize,
}

struct Worker {
    state: Arc<StateCell>,
    handle: JoinHandle<()>,
}

struct Lane {
    sender: Sender<Job>,
    receiver: Receiver<Job>,
    workers: Vec<Worker>,
}

/// Flags and counters shared by every worker of one generation.
struct GenerationShared {
    draining: AtomicBool,
    discarded_late: AtomicUsize,
    completed_after_drain: AtomicUsize,
}

struct Generation {
    number: u64,
    lanes: BTreeMap<QueueName, Lane>,
    shared: Arc<GenerationShared>,
    grace_period: Duration,
}

enum SchedulerState {
    Stopped,
    Running(Generation),
    Restarting,
}

/// Priority-aware scheduler for background jobs.
pub struct TaskScheduler {
    settings: Arc<dyn SettingsStore>,
    error_sink: Arc<dyn ErrorSink>,
    state: Mutex<SchedulerState>,
    active_jobs: Arc<AtomicUsize>,
    permits: Arc<Permits>,
    generations: AtomicU64,
}

impl TaskScheduler {
    pub fn new(settings: Arc<dyn SettingsStore>, error_sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            settings,
            error_sink,
            state: Mutex::new(SchedulerState::Stopped),
            active_jobs: Arc::new(AtomicUsize::new(0)),
            permits: Arc::new(Permits::default()),
            generations: AtomicU64::new(0),
        }
    }

    /// Reads the queue configuration and spawns the first generation of workers.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let mut state = self.lock_state();
        match *state {
            SchedulerState::Running(_) => return Err(SchedulerError::AlreadyRunning),
            SchedulerState::Restarting => return Err(SchedulerError::Restarting),
            SchedulerState::Stopped => {}
        }

        let config = self.settings.queue_configuration()?;
        let allocation = allocate_workers(config.concurrency, &config.queues)?;
        let generation = self.spawn_generation(&config, &allocation)?;
        *state = SchedulerState::Running(generation);
        Ok(())
    }

    /// Appends a job to the named queue. Returns the job id.
    pub fn enqueue(&self, queue: QueueName, job: Job) -> Result<String, SchedulerError> {
        let state = self.lock_state();
        let generation = match &*state {
            SchedulerState::Running(generation) => generation,
            SchedulerState::Restarting => return Err(SchedulerError::Restarting),
            SchedulerState::Stopped => return Err(SchedulerError::NotRunning),
        };

        let lane = generation
            .lanes
            .get(&queue)
            .filter(|lane| !lane.workers.is_empty())
            .ok_or(SchedulerError::QueueDisabled(queue))?;

        let job_id = job.id.clone();
        debug!("Enqueueing job {} ({}) on {}", job_id, job.label, queue);
        lane.sender
            .send(job)
            .map_err(|_| SchedulerError::QueueClosed(queue))?;
        Ok(job_id)
    }

    /// Drains the running generation and starts a new one from the current
    /// queue configuration.
    ///
    /// The new configuration is validated before anything is stopped, so an
    /// invalid configuration leaves the current workers untouched.
    pub fn restart(&self) -> Result<DrainReport, SchedulerError> {
        let config = self.settings.queue_configuration()?;
        let allocation = allocate_workers(config.concurrency, &config.queues)?;

        let old = {
            let mut state = self.lock_state();
            match std::mem::replace(&mut *state, SchedulerState::Restarting) {
                SchedulerState::Running(generation) => generation,
                other => {
                    let err = match other {
                        SchedulerState::Restarting => SchedulerError::Restarting,
                        _ => SchedulerError::NotRunning,
                    };
                    *state = other;
                    return Err(err);
                }
            }
        };

        info!("Restarting task scheduler (generation {})", old.number);
        let report = drain_generation(old);

        let spawned = self.spawn_generation(&config, &allocation);
        let mut state = self.lock_state();
        match spawned {
            Ok(generation) => {
                *state = SchedulerState::Running(generation);
                info!(
                    "Scheduler restarted: {} discarded, {} finished in flight, {} abandoned",
                    report.discarded, report.completed_in_flight, report.abandoned
                );
                Ok(report)
            }
            Err(e) => {
                *state = SchedulerState::Stopped;
                error!("Scheduler failed to restart: {}", e);
                Err(e)
            }
        }
    }

    /// Drains the running generation without starting a new one.
    pub fn shutdown(&self) -> Result<DrainReport, SchedulerError> {
        let old = {
            let mut state = self.lock_state();
            match std::mem::replace(&mut *state, SchedulerState::Stopped) {
                SchedulerState::Running(generation) => generation,
                other => {
                    *state = other;
                    return Err(SchedulerError::NotRunning);
                }
            }
        };
        info!("Shutting down task scheduler...");
        Ok(drain_generation(old))
    }

    /// Workers per queue in the running generation. Empty when stopped.
    pub fn worker_counts(&self) -> BTreeMap<QueueName, usize> {
        match &*self.lock_state() {
            SchedulerState::Running(generation) => generation
                .lanes
                .iter()
                .map(|(queue, lane)| (*queue, lane.workers.len()))
                .collect(),
            _ => BTreeMap::new(),
        }
    }

    pub fn worker_states(&self, queue: QueueName) -> Vec<WorkerState> {
        match &*self.lock_state() {
            SchedulerState::Running(generation) => generation
                .lanes
                .get(&queue)
                .map(|lane| lane.workers.iter().map(|w| w.state.get()).collect())
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Jobs waiting in the named queue.
    pub fn pending(&self, queue: QueueName) -> usize {
        match &*self.lock_state() {
            SchedulerState::Running(generation) => generation
                .lanes
                .get(&queue)
                .map(|lane| lane.receiver.len())
                .unwrap_or(0),
            _ => 0,
        }
    }

    /// Jobs currently executing, including ones left behind by an abandoned drain.
    pub fn active_jobs(&self) -> usize {
        self.active_jobs.load(Ordering::Acquire)
    }

    /// Execution permits held, including those of detached jobs.
    pub fn permits_in_use(&self) -> usize {
        self.permits.in_use()
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.lock_state(), SchedulerState::Running(_))
    }

    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_generation(
        &self,
        config: &SchedulerConfig,
        allocation: &WorkerAllocation,
    ) -> Result<Generation, SchedulerError> {
        let number = self.generations.fetch_add(1, Ordering::AcqRel) + 1;
        let shared = Arc::new(GenerationShared {
            draining: AtomicBool::new(false),
            discarded_late: AtomicUsize::new(0),
            completed_after_drain: AtomicUsize::new(0),
        });

        self.permits.set_capacity(config.concurrency);

        let mut lanes = BTreeMap::new();
        for (&queue, &count) in allocation {
            let (sender, receiver) = unbounded::<Job>();
            let mut workers = Vec::with_capacity(count);

            for worker_id in 0..count {
                let state = Arc::new(StateCell::new(WorkerState::Idle));
                let ctx = WorkerContext {
                    queue,
                    worker_id,
                    receiver: receiver.clone(),
                    state: Arc::clone(&state),
                    shared: Arc::clone(&shared),
                    active_jobs: Arc::clone(&self.active_jobs),
                    permits: Arc::clone(&self.permits),
                    error_sink: Arc::clone(&self.error_sink),
                };
                let handle = thread::Builder::new()
                    .name(format!("{}-{}", queue, worker_id))
                    .spawn(move || run_worker(ctx))
                    .map_err(SchedulerError::Spawn)?;
                workers.push(Worker { state, handle });
            }

            lanes.insert(
                queue,
                Lane {
                    sender,
                    receiver,
                    workers,
                },
            );
        }

        info!(
            "Started scheduler generation {} with {} workers across {} queues",
            number,
            allocation.values().sum::<usize>(),
            allocation.values().filter(|&&n| n > 0).count()
        );

        Ok(Generation {
            number,
            lanes,
            shared,
            grace_period: config.grace_period,
        })
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        if let SchedulerState::Running(generation) = &*self.lock_state() {
            generation.shared.draining.store(true, Ordering::Release);
        }
    }
}

fn drain_generation(generation: Generation) -> DrainReport {
    let Generation {
        number,
        lanes,
        shared,
        grace_period,
    } = generation;

    shared.draining.store(true, Ordering::Release);

    let mut discarded = 0;
    let mut workers = Vec::new();
    for (queue, lane) in lanes {
        let dropped = lane.receiver.try_iter().count();
        if dropped > 0 {
            debug!("Discarded {} queued jobs from {}", dropped, queue);
        }
        discarded += dropped;

        for worker in &lane.workers {
            worker
                .state
                .transition(WorkerState::Running, WorkerState::Draining);
        }
        workers.extend(lane.workers);
    }

    let deadline = Instant::now() + grace_period;
    while workers.iter().any(|w| !w.handle.is_finished()) && Instant::now() < deadline {
        thread::sleep(DRAIN_POLL);
    }

    let mut abandoned = 0;
    for worker in workers {
        if worker.handle.is_finished() {
            if let Err(e) = worker.handle.join() {
                error!("Worker thread panicked outside a job: {:?}", e);
            }
        } else {
            abandoned += 1;
        }
    }
    if abandoned > 0 {
        warn!(
            "Generation {}: {} workers still busy after {:?}, detaching",
            number, abandoned, grace_period
        );
    }

    DrainReport {
        discarded: discarded + shared.discarded_late.load(Ordering::Acquire),
        completed_in_flight: shared.completed_after_drain.load(Ordering::Acquire),
        abandoned,
    }
}

struct WorkerContext {
    queue: QueueName,
    worker_id: usize,
    receiver: Receiver<Job>,
    state: Arc<StateCell>,
    shared: Arc<GenerationShared>,
    active_jobs: Arc<AtomicUsize>,
    permits: Arc<Permits>,
    error_sink: Arc<dyn ErrorSink>,
}

fn run_worker(ctx: WorkerContext) {
    debug!("Worker {}-{} started", ctx.queue, ctx.worker_id);

    loop {
        if ctx.shared.draining.load(Ordering::Acquire) {
            break;
        }

        match ctx.receiver.recv_timeout(RECV_TIMEOUT) {
            Ok(job) => {
                let permit = match ctx.permits.acquire(&ctx.shared.draining) {
                    Some(permit) => permit,
                    None => {
                        debug!("Worker {}-{} discarding job {} (draining)", ctx.queue, ctx.worker_id, job.id);
                        ctx.shared.discarded_late.fetch_add(1, Ordering::AcqRel);
                        break;
                    }
                };
                ctx.state.set(WorkerState::Running);
                execute(&ctx, job);
                drop(permit);
                if ctx.shared.draining.load(Ordering::Acquire) {
                    ctx.shared.completed_after_drain.fetch_add(1, Ordering::AcqRel);
                }
                ctx.state.transition(WorkerState::Running, WorkerState::Idle);
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Worker {}-{} queue disconnected", ctx.queue, ctx.worker_id);
                break;
            }
        }
    }

    ctx.state.set(WorkerState::Stopped);
    debug!("Worker {}-{} stopped", ctx.queue, ctx.worker_id);
}

fn execute(ctx: &WorkerContext, job: Job) {
    let job_id = job.id.clone();
    let label = job.label.clone();
    debug!("Worker {}-{} running job {} ({})", ctx.queue, ctx.worker_id, job_id, label);

    ctx.active_jobs.fetch_add(1, Ordering::AcqRel);
    let outcome = catch_unwind(AssertUnwindSafe(move || job.run()));
    ctx.active_jobs.fetch_sub(1, Ordering::AcqRel);

    let (message, panicked) = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(e)) => (e.to_string(), false),
        Err(payload) => (panic_message(payload.as_ref()), true),
    };

    ctx.error_sink.report(JobFailure {
        job_id,
        label,
        queue: ctx.queue,
        message,
        panicked,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{Config, SystemSettings};
    use crate::scheduler::job::ChannelErrorSink;
    use crate::scheduler::queue::QueueConfiguration;
    use crate::settings::ConfigSettingsStore;

    fn store(concurrency: usize, queues: &[(QueueName, i32)], grace_secs: u64) -> Arc<ConfigSettingsStore> {
        let mut config: Config = serde_json::from_str(r#"{"version": "1.0"}"#).unwrap();
        config.system = SystemSettings {
            task_concurrency: concurrency,
            queues: queues
                .iter()
                .map(|(name, priority)| QueueConfiguration::new(*name, *priority))
                .collect(),
            ..SystemSettings::default()
        };
        config.engine.shutdown_grace_period_secs = grace_secs;
        Arc::new(ConfigSettingsStore::from_config(config).unwrap())
    }

    fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn test_worker_counts_follow_priorities() {
        let settings = store(
            10,
            &[(QueueName::ReceiptProcessing, 3), (QueueName::BulkOperations, 1)],
            1,
        );
        let (sink, _rx) = ChannelErrorSink::new();
        let scheduler = TaskScheduler::new(settings, Arc::new(sink));
        scheduler.start().unwrap();

        let counts = scheduler.worker_counts();
        assert_eq!(counts[&QueueName::ReceiptProcessing], 8);
        assert_eq!(counts[&QueueName::BulkOperations], 2);
        assert!(counts.values().sum::<usize>() <= 10);

        scheduler.shutdown().unwrap();
        assert!(scheduler.worker_counts().is_empty());
    }

    #[test]
    fn test_enqueue_before_start() {
        let settings = store(1, &[(QueueName::ReceiptProcessing, 1)], 1);
        let scheduler = TaskScheduler::new(settings, Arc::new(ChannelErrorSink::new().0));
        let result = scheduler.enqueue(QueueName::ReceiptProcessing, Job::new("x", || Ok(())));
        assert!(matches!(result, Err(SchedulerError::NotRunning)));
    }

    #[test]
    fn test_start_twice_fails() {
        let settings = store(1, &[(QueueName::ReceiptProcessing, 1)], 1);
        let scheduler = TaskScheduler::new(settings, Arc::new(ChannelErrorSink::new().0));
        scheduler.start().unwrap();
        assert!(matches!(scheduler.start(), Err(SchedulerError::AlreadyRunning)));
        scheduler.shutdown().unwrap();
    }

    #[test]
    fn test_same_queue_is_fifo() {
        let settings = store(1, &[(QueueName::ReceiptProcessing, 1)], 1);
        let scheduler = TaskScheduler::new(settings, Arc::new(ChannelErrorSink::new().0));
        scheduler.start().unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let order = Arc::clone(&order);
            scheduler
                .enqueue(
                    QueueName::ReceiptProcessing,
                    Job::new(format!("job-{}", i), move || {
                        order.lock().unwrap().push(i);
                        Ok(())
                    }),
                )
                .unwrap();
        }

        assert!(wait_until(Duration::from_secs(5), || order.lock().unwrap().len() == 5));
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        scheduler.shutdown().unwrap();
    }

    #[test]
    fn test_failures_reach_sink_and_worker_survives() {
        let settings = store(1, &[(QueueName::BulkOperations, 1)], 1);
        let (sink, failures) = ChannelErrorSink::new();
        let scheduler = TaskScheduler::new(settings, Arc::new(sink));
        scheduler.start().unwrap();

        scheduler
            .enqueue(QueueName::BulkOperations, Job::new("err", || Err("bad input".into())))
            .unwrap();
        scheduler
            .enqueue(QueueName::BulkOperations, Job::new("panic", || panic!("kaboom")))
            .unwrap();

        let first = failures.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(first.label, "err");
        assert_eq!(first.message, "bad input");
        assert!(!first.panicked);

        let second = failures.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(second.label, "panic");
        assert!(second.panicked);
        assert!(second.message.contains("kaboom"));

        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        scheduler
            .enqueue(
                QueueName::BulkOperations,
                Job::new("after", move || {
                    done_tx.send(()).ok();
                    Ok(())
                }),
            )
            .unwrap();
        assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok());
        assert_eq!(scheduler.worker_counts()[&QueueName::BulkOperations], 1);
        scheduler.shutdown().unwrap();
    }

    #[test]
    fn test_zero_priority_queue_rejects() {
        let settings = store(
            2,
            &[(QueueName::ReceiptProcessing, 1), (QueueName::SystemCleanUp, 0)],
            1,
        );
        let scheduler = TaskScheduler::new(settings, Arc::new(ChannelErrorSink::new().0));
        scheduler.start().unwrap();

        let result = scheduler.enqueue(QueueName::SystemCleanUp, Job::new("x", || Ok(())));
        assert!(matches!(
            result,
            Err(SchedulerError::QueueDisabled(QueueName::SystemCleanUp))
        ));
        let result = scheduler.enqueue(QueueName::EmailPolling, Job::new("x", || Ok(())));
        assert!(matches!(
            result,
            Err(SchedulerError::QueueDisabled(QueueName::EmailPolling))
        ));
        scheduler.shutdown().unwrap();
    }

    #[test]
    fn test_abandoned_worker_after_grace_period() {
        let settings = store(1, &[(QueueName::ReceiptProcessing, 1)], 0);
        let scheduler = TaskScheduler::new(settings, Arc::new(ChannelErrorSink::new().0));
        scheduler.start().unwrap();

        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(1);
        scheduler
            .enqueue(
                QueueName::ReceiptProcessing,
                Job::new("stuck", move || {
                    release_rx.recv_timeout(Duration::from_secs(10)).ok();
                    Ok(())
                }),
            )
            .unwrap();
        assert!(wait_until(Duration::from_secs(5), || scheduler.active_jobs() == 1));
        assert_eq!(
            scheduler.worker_states(QueueName::ReceiptProcessing),
            vec![WorkerState::Running]
        );

        let report = scheduler.shutdown().unwrap();
        assert_eq!(report.abandoned, 1);
        assert_eq!(report.completed_in_flight, 0);

        release_tx.send(()).unwrap();
        assert!(wait_until(Duration::from_secs(5), || scheduler.active_jobs() == 0));
        assert_eq!(scheduler.permits_in_use(), 0);
    }

    #[test]
    fn test_detached_job_holds_its_slot_across_restart() {
        let settings = store(1, &[(QueueName::ReceiptProcessing, 1)], 0);
        let scheduler = TaskScheduler::new(settings, Arc::new(ChannelErrorSink::new().0));
        scheduler.start().unwrap();

        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(1);
        scheduler
            .enqueue(
                QueueName::ReceiptProcessing,
                Job::new("stuck", move || {
                    release_rx.recv_timeout(Duration::from_secs(10)).ok();
                    Ok(())
                }),
            )
            .unwrap();
        assert!(wait_until(Duration::from_secs(5), || scheduler.active_jobs() == 1));

        let report = scheduler.restart().unwrap();
        assert_eq!(report.abandoned, 1);
        assert_eq!(scheduler.worker_counts()[&QueueName::ReceiptProcessing], 1);

        let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(1);
        scheduler
            .enqueue(
                QueueName::ReceiptProcessing,
                Job::new("next", move || {
                    started_tx.send(()).ok();
                    Ok(())
                }),
            )
            .unwrap();

        // Concurrency is 1 and the detached job still runs.
        assert!(started_rx.recv_timeout(Duration::from_millis(300)).is_err());
        assert_eq!(scheduler.active_jobs(), 1);
        assert_eq!(scheduler.permits_in_use(), 1);

        release_tx.send(()).unwrap();
        assert!(started_rx.recv_timeout(Duration::from_secs(5)).is_ok());
        assert!(wait_until(Duration::from_secs(5), || scheduler.permits_in_use() == 0));

        scheduler.shutdown().unwrap();
    }
}

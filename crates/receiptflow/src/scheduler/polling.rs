//! Timer that re-submits a job into the email polling queue.
//!
//! The trigger owns no polling logic; it calls a caller-supplied factory on
//! every tick (or manual trigger) and enqueues the resulting job.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::broadcast;

use super::job::Job;
use super::pool::TaskScheduler;
use super::queue::QueueName;

pub type JobFactory = Arc<dyn Fn() -> Job + Send + Sync>;

pub struct PollingTrigger {
    scheduler: Arc<TaskScheduler>,
    factory: JobFactory,
    interval: Duration,
    queue: QueueName,
    shutdown: Arc<AtomicBool>,
}

impl PollingTrigger {
    /// `interval_secs` of 0 disables the timer; manual triggers still work.
    pub fn new(scheduler: Arc<TaskScheduler>, interval_secs: u64, factory: JobFactory) -> Self {
        Self {
            scheduler,
            factory,
            interval: Duration::from_secs(interval_secs),
            queue: QueueName::EmailPolling,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Overrides the timer interval (sub-second intervals are handy in tests).
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn is_timer_enabled(&self) -> bool {
        !self.interval.is_zero()
    }

    /// Starts the trigger loop in a background thread.
    pub fn start(&self, mut trigger_rx: broadcast::Receiver<()>) -> std::io::Result<JoinHandle<()>> {
        let scheduler = Arc::clone(&self.scheduler);
        let factory = Arc::clone(&self.factory);
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.interval;
        let queue = self.queue;

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        std::thread::Builder::new()
            .name(format!("{}-trigger", queue))
            .spawn(move || {
                rt.block_on(async {
                    let mut timer = (!interval.is_zero()).then(|| tokio::time::interval(interval));
                    if let Some(timer) = timer.as_mut() {
                        timer.tick().await; // first tick fires immediately
                    } else {
                        log::info!("Polling timer for {} disabled (interval 0)", queue);
                    }

                    let mut manual_open = true;
                    loop {
                        if shutdown.load(Ordering::Acquire) {
                            break;
                        }

                        let fired = match (timer.as_mut(), manual_open) {
                            (Some(timer), true) => tokio::select! {
                                _ = timer.tick() => true,
                                received = trigger_rx.recv() => handle_trigger(received, queue, &mut manual_open),
                            },
                            (Some(timer), false) => {
                                timer.tick().await;
                                true
                            }
                            (None, true) => {
                                handle_trigger(trigger_rx.recv().await, queue, &mut manual_open)
                            }
                            (None, false) => break,
                        };

                        if shutdown.load(Ordering::Acquire) {
                            break;
                        }
                        if !fired {
                            continue;
                        }

                        let job = factory();
                        match scheduler.enqueue(queue, job) {
                            Ok(job_id) => log::debug!("Polling job {} enqueued on {}", job_id, queue),
                            Err(e) => log::warn!("Failed to enqueue polling job on {}: {}", queue, e),
                        }
                    }
                });
            })
    }

    /// Signals the loop to stop. It exits on its next wake-up.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}

fn handle_trigger(
    received: Result<(), broadcast::error::RecvError>,
    queue: QueueName,
    manual_open: &mut bool,
) -> bool {
    match received {
        Ok(()) => {
            log::info!("Manual {} trigger", queue);
            true
        }
        Err(broadcast::error::RecvError::Lagged(skipped)) => {
            log::debug!("Coalesced {} manual triggers", skipped);
            true
        }
        Err(broadcast::error::RecvError::Closed) => {
            *manual_open = false;
            false
        }
    }
}

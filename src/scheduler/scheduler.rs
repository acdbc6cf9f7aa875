use crate::domain::{Category, Notification, Notifier};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTask {
    pub category: Category,
    pub period: Duration,
}

impl ScheduledTask {
    pub fn new(category: Category, period: Duration) -> Self {
        ScheduledTask { category, period }
    }
}

#[derive(Debug, Default)]
struct SchedulerState {
    running: bool,
    timers: Vec<JoinHandle<()>>,
}

/// Fires every registered category once right away, then on its period. Firings are sent to the
/// engine, which runs them; the scheduler never waits for a routine.
#[derive(Debug)]
pub struct Scheduler {
    tx: UnboundedSender<Category>,
    notifier: Notifier,
    state: Mutex<SchedulerState>,
}

impl Scheduler {
    pub fn new(tx: UnboundedSender<Category>, notifier: Notifier) -> Self {
        Scheduler {
            tx,
            notifier,
            state: Mutex::new(SchedulerState::default()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().expect("scheduler lock poisoned").running
    }

    /// Starting a running scheduler keeps the current tasks, a different task list needs a `stop`
    /// first.
    #[instrument(skip_all)]
    pub fn start(&self, tasks: &[ScheduledTask]) {
        let mut state = self.state.lock().expect("scheduler lock poisoned");
        if state.running {
            debug!("🕗 Scheduler is already running, keeping {} task(s)", state.timers.len());
            self.notifier.emit(Notification::SchedulerState { running: true });
            return;
        }

        for task in tasks {
            debug!(category = %task.category, period = ?task.period, "🕗 Scheduling task...");
            if self.tx.send(task.category).is_err() {
                debug!("🕗 Engine is gone, not scheduling '{}'", task.category);
                continue;
            }

            let tx = self.tx.clone();
            let task = *task;
            let first = Instant::now() + task.period;
            state.timers.push(tokio::spawn(async move {
                let mut interval = interval_at(first, task.period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    interval.tick().await;
                    if tx.send(task.category).is_err() {
                        break;
                    }
                }
            }));
        }

        state.running = true;
        info!("🕗 Started scheduler with {} task(s)", state.timers.len());
        self.notifier.emit(Notification::SchedulerState { running: true });
    }

    /// Cancels pending firings. Routines that are already running are left alone.
    #[instrument(skip_all)]
    pub fn stop(&self) {
        let mut state = self.state.lock().expect("scheduler lock poisoned");
        for timer in state.timers.drain(..) {
            timer.abort();
        }

        if state.running {
            info!("🕗 Stopped scheduler");
        }
        state.running = false;
        self.notifier.emit(Notification::SchedulerState { running: false });
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Ok(state) = self.state.get_mut() {
            state.timers.iter().for_each(JoinHandle::abort);
        }
    }
}

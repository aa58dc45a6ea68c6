use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::error::{Result, SchedulerError};

/// Polling period of [`Scheduler::run`].
pub const TICK: Duration = Duration::from_millis(100);

/// Deferred action stored in a timer.
pub type Job = BoxFuture<'static, ()>;

struct Timer {
    due: Instant,
    seq: u64,
    job: Job,
}

#[derive(Default)]
struct TimerTable {
    timers: HashMap<String, Timer>,
    next_seq: u64,
    next_anonymous: u64,
}

impl TimerTable {
    fn anonymous_name(&mut self) -> String {
        loop {
            self.next_anonymous += 1;
            let name = format!("ID#{}", self.next_anonymous);
            if !self.timers.contains_key(&name) {
                return name;
            }
        }
    }
}

/// Named one-shot timer table.
///
/// Shared by reference between the bridge and the task running [`Scheduler::run`];
/// every method takes `&self`.
#[derive(Default)]
pub struct Scheduler {
    table: Mutex<TimerTable>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` after `delay_secs` seconds under `name`.
    ///
    /// An empty `name` gets a generated `ID#n` name. Returns the name used.
    pub fn schedule<F>(&self, name: &str, delay_secs: f64, job: F) -> Result<String>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = Duration::try_from_secs_f64(delay_secs)
            .map_err(|_| SchedulerError::InvalidDelay(delay_secs))?;
        self.schedule_at(name, Instant::now() + delay, job)
    }

    /// Run `job` at `due` under `name`.
    pub fn schedule_at<F>(&self, name: &str, due: Instant, job: F) -> Result<String>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut table = self.table.lock().expect("timer table poisoned");
        let name = if name.is_empty() {
            table.anonymous_name()
        } else if table.timers.contains_key(name) {
            return Err(SchedulerError::DuplicateTimer {
                name: name.to_string(),
            });
        } else {
            name.to_string()
        };
        let seq = table.next_seq;
        table.next_seq += 1;
        table.timers.insert(
            name.clone(),
            Timer {
                due,
                seq,
                job: job.boxed(),
            },
        );
        debug!(timer = %name, "timer scheduled");
        Ok(name)
    }

    /// Remove a pending timer.
    pub fn cancel(&self, name: &str) -> Result<()> {
        let mut table = self.table.lock().expect("timer table poisoned");
        match table.timers.remove(name) {
            Some(_) => {
                debug!(timer = %name, "timer cancelled");
                Ok(())
            }
            None => Err(SchedulerError::UnknownTimer {
                name: name.to_string(),
            }),
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.table
            .lock()
            .expect("timer table poisoned")
            .timers
            .contains_key(name)
    }

    /// Number of pending timers.
    pub fn len(&self) -> usize {
        self.table.lock().expect("timer table poisoned").timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deadline of a pending timer.
    pub fn due_at(&self, name: &str) -> Option<Instant> {
        self.table
            .lock()
            .expect("timer table poisoned")
            .timers
            .get(name)
            .map(|t| t.due)
    }

    /// Drop every pending timer without running it.
    pub fn clear(&self) -> usize {
        let mut table = self.table.lock().expect("timer table poisoned");
        let n = table.timers.len();
        table.timers.clear();
        n
    }

    /// Remove and return the jobs due at `now`, earliest first.
    ///
    /// Removal happens before any job runs, so a job may reschedule its own name.
    pub fn take_due(&self, now: Instant) -> Vec<(String, Job)> {
        let mut table = self.table.lock().expect("timer table poisoned");
        let mut due: Vec<String> = table
            .timers
            .iter()
            .filter(|(_, t)| t.due <= now)
            .map(|(name, _)| name.clone())
            .collect();
        due.sort_by_key(|name| {
            let t = &table.timers[name];
            (t.due, t.seq)
        });
        due.into_iter()
            .filter_map(|name| table.timers.remove(&name).map(|t| (name, t.job)))
            .collect()
    }

    /// Fire every timer due at `now`. Returns how many jobs ran.
    ///
    /// A panicking job is logged and does not affect the jobs after it.
    pub async fn run_due(&self, now: Instant) -> usize {
        let jobs = self.take_due(now);
        let count = jobs.len();
        for (name, job) in jobs {
            debug!(timer = %name, "timer fired");
            if AssertUnwindSafe(job).catch_unwind().await.is_err() {
                error!(timer = %name, "timer job panicked");
            }
        }
        count
    }

    /// Fire every timer due right now.
    pub async fn tick(&self) -> usize {
        self.run_due(Instant::now()).await
    }

    /// Main loop. Polls every [`TICK`] until `shutdown` broadcasts `true`,
    /// then drops any timers still pending.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!("scheduler started");
        let mut interval = tokio::time::interval(TICK);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        let dropped = self.clear();
        info!(dropped, "scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Job) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log2 = Arc::clone(&log);
        let make = move |tag: &'static str| -> Job {
            let log = Arc::clone(&log2);
            async move { log.lock().unwrap().push(tag) }.boxed()
        };
        (log, make)
    }

    #[tokio::test]
    async fn fires_once_after_deadline() {
        let sched = Scheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let start = Instant::now();
        sched
            .schedule_at("once", start + Duration::from_secs(5), async move {
                h.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(sched.run_due(start + Duration::from_secs(4)).await, 0);
        assert!(sched.exists("once"));
        assert_eq!(sched.run_due(start + Duration::from_secs(5)).await, 1);
        assert_eq!(sched.run_due(start + Duration::from_secs(60)).await, 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!sched.exists("once"));
    }

    #[tokio::test]
    async fn fires_in_deadline_then_insertion_order() {
        let sched = Scheduler::new();
        let (log, job) = recorder();
        let t0 = Instant::now();
        sched.schedule_at("late", t0 + Duration::from_secs(3), job("late")).unwrap();
        sched.schedule_at("b", t0 + Duration::from_secs(1), job("b")).unwrap();
        sched.schedule_at("a", t0 + Duration::from_secs(1), job("a")).unwrap();
        sched.schedule_at("first", t0, job("first")).unwrap();

        sched.run_due(t0 + Duration::from_secs(10)).await;
        assert_eq!(*log.lock().unwrap(), vec!["first", "b", "a", "late"]);
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let sched = Scheduler::new();
        sched.schedule("join-#rust", 3.0, async {}).unwrap();
        let err = sched.schedule("join-#rust", 1.0, async {}).unwrap_err();
        assert_eq!(
            err,
            SchedulerError::DuplicateTimer {
                name: "join-#rust".into()
            }
        );
        assert_eq!(sched.len(), 1);
    }

    #[test]
    fn unnamed_timers_get_unique_ids() {
        let sched = Scheduler::new();
        let a = sched.schedule("", 1.0, async {}).unwrap();
        let b = sched.schedule("", 1.0, async {}).unwrap();
        assert_eq!(a, "ID#1");
        assert_eq!(b, "ID#2");
    }

    #[test]
    fn generated_ids_skip_taken_names() {
        let sched = Scheduler::new();
        sched.schedule("ID#1", 1.0, async {}).unwrap();
        assert_eq!(sched.schedule("", 1.0, async {}).unwrap(), "ID#2");
    }

    #[test]
    fn invalid_delays_are_rejected() {
        let sched = Scheduler::new();
        assert!(matches!(
            sched.schedule("neg", -1.0, async {}),
            Err(SchedulerError::InvalidDelay(_))
        ));
        assert!(matches!(
            sched.schedule("nan", f64::NAN, async {}),
            Err(SchedulerError::InvalidDelay(_))
        ));
        assert!(matches!(
            sched.schedule("inf", f64::INFINITY, async {}),
            Err(SchedulerError::InvalidDelay(_))
        ));
        assert!(sched.is_empty());
    }

    #[tokio::test]
    async fn cancel_removes_pending_timer() {
        let sched = Scheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        sched
            .schedule("reconnect", 0.0, async move {
                h.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        sched.cancel("reconnect").unwrap();
        assert_eq!(
            sched.cancel("reconnect"),
            Err(SchedulerError::UnknownTimer {
                name: "reconnect".into()
            })
        );
        sched.run_due(Instant::now() + Duration::from_secs(1)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn job_can_reschedule_its_own_name() {
        let sched = Arc::new(Scheduler::new());
        let s = Arc::clone(&sched);
        sched
            .schedule("rotate", 0.0, async move {
                s.schedule("rotate", 300.0, async {}).unwrap();
            })
            .unwrap();
        assert_eq!(sched.run_due(Instant::now() + Duration::from_secs(1)).await, 1);
        assert!(sched.exists("rotate"));
    }

    #[tokio::test]
    async fn panicking_job_does_not_stop_later_jobs() {
        let sched = Scheduler::new();
        let (log, job) = recorder();
        let t0 = Instant::now();
        sched
            .schedule_at("boom", t0, async { panic!("job failure") })
            .unwrap();
        sched.schedule_at("after", t0 + Duration::from_millis(1), job("after")).unwrap();
        assert_eq!(sched.run_due(t0 + Duration::from_secs(1)).await, 2);
        assert_eq!(*log.lock().unwrap(), vec!["after"]);
    }

    #[tokio::test]
    async fn run_loop_stops_on_shutdown_and_clears() {
        let sched = Arc::new(Scheduler::new());
        sched.schedule("far", 3600.0, async {}).unwrap();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(Arc::clone(&sched).run(rx));
        tx.send(true).unwrap();
        handle.await.unwrap();
        assert!(sched.is_empty());
    }
}

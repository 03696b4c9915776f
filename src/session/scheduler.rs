// SessionScheduler - cooperative interval timer for guided sessions
//
// State machine:
//
//   Idle --start()--> Running <--pause()/resume()--> Paused
//     \                  \                             /
//      +------------------+------- stop() ------------+--> Stopped (terminal)
//
// The worker thread polls once per tick. While Running, a tick fires a
// session when `now - last_session_time >= interval`; the session runs on
// the worker thread itself, so scheduled sessions never overlap. The tick
// time becomes the new `last_session_time` once the session completes.
// Faults (errors or panics inside a session) are logged, leave
// `last_session_time` alone and never end the worker loop.
//
// `force_session()` runs a session on its own thread and may overlap a
// scheduled one; the microphone lock in SessionRunner serializes captures.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::BreathingConfig;
use crate::engine::backend::TimeSource;
use crate::error::{log_session_error, SessionError};

use super::record::{ChantSession, ChantStats};
use super::runner::SessionRunner;

/// Callback invoked with `(detected, duration)` after every completed session
pub type SessionCallback = Arc<dyn Fn(bool, f64) + Send + Sync>;

const SESSION_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerStatus {
    Idle,
    Running,
    Paused,
    Stopped,
}

/// What one poll of the timer did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Idle, paused, or interval not yet elapsed
    Waiting,
    Completed(ChantSession),
    Faulted(SessionError),
    Stopped,
}

struct SchedulerShared {
    status: Mutex<SchedulerStatus>,
    last_session: Mutex<Instant>,
    interval_secs: AtomicU64,
    sequence: AtomicU64,
    runner: SessionRunner,
    stats: RwLock<ChantStats>,
    callback: RwLock<Option<SessionCallback>>,
    sessions_tx: broadcast::Sender<ChantSession>,
    clock: Arc<dyn TimeSource>,
}

impl SchedulerShared {
    fn status(&self) -> SchedulerStatus {
        match self.status.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn status_guard(&self) -> Result<MutexGuard<'_, SchedulerStatus>, SessionError> {
        self.status.lock().map_err(|_| SessionError::LockPoisoned {
            component: "scheduler status".to_string(),
        })
    }

    fn last_session(&self) -> Instant {
        match self.last_session.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_last_session(&self, at: Instant) {
        match self.last_session.lock() {
            Ok(mut guard) => *guard = at,
            Err(poisoned) => *poisoned.into_inner() = at,
        }
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.load(Ordering::SeqCst))
    }

    fn tick(&self) -> TickOutcome {
        match self.status() {
            SchedulerStatus::Stopped => return TickOutcome::Stopped,
            SchedulerStatus::Idle | SchedulerStatus::Paused => return TickOutcome::Waiting,
            SchedulerStatus::Running => {}
        }

        let now = self.clock.now();
        if now.saturating_duration_since(self.last_session()) < self.interval() {
            return TickOutcome::Waiting;
        }

        match self.run_session(false) {
            Ok(session) => {
                self.set_last_session(now);
                TickOutcome::Completed(session)
            }
            Err(err) => TickOutcome::Faulted(err),
        }
    }

    /// Run one session with fault isolation and fold the result into stats.
    fn run_session(&self, forced: bool) -> Result<ChantSession, SessionError> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(sequence, forced, "Starting breathing & chant session");

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.runner.run(sequence, forced)))
            .unwrap_or_else(|payload| {
                Err(SessionError::Fault {
                    step: "session".to_string(),
                    reason: panic_message(payload.as_ref()),
                })
            });

        let session = match result {
            Ok(session) => session,
            Err(err) => {
                log_session_error(&err, "run_session");
                return Err(err);
            }
        };

        match self.stats.write() {
            Ok(mut stats) => stats.record(session.detected, session.duration),
            Err(poisoned) => poisoned
                .into_inner()
                .record(session.detected, session.duration),
        }
        tracing::info!(
            sequence,
            detected = session.detected,
            duration = session.duration,
            elapsed_secs = session.elapsed().as_secs_f64(),
            "Session completed"
        );

        self.notify(&session);
        // no subscribers is fine
        let _ = self.sessions_tx.send(session.clone());
        Ok(session)
    }

    fn notify(&self, session: &ChantSession) {
        // cloned out so the callback may replace itself
        let callback = match self.callback.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        if let Some(callback) = callback {
            let (detected, duration) = (session.detected, session.duration);
            if let Err(payload) =
                panic::catch_unwind(AssertUnwindSafe(|| callback(detected, duration)))
            {
                log::error!(
                    "[SessionScheduler] Session callback panicked: {}",
                    panic_message(payload.as_ref())
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub struct SessionScheduler {
    shared: Arc<SchedulerShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    poll_interval: Duration,
    min_interval_secs: u64,
    max_interval_secs: u64,
}

impl SessionScheduler {
    pub fn new(runner: SessionRunner, config: &BreathingConfig, clock: Arc<dyn TimeSource>) -> Self {
        let (sessions_tx, _) = broadcast::channel(SESSION_CHANNEL_CAPACITY);
        let now = clock.now();
        Self {
            shared: Arc::new(SchedulerShared {
                status: Mutex::new(SchedulerStatus::Idle),
                last_session: Mutex::new(now),
                interval_secs: AtomicU64::new(config.default_interval_secs),
                sequence: AtomicU64::new(0),
                runner,
                stats: RwLock::new(ChantStats::default()),
                callback: RwLock::new(None),
                sessions_tx,
                clock,
            }),
            worker: Mutex::new(None),
            poll_interval: config.poll_interval(),
            min_interval_secs: config.min_interval_secs,
            max_interval_secs: config.max_interval_secs,
        }
    }

    /// Idle -> Running without a worker thread; the caller drives the timer
    /// through [`SessionScheduler::poll`]. The interval counts from now.
    ///
    /// A due session runs inside `poll`, so this mode is limited to simulated
    /// clocks where session waits take no real time.
    ///
    /// # Errors
    /// * `SessionError::RealTimeClock` - the time source is a wall clock
    /// * otherwise the same as [`SessionScheduler::start`]
    pub fn start_stepped(&self) -> Result<(), SessionError> {
        if !self.shared.clock.is_simulated() {
            return Err(SessionError::RealTimeClock);
        }
        self.enter_running()
    }

    fn enter_running(&self) -> Result<(), SessionError> {
        let mut status = self.shared.status_guard()?;
        match *status {
            SchedulerStatus::Idle => {
                self.shared.set_last_session(self.shared.clock.now());
                *status = SchedulerStatus::Running;
                Ok(())
            }
            SchedulerStatus::Running | SchedulerStatus::Paused => Err(SessionError::AlreadyStarted),
            SchedulerStatus::Stopped => Err(SessionError::Stopped),
        }
    }

    /// Start the worker thread.
    ///
    /// # Errors
    /// * `SessionError::AlreadyStarted` - running or paused already
    /// * `SessionError::Stopped` - a stopped scheduler cannot restart
    pub fn start(&self) -> Result<(), SessionError> {
        self.enter_running()?;

        let shared = Arc::clone(&self.shared);
        let poll = self.poll_interval;
        let handle = thread::Builder::new()
            .name("breathing-scheduler".to_string())
            .spawn(move || {
                tracing::info!(interval_secs = shared.interval().as_secs(), "Breathing scheduler started");
                loop {
                    match shared.tick() {
                        TickOutcome::Stopped => break,
                        TickOutcome::Faulted(err) => {
                            tracing::warn!(error = %err, "Session faulted; will retry next interval");
                        }
                        TickOutcome::Completed(_) | TickOutcome::Waiting => {}
                    }
                    shared.clock.sleep(poll);
                }
                tracing::info!("Breathing scheduler stopped");
            })
            .map_err(|err| SessionError::Fault {
                step: "spawn".to_string(),
                reason: err.to_string(),
            });

        match handle {
            Ok(handle) => {
                match self.worker.lock() {
                    Ok(mut guard) => *guard = Some(handle),
                    Err(poisoned) => *poisoned.into_inner() = Some(handle),
                }
                log::info!("[SessionScheduler] Started");
                Ok(())
            }
            Err(err) => {
                self.stop();
                log_session_error(&err, "start");
                Err(err)
            }
        }
    }

    /// Enter the terminal state. An in-flight session still completes.
    pub fn stop(&self) {
        let previous = match self.shared.status.lock() {
            Ok(mut guard) => std::mem::replace(&mut *guard, SchedulerStatus::Stopped),
            Err(poisoned) => {
                std::mem::replace(&mut *poisoned.into_inner(), SchedulerStatus::Stopped)
            }
        };
        if previous != SchedulerStatus::Stopped {
            log::info!("[SessionScheduler] Stopped");
        }
    }

    /// Stop and wait for the worker thread (and any in-flight session).
    pub fn shutdown(&self) {
        self.stop();
        let handle = match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("[SessionScheduler] Worker thread panicked");
            }
        }
    }

    /// # Errors
    /// * `SessionError::NotRunning` - idle or stopped
    pub fn pause(&self) -> Result<(), SessionError> {
        let mut status = self.shared.status_guard()?;
        match *status {
            SchedulerStatus::Running | SchedulerStatus::Paused => {
                *status = SchedulerStatus::Paused;
                log::info!("[SessionScheduler] Paused");
                Ok(())
            }
            _ => Err(SessionError::NotRunning),
        }
    }

    /// # Errors
    /// * `SessionError::NotRunning` - idle or stopped
    pub fn resume(&self) -> Result<(), SessionError> {
        let mut status = self.shared.status_guard()?;
        match *status {
            SchedulerStatus::Running | SchedulerStatus::Paused => {
                *status = SchedulerStatus::Running;
                log::info!("[SessionScheduler] Resumed");
                Ok(())
            }
            _ => Err(SessionError::NotRunning),
        }
    }

    /// Run one session now on a separate thread, outside the interval timer.
    ///
    /// `last_session_time` is left untouched.
    ///
    /// # Errors
    /// * `SessionError::NotRunning` - not running, or paused
    pub fn force_session(&self) -> Result<JoinHandle<()>, SessionError> {
        if self.shared.status() != SchedulerStatus::Running {
            return Err(SessionError::NotRunning);
        }
        let shared = Arc::clone(&self.shared);
        thread::Builder::new()
            .name("forced-session".to_string())
            .spawn(move || {
                if let Err(err) = shared.run_session(true) {
                    tracing::warn!(error = %err, "Forced session faulted");
                }
            })
            .map_err(|err| SessionError::Fault {
                step: "spawn".to_string(),
                reason: err.to_string(),
            })
    }

    /// # Errors
    /// * `SessionError::InvalidInterval` - outside the configured bounds
    pub fn set_interval(&self, secs: u64) -> Result<(), SessionError> {
        if secs < self.min_interval_secs || secs > self.max_interval_secs {
            return Err(SessionError::InvalidInterval {
                secs,
                min: self.min_interval_secs,
                max: self.max_interval_secs,
            });
        }
        self.shared.interval_secs.store(secs, Ordering::SeqCst);
        log::info!("[SessionScheduler] Interval set to {}s", secs);
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        self.shared.interval()
    }

    /// Running or paused (i.e. started and not stopped)
    pub fn is_running(&self) -> bool {
        matches!(
            self.shared.status(),
            SchedulerStatus::Running | SchedulerStatus::Paused
        )
    }

    pub fn is_paused(&self) -> bool {
        self.shared.status() == SchedulerStatus::Paused
    }

    pub fn status(&self) -> SchedulerStatus {
        self.shared.status()
    }

    /// `None` unless running and not paused.
    pub fn time_until_next_session(&self) -> Option<Duration> {
        if self.shared.status() != SchedulerStatus::Running {
            return None;
        }
        let elapsed = self
            .shared
            .clock
            .now()
            .saturating_duration_since(self.shared.last_session());
        Some(self.shared.interval().saturating_sub(elapsed))
    }

    pub fn set_session_callback<F>(&self, callback: F)
    where
        F: Fn(bool, f64) + Send + Sync + 'static,
    {
        let callback: SessionCallback = Arc::new(callback);
        match self.shared.callback.write() {
            Ok(mut guard) => *guard = Some(callback),
            Err(poisoned) => *poisoned.into_inner() = Some(callback),
        }
    }

    /// Receive every completed session record.
    pub fn subscribe(&self) -> broadcast::Receiver<ChantSession> {
        self.shared.sessions_tx.subscribe()
    }

    /// Snapshot of the aggregate chant statistics.
    pub fn stats(&self) -> ChantStats {
        match self.shared.stats.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn reset_stats(&self) {
        match self.shared.stats.write() {
            Ok(mut guard) => guard.reset(),
            Err(poisoned) => poisoned.into_inner().reset(),
        }
        self.shared.runner.reset_detector_stats();
    }

    /// Run one timer tick on the calling thread. A due session runs inline.
    pub fn poll(&self) -> TickOutcome {
        self.shared.tick()
    }
}

impl Drop for SessionScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

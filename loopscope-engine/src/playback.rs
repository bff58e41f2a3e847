//! ## loopscope-engine::playback
//! **Playback Scheduler**
//!
//! Drives a [`StepDispatcher`] on a timer while its status is `running`. One
//! tokio task ticks at `base_interval / speed`; the interval is read again
//! before every sleep, so a speed change only affects the next cadence.
//!
//! Any command that leaves the engine outside `running` bumps an epoch and
//! aborts the ticker; an ignored command leaves a live ticker alone. A ticker
//! that wakes up with a stale epoch exits without touching the engine.

use std::sync::Arc;

use opentelemetry::KeyValue;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, Instrument};

use loopscope_core::prelude::{RuntimeState, Status};
use loopscope_telemetry::EventLogger;

use crate::dispatcher::{Command, Outcome, StepDispatcher};
use crate::error::EngineError;

struct Shared {
    dispatcher: StepDispatcher,
    epoch: u64,
}

pub struct PlaybackScheduler {
    shared: Arc<Mutex<Shared>>,
    ticker: Option<JoinHandle<()>>,
}

impl PlaybackScheduler {
    pub fn new(dispatcher: StepDispatcher) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                dispatcher,
                epoch: 0,
            })),
            ticker: None,
        }
    }

    /// Routes a command to the dispatcher, then starts or cancels the ticker
    /// so that one is alive exactly while the status is `running`. Must be
    /// called inside a tokio runtime when the command may start playback.
    pub fn dispatch(&mut self, command: Command) -> Outcome {
        if matches!(command, Command::Play) {
            return self.play();
        }
        let outcome = self.shared.lock().dispatcher.dispatch(command);
        self.sync_ticker();
        outcome
    }

    /// Starts playback. A dispatcher that is already running but has no
    /// ticker (handed over mid-play) gets one.
    pub fn play(&mut self) -> Outcome {
        let outcome = self.shared.lock().dispatcher.play();
        if outcome == Outcome::Applied {
            self.spawn_ticker();
        } else {
            self.sync_ticker();
        }
        outcome
    }

    pub fn pause(&mut self) -> Outcome {
        let outcome = self.shared.lock().dispatcher.pause();
        self.sync_ticker();
        outcome
    }

    pub fn set_speed(&self, speed: f64) -> Outcome {
        self.shared.lock().dispatcher.set_speed(speed)
    }

    /// Cheap structural copy of the current state.
    pub fn snapshot(&self) -> RuntimeState {
        self.shared.lock().dispatcher.state().clone()
    }

    pub fn with_dispatcher<R>(&self, f: impl FnOnce(&StepDispatcher) -> R) -> R {
        f(&self.shared.lock().dispatcher)
    }

    pub fn status(&self) -> Status {
        self.shared.lock().dispatcher.status()
    }

    /// Whether a ticker task is still alive.
    pub fn is_ticking(&self) -> bool {
        self.ticker
            .as_ref()
            .is_some_and(|ticker| !ticker.is_finished())
    }

    /// Waits for the ticker to stop on its own (end of trace or external pause).
    pub async fn join(&mut self) -> Result<(), EngineError> {
        match self.ticker.take() {
            Some(ticker) => match ticker.await {
                Err(err) if !err.is_cancelled() => Err(err.into()),
                _ => Ok(()),
            },
            None => Ok(()),
        }
    }

    /// Cancels playback and returns the dispatcher.
    pub async fn shutdown(mut self) -> Result<StepDispatcher, EngineError> {
        let ticker = self.ticker.take();
        self.cancel();
        self.shared.lock().dispatcher.pause();
        if let Some(ticker) = ticker {
            ticker.abort();
            if let Err(err) = ticker.await {
                if !err.is_cancelled() {
                    return Err(err.into());
                }
            }
        }
        EventLogger::log_event("playback_shutdown", Vec::new());
        let shared = Arc::clone(&self.shared);
        drop(self);
        match Arc::try_unwrap(shared) {
            Ok(mutex) => Ok(mutex.into_inner().dispatcher),
            Err(_) => Err(EngineError::Playback(
                "playback state still shared after shutdown".into(),
            )),
        }
    }

    fn sync_ticker(&mut self) {
        if self.status() != Status::Running {
            self.cancel();
        } else if !self.is_ticking() {
            self.spawn_ticker();
        }
    }

    fn spawn_ticker(&mut self) {
        self.cancel();
        let epoch = self.shared.lock().epoch;
        let shared = Arc::clone(&self.shared);
        EventLogger::log_event("playback_started", vec![KeyValue::new("epoch", epoch as i64)]);
        self.ticker = Some(tokio::spawn(
            run_ticker(shared, epoch).instrument(tracing::info_span!("playback_ticker", epoch)),
        ));
    }

    /// Invalidates the current ticker. Exact: after this returns no stale
    /// tick can advance the engine.
    fn cancel(&mut self) {
        self.shared.lock().epoch += 1;
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
            debug!("playback ticker cancelled");
        }
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

async fn run_ticker(shared: Arc<Mutex<Shared>>, epoch: u64) {
    loop {
        let Some(interval) = next_interval(&shared, epoch) else {
            return;
        };
        sleep(interval).await;
        if !tick(&shared, epoch) {
            return;
        }
    }
}

fn next_interval(shared: &Mutex<Shared>, epoch: u64) -> Option<std::time::Duration> {
    let guard = shared.lock();
    if guard.epoch != epoch || guard.dispatcher.status() != Status::Running {
        return None;
    }
    Some(guard.dispatcher.interval())
}

/// Advances once. Returns whether the ticker should keep going.
fn tick(shared: &Mutex<Shared>, epoch: u64) -> bool {
    let mut guard = shared.lock();
    if guard.epoch != epoch || guard.dispatcher.status() != Status::Running {
        return false;
    }
    match guard.dispatcher.advance() {
        Outcome::Applied => true,
        outcome => {
            if guard.dispatcher.status() == Status::Running {
                guard.dispatcher.pause();
            }
            info!(?outcome, step = guard.dispatcher.cursor(), "playback stopped");
            EventLogger::log_event(
                "playback_stopped",
                vec![KeyValue::new("step", guard.dispatcher.cursor() as i64)],
            );
            false
        }
    }
}

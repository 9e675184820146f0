//! Background polling agent.
//!
//! Lifecycle: `Stopped -> start() -> Running -> stop() -> Stopping -> Stopped`.
//!
//! Each iteration fetches a reading, saves it when there is one, then sleeps
//! for the configured interval. `stop()` is cooperative: an in-flight fetch
//! or save runs to completion and a pending sleep is cut short. No new
//! iteration begins afterwards, and no new loop starts until the old one ends.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::{runtime::Handle, sync::watch, task::JoinHandle};
use tracing::{Instrument, error, info, info_span, warn};

use crate::{
    AgentConfig,
    error::AgentError,
    source::{TemperatureSource, source_from_config},
    store::{ReadingSink, sink_from_config},
};

pub struct PollingAgent {
    source: Arc<dyn TemperatureSource>,
    sink: Arc<dyn ReadingSink>,
    interval: Duration,
    run: Mutex<Option<Run>>,
}

/// One spawned loop. Kept until the task has ended, even after a stop request.
struct Run {
    stop: watch::Sender<bool>,
    done: watch::Receiver<bool>,
    handle: JoinHandle<Result<(), AgentError>>,
}

impl Run {
    fn is_live(&self) -> bool {
        !self.handle.is_finished()
    }

    fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }
}

impl PollingAgent {
    pub fn new(
        source: Arc<dyn TemperatureSource>,
        sink: Arc<dyn ReadingSink>,
        interval: Duration,
    ) -> Self {
        Self { source, sink, interval, run: Mutex::new(None) }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(source_from_config(config), sink_from_config(config), config.poll_interval())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a loop task is alive, including one that was asked to stop
    /// and is finishing its last iteration.
    pub fn is_running(&self) -> bool {
        self.lock_run().as_ref().is_some_and(Run::is_live)
    }

    /// Spawn the background loop on the current Tokio runtime.
    ///
    /// Returns `AgentError::AlreadyRunning` instead of spawning a second loop,
    /// and `AgentError::Stopping` while a stopped loop is still mid-iteration.
    /// A loop that has ended (stopped or failed) may be started again.
    pub fn start(&self) -> Result<(), AgentError> {
        let mut run = self.lock_run();

        if let Some(current) = run.as_ref().filter(|r| r.is_live()) {
            return Err(if current.stop_requested() {
                AgentError::Stopping
            } else {
                AgentError::AlreadyRunning
            });
        }

        let runtime = Handle::try_current().map_err(|e| AgentError::Runtime(e.to_string()))?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(false);
        let span = info_span!("agent", interval_secs = self.interval.as_secs());

        let task = runtime.spawn(
            run_loop(self.source.clone(), self.sink.clone(), self.interval, stop_rx)
                .instrument(span.clone()),
        );
        let handle = runtime.spawn(supervise(task, done_tx).instrument(span));

        *run = Some(Run { stop: stop_tx, done: done_rx, handle });
        Ok(())
    }

    /// Ask the loop to stop. Returns whether this call stopped a running loop.
    ///
    /// The loop stays registered until its task ends, so `start()` cannot
    /// overlap it with a second loop.
    pub fn stop(&self) -> bool {
        let run = self.lock_run();

        match run.as_ref() {
            Some(run) if run.is_live() => !run.stop.send_replace(true),
            _ => false,
        }
    }

    /// Resolve once the current loop task has ended. Returns at once when
    /// nothing was started.
    pub async fn finished(&self) {
        let done = self.lock_run().as_ref().map(|run| run.done.clone());
        let Some(mut done) = done else {
            return;
        };

        loop {
            let ended = *done.borrow_and_update();
            if ended || done.changed().await.is_err() {
                return;
            }
        }
    }

    /// Stop the loop and wait for it to finish, returning how it ended.
    pub async fn shutdown(&self) -> Result<(), AgentError> {
        self.stop();
        self.finished().await;

        let run = self.lock_run().take();
        let Some(run) = run else {
            return Ok(());
        };

        match run.handle.await {
            Ok(result) => result,
            Err(err) => {
                error!(error = %err, "Polling agent supervisor terminated abnormally");
                Err(AgentError::Join(err.to_string()))
            }
        }
    }

    /// Run a single iteration in the caller's task.
    pub async fn poll_once(&self) -> Result<Option<f64>, AgentError> {
        poll_once(self.source.as_ref(), self.sink.as_ref()).await
    }

    fn lock_run(&self) -> MutexGuard<'_, Option<Run>> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for PollingAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingAgent")
            .field("source", &self.source)
            .field("sink", &self.sink)
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Wait for the loop task, log a panic when it had one, then signal `done`.
async fn supervise(
    task: JoinHandle<Result<(), AgentError>>,
    done: watch::Sender<bool>,
) -> Result<(), AgentError> {
    let result = match task.await {
        Ok(result) => result,
        Err(err) => {
            error!(error = %err, "Polling agent task terminated abnormally");
            Err(AgentError::Join(err.to_string()))
        }
    };

    done.send_replace(true);
    result
}

/// Fetch one reading and save it if there is one.
///
/// A missing reading is expected and comes back as `Ok(None)`. A non-finite
/// reading is not, and is returned as an error.
pub async fn poll_once(
    source: &dyn TemperatureSource,
    sink: &dyn ReadingSink,
) -> Result<Option<f64>, AgentError> {
    match source.fetch().await {
        Some(temperature) if !temperature.is_finite() => {
            Err(AgentError::InvalidReading(temperature))
        }
        Some(temperature) => {
            info!(temperature, "Water temperature fetched");
            sink.save(temperature).await;
            Ok(Some(temperature))
        }
        None => {
            warn!("Failed to fetch water temperature");
            Ok(None)
        }
    }
}

async fn run_loop(
    source: Arc<dyn TemperatureSource>,
    sink: Arc<dyn ReadingSink>,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) -> Result<(), AgentError> {
    info!("Polling agent started");

    while !stop_requested(&stop) {
        if let Err(err) = poll_once(source.as_ref(), sink.as_ref()).await {
            error!(error = %err, "Polling agent stopped on unexpected error");
            return Err(err);
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = stop.changed() => {}
        }
    }

    info!("Polling agent stopped");
    Ok(())
}

/// Stopped explicitly, or the agent holding the sender is gone.
fn stop_requested(stop: &watch::Receiver<bool>) -> bool {
    *stop.borrow() || stop.has_changed().is_err()
}

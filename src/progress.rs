//! Progress reporting: one-shot checkpoint events and the heartbeat thread
//! that keeps a blocking stage visibly alive.
//!
//! The underlying models expose no progress callbacks, so long stages get a
//! companion thread that emits a synthetic, asymptotically-rising percent at
//! a fixed tick interval. The curve `1 - e^(-elapsed/expected)` reaches ~63%
//! of the stage range at the expected duration and ~86% at twice it; a 0.95
//! scale factor keeps every tick strictly below the stage ceiling so the
//! host never sees a stage "complete" before it has.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, bounded};
use serde_json::Value;

use crate::defaults;
use crate::error::Result;
use crate::ipc::channel::MessageWriter;
use crate::ipc::protocol::{Response, Stage};

/// Emits `progress` events for one request id. Stateless; every call
/// produces exactly one message on the channel.
#[derive(Clone)]
pub struct ProgressReporter {
    writer: MessageWriter,
    id: Option<Value>,
}

impl ProgressReporter {
    pub fn new(writer: MessageWriter, id: Option<Value>) -> Self {
        ProgressReporter { writer, id }
    }

    /// Emit one progress event. `message` defaults to the stage name.
    pub fn report(&self, percent: f64, stage: Stage, message: Option<&str>) -> Result<()> {
        self.writer.send(&Response::Progress {
            id: self.id.clone(),
            percent,
            stage,
            message: message.unwrap_or(stage.name()).to_string(),
        })
    }

    /// Like [`report`](Self::report), but a failed write is logged instead
    /// of propagated. Used from contexts that must not abort the stage they
    /// observe (heartbeat thread, diarizer callback).
    pub fn report_lossy(&self, percent: f64, stage: Stage, message: Option<&str>) {
        if let Err(e) = self.report(percent, stage, message) {
            eprintln!("scriven: failed to emit progress event: {e}");
        }
    }
}

/// Parameters for one heartbeat run.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Percent at elapsed = 0.
    pub start_percent: f64,
    /// Ceiling the curve approaches but never reaches.
    pub end_percent: f64,
    pub stage: Stage,
    /// Base text; "({elapsed}s)" is appended on each tick.
    pub message: String,
    pub tick_interval: Duration,
    /// Calibration estimate for the stage's wall time. Not a timeout.
    pub expected_duration: Duration,
}

impl HeartbeatConfig {
    pub fn new(
        start_percent: f64,
        end_percent: f64,
        stage: Stage,
        message: impl Into<String>,
        expected_duration: Duration,
    ) -> Self {
        HeartbeatConfig {
            start_percent,
            end_percent,
            stage,
            message: message.into(),
            tick_interval: Duration::from_secs(defaults::HEARTBEAT_TICK_SECS),
            expected_duration,
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Percent at `elapsed` seconds into the stage.
    pub fn percent_at(&self, elapsed: Duration) -> f64 {
        let fraction = 1.0 - (-elapsed.as_secs_f64() / self.expected_duration.as_secs_f64()).exp();
        self.start_percent
            + (self.end_percent - self.start_percent) * defaults::HEARTBEAT_CEILING * fraction
    }
}

/// RAII handle for a running heartbeat. Dropping it stops the thread and
/// waits (bounded) for it to finish, so no tick can be emitted after a
/// stage's final checkpoint.
pub struct HeartbeatGuard {
    // Dropping the sender disconnects the channel, which wakes the thread.
    stop_tx: Option<crossbeam_channel::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl HeartbeatGuard {
    /// Spawn the heartbeat thread. The first tick is emitted one interval
    /// after the start, not immediately; checkpoint events cover the start.
    pub fn start(reporter: ProgressReporter, config: HeartbeatConfig) -> Self {
        let (stop_tx, stop_rx) = bounded::<()>(0);

        let thread = thread::spawn(move || {
            let t0 = Instant::now();
            loop {
                match stop_rx.recv_timeout(config.tick_interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let elapsed = t0.elapsed();
                        let message =
                            format!("{} ({}s)", config.message, elapsed.as_secs());
                        reporter.report_lossy(
                            config.percent_at(elapsed),
                            config.stage,
                            Some(&message),
                        );
                    }
                    // Stop requested or guard dropped
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        HeartbeatGuard {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        }
    }

    /// Stop the thread and wait up to one second for it to exit. After the
    /// deadline the thread is detached; it can no longer emit because the
    /// disconnect is observed before the next tick.
    fn stop(&mut self) {
        drop(self.stop_tx.take());

        let Some(handle) = self.thread.take() else {
            return;
        };

        let deadline = Instant::now() + Duration::from_secs(1);
        let poll_interval = Duration::from_millis(10);
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                eprintln!("scriven: heartbeat thread did not stop within 1s, detaching");
                return;
            }
            thread::sleep(poll_interval);
        }
        if handle.join().is_err() {
            eprintln!("scriven: heartbeat thread panicked");
        }
    }
}

impl Drop for HeartbeatGuard {
    fn drop(&mut self) {
        self.stop();
    }
}

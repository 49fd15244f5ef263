use log::{log_enabled, Level};
use std::time::Instant;

use crate::dynamics::penalty::FrictionRegime;
use crate::utils::allocator::BodyHandle;

/// Simple scoped timer for profiling critical sections.
pub struct ScopedTimer<'a> {
    label: &'a str,
    start: Instant,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(label: &'a str) -> Self {
        if log_enabled!(Level::Trace) {
            log::trace!("start {label}");
        }
        Self {
            label,
            start: Instant::now(),
        }
    }
}

impl<'a> Drop for ScopedTimer<'a> {
    fn drop(&mut self) {
        if log_enabled!(Level::Trace) {
            let elapsed = self.start.elapsed();
            log::trace!("end {} ({} µs)", self.label, elapsed.as_micros());
        }
    }
}

/// Structured events emitted while stepping.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    StepBegin {
        time: f64,
        bodies: usize,
    },
    Contact {
        index: usize,
        body_a: BodyHandle,
        body_b: BodyHandle,
        depth: f64,
        normal_force: f64,
        friction_force: f64,
        regime: FrictionRegime,
    },
    SolverFinished {
        contacts: usize,
        iterations: u32,
        converged: bool,
        max_delta: f64,
    },
    StepEnd {
        time: f64,
    },
}

/// Injectable receiver for per-step diagnostics.
pub trait TraceSink: Send {
    fn record(&mut self, event: &TraceEvent);
}

/// Forwards trace events to the `log` facade under the `penalty_dynamics::trace` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl TraceSink for LogSink {
    fn record(&mut self, event: &TraceEvent) {
        match event {
            TraceEvent::Contact { .. } => {
                log::trace!(target: "penalty_dynamics::trace", "{event:?}")
            }
            _ => log::debug!(target: "penalty_dynamics::trace", "{event:?}"),
        }
    }
}

/// Collects every event in memory; handy for tests and offline inspection.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub events: Vec<TraceEvent>,
}

impl TraceSink for MemorySink {
    fn record(&mut self, event: &TraceEvent) {
        self.events.push(event.clone());
    }
}

impl<S: TraceSink + ?Sized> TraceSink for std::sync::Arc<parking_lot::Mutex<S>> {
    fn record(&mut self, event: &TraceEvent) {
        self.lock().record(event);
    }
}

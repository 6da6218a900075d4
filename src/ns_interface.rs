// Shared simulator types and the run observation seam

// ============================================================================
// Core Type Aliases
// ============================================================================

/// Simulated time in whole seconds from scenario start
pub type NsTime = u64;

/// Identifier of a simulated node within a topology
pub type NodeId = String;

/// Identifier of a geographic region
pub type RegionId = String;

/// Identifier of a connection within a topology
pub type ConnectionId = String;

/// Identifier of a scripted fault event
pub type EventId = String;

/// Seed for the injectable random source
pub type SimSeed = [u8; 32];

/// Target sentinel addressing the whole topology instead of a node or region
pub const GLOBAL_TARGET: &str = "global";

/// Current wall-clock time in milliseconds since the Unix epoch
///
/// Used only for audit timestamps on records (created/updated/last-seen).
/// Simulation correctness never depends on it.
pub fn wall_clock_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_millis() as u64,
        Err(_) => 0, // clock before epoch
    }
}

// ============================================================================
// Run Event Observation
// ============================================================================

/// Events emitted by the simulation engine for debugging and analysis
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// A fault effect was applied to the working topology
    FaultTriggered {
        event_id: EventId,
        kind: &'static str,
        target: String,
    },
    /// A fault effect was reverted after its duration elapsed
    FaultCompleted {
        event_id: EventId,
        kind: &'static str,
    },
    /// A fault target could not be resolved; recorded, not applied
    FaultFailed {
        event_id: EventId,
        target: String,
    },
    /// A metric snapshot was appended to the result time series
    MetricsSampled {
        sample_index: usize,
    },
}

/// Trait for consuming events from a simulation run
pub trait EventSink {
    fn log(&mut self, time: NsTime, event: RunEvent);
}

/// No-op event sink for batch runs (zero overhead)
pub struct NoOpSink;

impl EventSink for NoOpSink {
    #[inline(always)]
    fn log(&mut self, _time: NsTime, _event: RunEvent) {
        // Intentionally empty - compiler should optimize this away
    }
}

/// Sink that forwards run events to the `log` crate at debug level
pub struct LogSink;

impl EventSink for LogSink {
    fn log(&mut self, time: NsTime, event: RunEvent) {
        match event {
            RunEvent::FaultTriggered { event_id, kind, target } => {
                log::debug!("t={}: triggered {} '{}' on {}", time, kind, event_id, target);
            }
            RunEvent::FaultCompleted { event_id, kind } => {
                log::debug!("t={}: completed {} '{}'", time, kind, event_id);
            }
            RunEvent::FaultFailed { event_id, target } => {
                log::warn!("t={}: fault '{}' failed, unknown target {}", time, event_id, target);
            }
            RunEvent::MetricsSampled { sample_index } => {
                log::debug!("t={}: sample #{}", time, sample_index);
            }
        }
    }
}

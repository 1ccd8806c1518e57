//! Metrics emitted through the `metrics` facade.
//!
//! No exporter is installed here: whichever recorder the embedding process
//! registers receives the events, otherwise they are no-ops.

pub mod events;

/// Macro for emitting metric events (Vector-style pattern).
///
/// Calls `InternalEvent::emit()` on the given event, which records the
/// corresponding metric.
///
/// ```ignore
/// use sleet_core::metrics::events::PartUploaded;
///
/// emit!(PartUploaded { bytes: 1024, target: "users".to_string() });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}

pub use emit;

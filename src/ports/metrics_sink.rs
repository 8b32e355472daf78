/// GaugeSink is the port through which backend liveness is published.
///
/// The aggregator and the startup path only ever write 0/1 values, keyed by a
/// scope (backend label or `general`) and a destination (the redacted target).
pub trait GaugeSink: Send + Sync + 'static {
    fn set_service_up(&self, scope: &str, destination: &str, up: bool);
}

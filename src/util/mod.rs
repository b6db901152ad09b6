//! Small ambient helpers shared across modules: telemetry bootstrap and
//! graceful shutdown signaling.

pub mod sig_down;
pub mod telemetry;

pub use sig_down::SigDown;
pub use telemetry::Telemetry;

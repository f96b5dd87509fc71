//! Shared service helpers: telemetry wiring and the notifier/rating seams.

pub mod notifier;
pub mod ratings;
pub mod telemetry;

pub use notifier::*;
pub use ratings::*;
pub use telemetry::*;

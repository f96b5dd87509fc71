//! Domain-level building blocks shared by the API, payments, and storage
//! crates: the promotion/verification/subscription models, the plan catalog,
//! the payment-reference scheme, configuration loading, and the storage and
//! notifier seams.

pub mod config;
pub mod model;
pub mod plan;
pub mod services;
pub mod storage;

pub use model::*;
pub use plan::*;
pub use storage::*;

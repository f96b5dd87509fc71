//! Payment-gateway client, the reconciliation service shared by the callback
//! and webhook transports, and the periodic expiry sweeper. The sweeper is
//! also available as its own binary (`alebaz-sweeper`) for deployments that
//! prefer a separate process.

pub mod gateway;
pub mod reconcile;
pub mod sweeper;

pub use gateway::{
    GatewayError, HttpPaymentGateway, InitializeRequest, InitializedTransaction, PaymentGateway,
    VerifyOutcome,
};
pub use reconcile::{reconcile, ReconcileError, ReconcileOutcome};
pub use sweeper::{run_sweeper, sweep_once, SweepReport, SweeperError};

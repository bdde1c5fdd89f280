//! Reconciliation core
//!
//! Compares a [`TableSpec`](crate::model::TableSpec) with the table the
//! service reports and decides the next corrective action.
//!
//! # Module Structure
//!
//! - [`status`] - Lifecycle status classification (stable / transient / terminal)
//! - [`delta`] - Added / updated / removed secondary indexes
//! - [`scalar`] - Drift in billing mode, streams, encryption, throughput
//! - [`planner`] - Picks the single mutation for a pass
//! - [`driver`] - Runs a pass against a [`TableApi`]
//!
//! # Example
//!
//! ```ignore
//! use tablesync::reconcile::{Reconciler, ReconcileSettings};
//! use tokio_util::sync::CancellationToken;
//!
//! async fn example(api: impl tablesync::reconcile::TableApi, spec: tablesync::model::TableSpec) {
//!     let reconciler = Reconciler::new(api, ReconcileSettings::default());
//!     let signal = reconciler.reconcile_once(&spec, &CancellationToken::new()).await;
//!     println!("{signal}");
//! }
//! ```

pub mod delta;
pub mod driver;
pub mod error;
pub mod planner;
pub mod scalar;
pub mod signal;
pub mod status;

pub use delta::{compute_delta, indexes_equal, sets_equal, IndexDelta, IndexUpdate};
pub use driver::{decide, PassDecision, ReconcileSettings, Reconciler, TableApi};
pub use error::{ReconcileError, RemoteError};
pub use planner::{plan, MutationIntent};
pub use scalar::{structural_equal, ScalarDelta, ScalarUpdate};
pub use signal::ControlSignal;
pub use status::{classify, classify_with_hint, Classification, TerminalKind, TransientKind};

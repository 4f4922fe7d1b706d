//! Maintenance alerts overview
//!
//! The engine turns a fleet of `VehicleSnapshot`s into at most one emailed
//! digest per evaluation pass. A pass runs the same code whether it was
//! started by the daily timer or by the on-demand HTTP trigger:
//!
//! - evaluator: pure threshold arithmetic. Given a snapshot, the vehicle's
//!   clearance map, and the current instant, it returns the alerts that are
//!   currently firing. It performs no I/O, which is what lets both the
//!   pipeline and the read API share one implementation of the rules.
//! - suppression: the per-vehicle batch gate. A vehicle with something to
//!   report is still skipped if it was already included in a successfully
//!   delivered digest within the last seven days. The gate may be bypassed
//!   by a manual trigger; the per-kind clearance gate may not.
//! - clearance: the dismissal workflow. A mechanic clearing an alert kind
//!   writes the clearance timestamp and then appends an accountability
//!   record, retried with backoff. If the record cannot be appended the
//!   clearance is rolled back and the call fails loudly.
//! - dispatcher: renders the digest once and fans it out to the fixed
//!   recipient list. Per-recipient failures are collected rather than
//!   propagated; suppression state only advances when every recipient
//!   accepted the batch.
//! - pipeline: glues the above together and reports a `PassSummary`.
//!
//! Cleared alert kinds re-activate lazily: there is no timer that flips a
//! clearance back off. The evaluator's gate simply stops honoring entries
//! older than the clearance window.

mod clearance;
mod dispatcher;
mod evaluator;
mod pipeline;
mod suppression;

#[cfg(test)]
pub(crate) mod harness;

pub use clearance::{ClearanceError, ClearanceWorkflow};
pub use dispatcher::{
    ChannelError, DeliveryFailure, DeliveryReceipt, DispatchError, DispatchOutcome, Dispatcher,
    EmailSender, ResendSender, Sender,
};
pub use evaluator::{evaluate, AlertThresholds, DateRule, MileageRule, CLEARANCE_WINDOW_DAYS};
pub use pipeline::{AlertPipeline, PassOptions, PassSummary, Trigger};
pub use suppression::{batch_decision, BatchDecision, REBATCH_WINDOW_DAYS};

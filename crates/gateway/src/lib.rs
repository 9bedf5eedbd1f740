//! Bot-side runtime: the IRC session boundary, channel reconciliation, the
//! cross-process recheck signal and the control surface used by the control
//! process.

pub mod admin;
pub mod bot;
pub mod control;
pub mod error;
pub mod reconcile;
pub mod session;
pub mod signal;

pub use {
    admin::{AdminAction, AdminCommand},
    bot::{BotRuntime, BotSettings},
    control::{ChannelControl, MembershipChange, SignalOutcome},
    error::{Error, Result},
    reconcile::{ChannelAction, ChannelFailure, Plan, ReconcileReport, ReconcileState, Reconciler},
    session::{IrcSession, LoggingSession, SessionEvent, SessionIdentity},
    signal::{ControlEvent, DesiredStateFlag, SignalListener, SignalRaiser},
};

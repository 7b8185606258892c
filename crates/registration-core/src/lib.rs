//! The registration workflow: state machine, approval, ban propagation.
//!
//! This crate drives a registrant through the account-creation steps
//! regardless of which front-end the input arrives from, coordinates the
//! optional admin approval gate through durable pending records, runs the
//! shared commit sequence against the account directory, and propagates
//! external account removals into bans. Front-ends talk to it through
//! [`RegistrationFlow`] (chat), [`WebRegistration`] (web form) and
//! [`ApprovalCoordinator`] (admin decisions); it talks back through the
//! [`Messenger`] capability and returned [`Reply`] values, never through a
//! transport directly.

mod approval;
mod ban;
mod channel;
mod commit;
mod error;
mod flow;
mod locale;
mod policy;
mod session;
mod web;

pub use approval::ApprovalCoordinator;
pub use ban::BanWatcher;
pub use channel::{ChannelError, Choice, MessageRef, Messenger};
pub use commit::{CommitOutcome, CommitRequest, Registrar};
pub use error::FlowError;
pub use flow::{callback, parse_callback, CallbackAction, FlowInput, RegistrationFlow, Reply};
pub use locale::{LocaleCatalog, LocaleInfo};
pub use policy::RegistrationPolicy;
pub use session::{RegSession, RegStep, SessionStore};
pub use web::{WebRegisterError, WebRegisterOutcome, WebRegisterRequest, WebRegistration};

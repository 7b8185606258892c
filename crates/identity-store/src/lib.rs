//! Durable registration records with JSON snapshot persistence.
//!
//! Two stores live here: [`IdentityStore`] holds who is registered, who is
//! banned, which IPs already registered over the web, and which registrations
//! are parked awaiting an admin decision; [`TokenStore`] holds expiring
//! single-use download tokens for generated connection artifacts. Both keep
//! their records behind an async lock and snapshot to disk after every
//! mutation, so independent front-ends observe the same truth and a restart
//! drops nothing.

mod error;
mod snapshot;
mod store;
mod token;
mod tokens;
mod types;

pub use error::StoreError;
pub use store::IdentityStore;
pub use token::generate_token;
pub use tokens::TokenStore;
pub use types::{
    ArtifactKind, BannedIdentity, ChannelKind, DownloadToken, PendingRegistration,
    RegisteredIp, RegistrationRecord, SourceContext,
};

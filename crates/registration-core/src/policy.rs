//! Registration policy knobs, resolved once at startup.

use voice_directory::UserRights;

/// How registrations behave, from configuration.
#[derive(Debug, Clone)]
pub struct RegistrationPolicy {
    /// Gate non-admin registrations behind admin approval.
    pub require_approval: bool,
    /// Skip language selection and force this locale, when usable.
    pub forced_locale: Option<String>,
    /// Announce successful registrations on the voice server.
    pub broadcast_enabled: bool,
    /// Chat identities with admin powers.
    pub admin_ids: Vec<String>,
    /// Rights granted to newly created accounts.
    pub default_rights: UserRights,
}

impl RegistrationPolicy {
    pub fn is_admin(&self, registrant_id: &str) -> bool {
        self.admin_ids.iter().any(|id| id == registrant_id)
    }
}

impl Default for RegistrationPolicy {
    fn default() -> Self {
        Self {
            require_approval: false,
            forced_locale: None,
            broadcast_enabled: true,
            admin_ids: Vec::new(),
            default_rights: UserRights::NONE,
        }
    }
}

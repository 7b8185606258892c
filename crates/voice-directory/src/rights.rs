//! User-rights bitmask handling.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Bitmask of per-account permissions on the voice server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRights(pub u32);

/// Known right names and their bit values, matching the server's flag table.
const RIGHT_FLAGS: &[(&str, u32)] = &[
    ("MULTI_LOGIN", 1 << 0),
    ("VIEW_ALL_USERS", 1 << 1),
    ("CREATE_TEMPORARY_CHANNEL", 1 << 2),
    ("MODIFY_CHANNELS", 1 << 3),
    ("TEXTMESSAGE_BROADCAST", 1 << 4),
    ("KICK_USERS", 1 << 5),
    ("BAN_USERS", 1 << 6),
    ("MOVE_USERS", 1 << 7),
    ("OPERATOR_ENABLE", 1 << 8),
    ("UPLOAD_FILES", 1 << 9),
    ("DOWNLOAD_FILES", 1 << 10),
    ("UPDATE_SERVERPROPERTIES", 1 << 11),
    ("TRANSMIT_VOICE", 1 << 12),
    ("TRANSMIT_VIDEOCAPTURE", 1 << 13),
    ("TRANSMIT_DESKTOP", 1 << 14),
    ("TRANSMIT_DESKTOPINPUT", 1 << 15),
    ("TRANSMIT_MEDIAFILE", 1 << 16),
    ("LOCKED_NICKNAME", 1 << 17),
    ("LOCKED_STATUS", 1 << 18),
    ("RECORD_VOICE", 1 << 19),
    ("VIEW_HIDDEN_CHANNELS", 1 << 20),
    ("TEXTMESSAGE_USER", 1 << 21),
    ("TEXTMESSAGE_CHANNEL", 1 << 22),
];

impl UserRights {
    pub const NONE: UserRights = UserRights(0);

    pub fn contains(&self, other: UserRights) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Build a rights bitmask from a list of right names.
///
/// Unknown names are skipped with a warning rather than failing the whole
/// configuration.
pub fn rights_from_names<S: AsRef<str>>(names: &[S]) -> UserRights {
    let mut mask = 0u32;
    for name in names {
        let wanted = name.as_ref().trim().to_ascii_uppercase();
        if wanted.is_empty() {
            continue;
        }
        match RIGHT_FLAGS.iter().find(|(flag, _)| *flag == wanted) {
            Some((_, bits)) => mask |= bits,
            None => warn!("Unknown user right '{}' in configuration, skipping", wanted),
        }
    }
    UserRights(mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rights_from_names() {
        let rights = rights_from_names(&["MULTI_LOGIN", "transmit_voice", " UPLOAD_FILES "]);
        assert!(rights.contains(UserRights(1 << 0)));
        assert!(rights.contains(UserRights(1 << 12)));
        assert!(rights.contains(UserRights(1 << 9)));
        assert!(!rights.contains(UserRights(1 << 6)));
    }

    #[test]
    fn test_unknown_rights_are_skipped() {
        let rights = rights_from_names(&["NOT_A_RIGHT", "MULTI_LOGIN"]);
        assert_eq!(rights, UserRights(1));
    }

    #[test]
    fn test_empty_list_is_no_rights() {
        let rights = rights_from_names::<&str>(&[]);
        assert_eq!(rights, UserRights::NONE);
    }
}

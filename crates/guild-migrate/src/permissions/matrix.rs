//! Discord → Matrix power-level mapping.
//!
//! Matrix has no role objects. Permissions are expressed as a numeric power
//! level per user, so every Discord capability lands on one of two tier bits
//! and the highest tier present decides the level:
//!
//! | level | tier      | typical rights                    |
//! |-------|-----------|-----------------------------------|
//! | 100   | admin     | full control                      |
//! | 50    | moderator | kick, ban, redact, room state     |
//! | 0     | user      | send messages, read history       |

use super::{Capability, CapabilityTable, DestinationPermissionSet};

pub const ADMIN: i64 = 100;
pub const MODERATOR: i64 = 50;
pub const USER: i64 = 0;

pub const MODERATOR_TIER: u64 = 1;
pub const ADMIN_TIER: u64 = 1 << 1;

const MODERATOR_CAPABILITIES: [Capability; 8] = [
    Capability::KickMembers,
    Capability::BanMembers,
    Capability::ManageChannels,
    Capability::ManageGuild,
    Capability::ManageMessages,
    Capability::ManageNicknames,
    Capability::ManageRoles,
    Capability::ManageWebhooks,
];

/// Discord capability → Matrix tier bit. Every entry is coarse.
pub fn matrix_table() -> CapabilityTable {
    MODERATOR_CAPABILITIES.iter().fold(
        CapabilityTable::new("matrix").coarse(Capability::Administrator, ADMIN_TIER),
        |table, capability| table.coarse(*capability, MODERATOR_TIER),
    )
}

/// Power level for a mapped permission set.
pub fn power_level(permissions: &DestinationPermissionSet) -> i64 {
    if permissions.contains(ADMIN_TIER) {
        ADMIN
    } else if permissions.contains(MODERATOR_TIER) {
        MODERATOR
    } else {
        USER
    }
}

pub fn level_label(level: i64) -> &'static str {
    match level {
        l if l >= ADMIN => "Admin",
        l if l >= MODERATOR => "Mod",
        _ => "User",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{map, PermissionBitset};

    fn level_of(bits: u64) -> i64 {
        power_level(&map(PermissionBitset(bits), &matrix_table()))
    }

    #[test]
    fn test_administrator_is_admin() {
        assert_eq!(level_of(Capability::Administrator.bit()), ADMIN);
    }

    #[test]
    fn test_admin_wins_over_moderator_bits() {
        let bits = Capability::Administrator.bit() | Capability::KickMembers.bit();
        assert_eq!(level_of(bits), ADMIN);
    }

    #[test]
    fn test_moderation_bits_are_moderator() {
        for capability in MODERATOR_CAPABILITIES {
            assert_eq!(level_of(capability.bit()), MODERATOR, "{}", capability);
        }
    }

    #[test]
    fn test_plain_member_is_user() {
        let bits = Capability::SendMessages.bit() | Capability::ViewChannel.bit();
        assert_eq!(level_of(bits), USER);
    }

    #[test]
    fn test_every_grant_is_reported_coarse() {
        let out = map(
            PermissionBitset(Capability::BanMembers.bit() | Capability::ManageRoles.bit()),
            &matrix_table(),
        );
        assert_eq!(
            out.coarsened,
            vec![Capability::BanMembers, Capability::ManageRoles]
        );
    }

    #[test]
    fn test_labels() {
        assert_eq!(level_label(ADMIN), "Admin");
        assert_eq!(level_label(MODERATOR), "Mod");
        assert_eq!(level_label(USER), "User");
    }
}

//! Source permission bitsets and their translation to destination platforms.
//!
//! The source model is Discord's role permission bitfield. Each destination
//! publishes a [`CapabilityTable`] that says, per source [`Capability`], which
//! destination bits it grants. [`map`] walks the bits set on a role and
//! collects the destination grants.
//!
//! No platform pair has a 1:1 permission model, so translation is lossy by
//! nature:
//!
//! - capabilities with no table entry are dropped
//! - entries marked [`Grant::Coarse`] map onto a broader destination concept
//!   (for example Matrix power-level tiers) and are reported as coarsened
//!
//! Neither case is an error.

pub mod matrix;
pub mod stoat;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A source-platform permission bitfield (Discord layout).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionBitset(pub u64);

impl PermissionBitset {
    pub fn bits(&self) -> u64 {
        self.0
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    /// Known capabilities set in this bitfield, in bit order.
    pub fn capabilities(self) -> impl Iterator<Item = Capability> {
        Capability::ALL
            .into_iter()
            .filter(move |c| self.contains(*c))
    }
}

impl From<u64> for PermissionBitset {
    fn from(bits: u64) -> Self {
        PermissionBitset(bits)
    }
}

impl FromIterator<Capability> for PermissionBitset {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        PermissionBitset(iter.into_iter().fold(0, |acc, c| acc | c.bit()))
    }
}

/// Named source capabilities. The discriminant is the bit index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Capability {
    CreateInstantInvite = 0,
    KickMembers = 1,
    BanMembers = 2,
    Administrator = 3,
    ManageChannels = 4,
    ManageGuild = 5,
    AddReactions = 6,
    ViewAuditLog = 7,
    PrioritySpeaker = 8,
    Stream = 9,
    ViewChannel = 10,
    SendMessages = 11,
    SendTtsMessages = 12,
    ManageMessages = 13,
    EmbedLinks = 14,
    AttachFiles = 15,
    ReadMessageHistory = 16,
    MentionEveryone = 17,
    UseExternalEmojis = 18,
    ViewGuildInsights = 19,
    Connect = 20,
    Speak = 21,
    MuteMembers = 22,
    DeafenMembers = 23,
    MoveMembers = 24,
    UseVad = 25,
    ChangeNickname = 26,
    ManageNicknames = 27,
    ManageRoles = 28,
    ManageWebhooks = 29,
    ManageGuildExpressions = 30,
}

impl Capability {
    pub const ALL: [Capability; 31] = [
        Capability::CreateInstantInvite,
        Capability::KickMembers,
        Capability::BanMembers,
        Capability::Administrator,
        Capability::ManageChannels,
        Capability::ManageGuild,
        Capability::AddReactions,
        Capability::ViewAuditLog,
        Capability::PrioritySpeaker,
        Capability::Stream,
        Capability::ViewChannel,
        Capability::SendMessages,
        Capability::SendTtsMessages,
        Capability::ManageMessages,
        Capability::EmbedLinks,
        Capability::AttachFiles,
        Capability::ReadMessageHistory,
        Capability::MentionEveryone,
        Capability::UseExternalEmojis,
        Capability::ViewGuildInsights,
        Capability::Connect,
        Capability::Speak,
        Capability::MuteMembers,
        Capability::DeafenMembers,
        Capability::MoveMembers,
        Capability::UseVad,
        Capability::ChangeNickname,
        Capability::ManageNicknames,
        Capability::ManageRoles,
        Capability::ManageWebhooks,
        Capability::ManageGuildExpressions,
    ];

    pub fn bit(self) -> u64 {
        1u64 << (self as u8)
    }

    pub fn name(self) -> &'static str {
        match self {
            Capability::CreateInstantInvite => "CREATE_INSTANT_INVITE",
            Capability::KickMembers => "KICK_MEMBERS",
            Capability::BanMembers => "BAN_MEMBERS",
            Capability::Administrator => "ADMINISTRATOR",
            Capability::ManageChannels => "MANAGE_CHANNELS",
            Capability::ManageGuild => "MANAGE_GUILD",
            Capability::AddReactions => "ADD_REACTIONS",
            Capability::ViewAuditLog => "VIEW_AUDIT_LOG",
            Capability::PrioritySpeaker => "PRIORITY_SPEAKER",
            Capability::Stream => "STREAM",
            Capability::ViewChannel => "VIEW_CHANNEL",
            Capability::SendMessages => "SEND_MESSAGES",
            Capability::SendTtsMessages => "SEND_TTS_MESSAGES",
            Capability::ManageMessages => "MANAGE_MESSAGES",
            Capability::EmbedLinks => "EMBED_LINKS",
            Capability::AttachFiles => "ATTACH_FILES",
            Capability::ReadMessageHistory => "READ_MESSAGE_HISTORY",
            Capability::MentionEveryone => "MENTION_EVERYONE",
            Capability::UseExternalEmojis => "USE_EXTERNAL_EMOJIS",
            Capability::ViewGuildInsights => "VIEW_GUILD_INSIGHTS",
            Capability::Connect => "CONNECT",
            Capability::Speak => "SPEAK",
            Capability::MuteMembers => "MUTE_MEMBERS",
            Capability::DeafenMembers => "DEAFEN_MEMBERS",
            Capability::MoveMembers => "MOVE_MEMBERS",
            Capability::UseVad => "USE_VAD",
            Capability::ChangeNickname => "CHANGE_NICKNAME",
            Capability::ManageNicknames => "MANAGE_NICKNAMES",
            Capability::ManageRoles => "MANAGE_ROLES",
            Capability::ManageWebhooks => "MANAGE_WEBHOOKS",
            Capability::ManageGuildExpressions => "MANAGE_GUILD_EXPRESSIONS",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Destination bits granted for one source capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    /// The destination has an equivalent (possibly spread over several bits).
    Exact(u64),
    /// The nearest destination concept is broader than the source bit.
    Coarse(u64),
}

impl Grant {
    pub fn bits(self) -> u64 {
        match self {
            Grant::Exact(bits) | Grant::Coarse(bits) => bits,
        }
    }
}

/// Static translation table from source capabilities to one destination.
#[derive(Debug, Clone)]
pub struct CapabilityTable {
    platform: &'static str,
    entries: BTreeMap<Capability, Grant>,
}

impl CapabilityTable {
    pub fn new(platform: &'static str) -> Self {
        Self {
            platform,
            entries: BTreeMap::new(),
        }
    }

    pub fn exact(mut self, capability: Capability, bits: u64) -> Self {
        self.entries.insert(capability, Grant::Exact(bits));
        self
    }

    pub fn coarse(mut self, capability: Capability, bits: u64) -> Self {
        self.entries.insert(capability, Grant::Coarse(bits));
        self
    }

    pub fn platform(&self) -> &'static str {
        self.platform
    }

    pub fn get(&self, capability: Capability) -> Option<Grant> {
        self.entries.get(&capability).copied()
    }

    /// Union of every destination bit the table can ever produce.
    pub fn range(&self) -> u64 {
        self.entries.values().fold(0, |acc, g| acc | g.bits())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of mapping one role's permissions onto a destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DestinationPermissionSet {
    /// Destination-native permission bits.
    pub bits: u64,
    /// Source capabilities that landed on a broader destination concept.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub coarsened: Vec<Capability>,
    /// Source capabilities with no destination equivalent.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dropped: Vec<Capability>,
}

impl DestinationPermissionSet {
    pub fn contains(&self, bits: u64) -> bool {
        self.bits & bits == bits
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }
}

/// Translate a source permission bitfield through `table`.
///
/// Deterministic and free of I/O. Bits that are not a known [`Capability`]
/// are ignored; the result never carries a bit outside `table.range()`.
pub fn map(source_bits: PermissionBitset, table: &CapabilityTable) -> DestinationPermissionSet {
    let mut out = DestinationPermissionSet::default();

    for capability in source_bits.capabilities() {
        match table.get(capability) {
            Some(Grant::Exact(bits)) => out.bits |= bits,
            Some(Grant::Coarse(bits)) => {
                debug!(
                    "{}: {} coarsened to {:#x}",
                    table.platform(),
                    capability,
                    bits
                );
                out.bits |= bits;
                out.coarsened.push(capability);
            }
            None => {
                debug!("{}: {} has no equivalent, dropped", table.platform(), capability);
                out.dropped.push(capability);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> CapabilityTable {
        CapabilityTable::new("sample")
            .exact(Capability::SendMessages, 0b0001)
            .exact(Capability::ManageRoles, 0b0110)
            .coarse(Capability::KickMembers, 0b1000)
    }

    #[test]
    fn test_capability_bits_match_discriminants() {
        assert_eq!(Capability::CreateInstantInvite.bit(), 1);
        assert_eq!(Capability::Administrator.bit(), 1 << 3);
        assert_eq!(Capability::ManageGuildExpressions.bit(), 1 << 30);
        for (i, c) in Capability::ALL.iter().enumerate() {
            assert_eq!(c.bit(), 1u64 << i, "{} out of order", c);
        }
    }

    #[test]
    fn test_serde_name_matches_display() {
        let json = serde_json::to_string(&Capability::ManageGuildExpressions).unwrap();
        assert_eq!(json, "\"MANAGE_GUILD_EXPRESSIONS\"");
        for c in Capability::ALL {
            let json = serde_json::to_string(&c).unwrap();
            assert_eq!(json, format!("\"{}\"", c.name()));
        }
    }

    #[test]
    fn test_map_exact_and_multi_bit() {
        let bits: PermissionBitset = [Capability::SendMessages, Capability::ManageRoles]
            .into_iter()
            .collect();
        let out = map(bits, &sample_table());
        assert_eq!(out.bits, 0b0111);
        assert!(out.coarsened.is_empty());
        assert!(out.dropped.is_empty());
    }

    #[test]
    fn test_map_drops_missing_entries() {
        let bits: PermissionBitset = [Capability::SendMessages, Capability::Stream]
            .into_iter()
            .collect();
        let out = map(bits, &sample_table());
        assert_eq!(out.bits, 0b0001);
        assert_eq!(out.dropped, vec![Capability::Stream]);
    }

    #[test]
    fn test_map_records_coarsening() {
        let bits: PermissionBitset = [Capability::KickMembers].into_iter().collect();
        let out = map(bits, &sample_table());
        assert_eq!(out.bits, 0b1000);
        assert_eq!(out.coarsened, vec![Capability::KickMembers]);
    }

    #[test]
    fn test_map_ignores_unknown_bits() {
        let out = map(PermissionBitset(1 << 45 | 1 << 63), &sample_table());
        assert!(out.is_empty());
        assert!(out.dropped.is_empty());
    }

    #[test]
    fn test_map_is_deterministic_and_within_range() {
        let table = sample_table();
        for seed in [0u64, 1, 0x7FFF_FFFF, u64::MAX, 0x1234_5678_9ABC_DEF0] {
            let first = map(PermissionBitset(seed), &table);
            let second = map(PermissionBitset(seed), &table);
            assert_eq!(first, second);
            assert_eq!(first.bits & !table.range(), 0);
        }
    }

    #[test]
    fn test_empty_bitset_maps_to_empty_set() {
        let out = map(PermissionBitset::default(), &sample_table());
        assert_eq!(out, DestinationPermissionSet::default());
    }
}

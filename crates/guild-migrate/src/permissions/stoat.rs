//! Stoat permission bits and the Discord → Stoat capability table.

use super::{Capability, CapabilityTable};

pub const MANAGE_CHANNEL: u64 = 1;
pub const MANAGE_SERVER: u64 = 1 << 1;
pub const MANAGE_PERMISSIONS: u64 = 1 << 2;
pub const MANAGE_ROLE: u64 = 1 << 3;
pub const MANAGE_CUSTOMISATION: u64 = 1 << 4;
pub const KICK_MEMBERS: u64 = 1 << 6;
pub const BAN_MEMBERS: u64 = 1 << 7;
pub const TIMEOUT_MEMBERS: u64 = 1 << 8;
pub const ASSIGN_ROLES: u64 = 1 << 9;
pub const CHANGE_NICKNAME: u64 = 1 << 10;
pub const MANAGE_NICKNAMES: u64 = 1 << 11;
pub const CHANGE_AVATAR: u64 = 1 << 12;
pub const REMOVE_AVATARS: u64 = 1 << 13;
pub const VIEW_CHANNEL: u64 = 1 << 20;
pub const READ_MESSAGE_HISTORY: u64 = 1 << 21;
pub const SEND_MESSAGE: u64 = 1 << 22;
pub const MANAGE_MESSAGES: u64 = 1 << 23;
pub const MANAGE_WEBHOOKS: u64 = 1 << 24;
pub const INVITE_OTHERS: u64 = 1 << 25;
pub const SEND_EMBEDS: u64 = 1 << 26;
pub const UPLOAD_FILES: u64 = 1 << 27;
pub const MASQUERADE: u64 = 1 << 28;
pub const REACT: u64 = 1 << 29;
pub const CONNECT: u64 = 1 << 30;
pub const SPEAK: u64 = 1 << 31;
pub const VIDEO: u64 = 1 << 32;
pub const MUTE_MEMBERS: u64 = 1 << 33;
pub const DEAFEN_MEMBERS: u64 = 1 << 34;
pub const MOVE_MEMBERS: u64 = 1 << 35;

/// Every permission Stoat defines.
pub const ALL: u64 = MANAGE_CHANNEL
    | MANAGE_SERVER
    | MANAGE_PERMISSIONS
    | MANAGE_ROLE
    | MANAGE_CUSTOMISATION
    | KICK_MEMBERS
    | BAN_MEMBERS
    | TIMEOUT_MEMBERS
    | ASSIGN_ROLES
    | CHANGE_NICKNAME
    | MANAGE_NICKNAMES
    | CHANGE_AVATAR
    | REMOVE_AVATARS
    | VIEW_CHANNEL
    | READ_MESSAGE_HISTORY
    | SEND_MESSAGE
    | MANAGE_MESSAGES
    | MANAGE_WEBHOOKS
    | INVITE_OTHERS
    | SEND_EMBEDS
    | UPLOAD_FILES
    | MASQUERADE
    | REACT
    | CONNECT
    | SPEAK
    | VIDEO
    | MUTE_MEMBERS
    | DEAFEN_MEMBERS
    | MOVE_MEMBERS;

/// Discord capability → Stoat permission bits.
pub fn stoat_table() -> CapabilityTable {
    CapabilityTable::new("stoat")
        .exact(Capability::CreateInstantInvite, INVITE_OTHERS)
        .exact(Capability::KickMembers, KICK_MEMBERS)
        .exact(Capability::BanMembers, BAN_MEMBERS)
        .exact(Capability::Administrator, ALL)
        .exact(Capability::ManageChannels, MANAGE_CHANNEL)
        .exact(Capability::ManageGuild, MANAGE_SERVER)
        .exact(Capability::AddReactions, REACT)
        .exact(Capability::ViewChannel, VIEW_CHANNEL)
        .exact(Capability::SendMessages, SEND_MESSAGE)
        .exact(Capability::ManageMessages, MANAGE_MESSAGES)
        .exact(Capability::EmbedLinks, SEND_EMBEDS)
        .exact(Capability::AttachFiles, UPLOAD_FILES)
        .exact(Capability::ReadMessageHistory, READ_MESSAGE_HISTORY)
        .exact(Capability::Connect, CONNECT)
        .exact(Capability::Speak, SPEAK)
        .exact(Capability::MuteMembers, MUTE_MEMBERS)
        .exact(Capability::DeafenMembers, DEAFEN_MEMBERS)
        .exact(Capability::MoveMembers, MOVE_MEMBERS)
        .exact(Capability::ChangeNickname, CHANGE_NICKNAME)
        .exact(Capability::ManageNicknames, MANAGE_NICKNAMES)
        .exact(Capability::ManageRoles, MANAGE_ROLE | ASSIGN_ROLES)
        .exact(Capability::ManageWebhooks, MANAGE_WEBHOOKS)
        .exact(Capability::ManageGuildExpressions, MANAGE_CUSTOMISATION)
}

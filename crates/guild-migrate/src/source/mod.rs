//! Source platform readers.

pub mod discord;

pub use discord::DiscordReader;

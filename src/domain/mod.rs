//! Domain layer: the value objects shared by the coordinator and its terminals.
//!
//! Accounts and cards are plain state holders; the rules about who may touch
//! them, and when, live in [`crate::application::bank`].

pub mod account;
pub mod card;
pub mod notification;
pub mod ports;

pub type AccountId = u32;
pub type CardId = u32;
pub type Token = u32;
pub type TerminalId = u32;
pub type Pin = u32;

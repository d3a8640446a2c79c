//! Vaultvar - locate, view and patch sealed variables in nested variable files

#![forbid(unsafe_code)]

pub mod commands;
pub mod config;
pub mod document;
pub mod editor;
pub mod entry;
pub mod error;
pub mod file_ops;
pub mod locate;
pub mod patch;
pub mod resolve;
pub mod seal;
pub mod secret;
pub mod secretcrypt;
pub mod span;
pub mod varmor;

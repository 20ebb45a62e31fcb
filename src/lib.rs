//! Telegram channel news relay.
//!
//! Ingests channel posts from Telegram webhooks, serves them as a paginated
//! JSON feed with lazily cached per-language translations, and proxies
//! attached images without exposing the bot token.

// SQL lives in r"" literals.
#![allow(clippy::needless_raw_string_hashes)]

pub mod config;
pub mod db;
pub mod news;
pub mod telegram;
pub mod translate;
pub mod web;

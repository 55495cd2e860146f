//! chatdeck service.
//!
//! Wires the dialogue engine and device control to Telegram, PostgreSQL
//! and Home Assistant, and serves a small HTTP surface.

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod poller;
pub mod telegram;
pub mod web;

//! infobot: an IRC bot that keeps a shared factoid knowledge base.
//!
//! Commands, answered in any joined channel:
//!
//!   !info                   a random factoid
//!   !info <key>             everything known about <key>
//!   !learn <key> = <text>   remember <text> under <key>
//!   !forget <key> = <text>  forget one value
//!   !forget <key>           forget everything about <key>

pub mod app;
pub mod command;
pub mod config;
pub mod render;
pub mod session;
pub mod store;

//! Plugins that ship with parley.

pub mod help;

pub use help::{HelpHandler, HelpPlugin};

//! c4preset: preset discovery and encoder navigation for the Source Audio C4 Synth.

pub mod address;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod controller;
pub mod device;
pub mod discovery;
pub mod display;
pub mod error;
pub mod input;
pub mod navigation;
pub mod protocol;
pub mod reconnect;
pub mod session;

pub use error::C4Error;

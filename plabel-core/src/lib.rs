#![allow(clippy::new_without_default)]

pub mod actor;
pub mod clock;
pub mod config;
pub mod countdown;
pub mod display;
pub mod error;
pub mod kiosk;
pub mod playlist;
pub mod sync;
pub mod tap;
pub mod timer;
pub mod webapi;

//! API handlers
//!
//! Author: hephaex@gmail.com

pub mod classify;
pub mod health;

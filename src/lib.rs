#![no_std]
#![allow(async_fn_in_trait)]

// must come first so the log macros are visible to the rest of the crate
mod fmt;

pub mod manager;
pub mod registers;
pub mod retry;
pub mod scheduler;
pub mod sink;
pub mod snapshot;
pub mod state_machine;
pub mod tasks;
pub mod transport;

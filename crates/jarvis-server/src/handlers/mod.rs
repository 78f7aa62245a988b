//! Domain handlers, split by endpoint group.
//!
//! Every handler takes the shared state plus the raw JSON body and returns
//! the success payload; the envelope is added in [`crate::handler`].

pub(crate) mod cache;
pub(crate) mod chat;
pub(crate) mod learning;
pub(crate) mod search;
mod shared;
pub(crate) mod status;
pub(crate) mod tasks;

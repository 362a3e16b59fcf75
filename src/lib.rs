//! Reacts to object storage lifecycle events by recording the affected image in the
//! `IMAGES` table.
//!
//! The pipeline for one invocation is: decode the event ([event]), build the metadata
//! record and its public url ([metadata], [url]), then insert it ([service::db]).
//! [handler] drives those steps and [fdk] exposes them to the Fn platform.

pub mod context;
pub mod entrypoint;
pub mod env;
pub mod error;
pub mod event;
pub mod fdk;
pub mod handler;
pub mod metadata;
pub mod service;
pub mod url;

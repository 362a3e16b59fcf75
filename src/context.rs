use std::sync::Arc;

use crate::{event::DecodePolicy, service::db::DB};

/// Everything an invocation needs besides its input
#[derive(Clone)]
pub struct Context {
    pub db: Arc<DB>,
    pub decode_policy: DecodePolicy,
}

impl Context {
    pub fn new(db: DB, decode_policy: DecodePolicy) -> Self {
        Self {
            db: Arc::new(db),
            decode_policy,
        }
    }
}

//! Transfer options.
//!
//! Client-level defaults and per-call overrides share this type. Recognised
//! options are typed fields; anything engine specific goes through the
//! `engine` passthrough map, which is checked against the reserved upload
//! keys instead of being merged blindly. The engine refuses keys it does
//! not act on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Passthrough keys owned by the translator. The body wiring of a transfer
/// is always derived from the request, never taken from options.
pub const RESERVED_ENGINE_OPTIONS: [&str; 2] = ["infile", "infilesize"];

/// Returns true if `key` names an internally managed upload option.
pub fn is_reserved(key: &str) -> bool {
    RESERVED_ENGINE_OPTIONS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(key))
}

/// Options applied to a transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TransferOptions {
    /// Upper bound for the whole transfer, in milliseconds.
    pub timeout_ms: Option<u64>,

    /// `User-Agent` sent when the request carries none.
    pub user_agent: Option<String>,

    /// Bytes pulled from a streamed body per read.
    pub upload_chunk_size: Option<usize>,

    /// Engine-specific passthrough options.
    pub engine: BTreeMap<String, String>,
}

impl TransferOptions {
    /// Merge `overrides` over `self`. Overrides win on conflicting keys,
    /// except reserved passthrough keys, which are dropped.
    pub fn merge(&self, overrides: &TransferOptions) -> TransferOptions {
        let mut engine = self.engine.clone();
        for (key, value) in &overrides.engine {
            if is_reserved(key) {
                tracing::warn!(option = %key, "Ignoring reserved transfer option override");
                continue;
            }
            engine.insert(key.clone(), value.clone());
        }
        engine.retain(|key, _| !is_reserved(key));

        TransferOptions {
            timeout_ms: overrides.timeout_ms.or(self.timeout_ms),
            user_agent: overrides
                .user_agent
                .clone()
                .or_else(|| self.user_agent.clone()),
            upload_chunk_size: overrides.upload_chunk_size.or(self.upload_chunk_size),
            engine,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_upload_chunk_size(mut self, size: usize) -> Self {
        self.upload_chunk_size = Some(size);
        self
    }

    pub fn with_engine_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.engine.insert(key.into(), value.into());
        self
    }
}

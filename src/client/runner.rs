//! Multi-transfer runner.
//!
//! # Responsibilities
//! - Register promise cores with the polling engine
//! - Drive the engine and dispatch completion events to their cores
//! - Settle every core exactly once, then forget it
//!
//! # Data Flow
//! ```text
//! add(core) ──► engine.add(handle) ──► registry
//!
//! wait(target)
//!     loop:
//!         engine.perform()
//!         while engine.info_read() → Completion
//!             match registry by id
//!                 none      → engine.remove (orphan event)
//!                 success   → assemble → fulfill (or reject on assembly error)
//!                 failure   → reject
//!             engine.remove, drop from registry
//!     until target settled, or nothing active and no call-again
//! ```
//!
//! # Design Decisions
//! - A wait that ends with its target still pending rejects it as abandoned
//! - Dropping the runner rejects whatever is still registered

use std::sync::Arc;
use std::time::Instant;

use crate::engine::{Completion, MultiTransport};
use crate::error::{RegistrationError, TransferError};
use crate::client::promise::PromiseCore;
use crate::observability::metrics::{self, Outcome};
use crate::transfer::handle::TransferId;

struct Registered {
    core: Arc<PromiseCore>,
    started: Instant,
}

/// Drives many transfers through one polling engine.
pub struct MultiRunner {
    engine: Box<dyn MultiTransport>,
    registry: Vec<Registered>,
}

impl MultiRunner {
    pub fn new(engine: Box<dyn MultiTransport>) -> Self {
        Self {
            engine,
            registry: Vec::new(),
        }
    }

    /// Register a core. Adding a core that is already registered is a no-op.
    pub fn add(&mut self, core: Arc<PromiseCore>) -> Result<(), RegistrationError> {
        if self.contains(&core) {
            return Ok(());
        }
        let handle = core
            .take_handle()
            .ok_or(RegistrationError::Detached(core.id()))?;
        self.engine.add(handle)?;

        tracing::debug!(
            transfer_id = %core.id(),
            method = %core.request().method,
            url = %core.request().uri,
            "Transfer submitted"
        );
        self.registry.push(Registered {
            core,
            started: Instant::now(),
        });
        metrics::in_flight_added();
        Ok(())
    }

    /// Withdraw a core from the engine and the registry. Returns false if it
    /// was not registered.
    pub fn remove(&mut self, core: &Arc<PromiseCore>) -> bool {
        let Some(index) = self.position(core.id()) else {
            return false;
        };
        self.registry.remove(index);
        if !self.engine.remove(core.id()) {
            tracing::debug!(transfer_id = %core.id(), "Engine no longer tracks removed transfer");
        }
        metrics::in_flight_removed(1);
        true
    }

    pub fn contains(&self, core: &Arc<PromiseCore>) -> bool {
        self.registry
            .iter()
            .any(|entry| Arc::ptr_eq(&entry.core, core))
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Drive the engine until `target` settles, or, without a target, until
    /// nothing is left in flight.
    pub fn wait(&mut self, target: Option<&Arc<PromiseCore>>) {
        loop {
            let status = self.engine.perform();
            while let Some(completion) = self.engine.info_read() {
                self.dispatch(completion);
            }

            if target.is_some_and(|core| !core.is_pending()) {
                return;
            }
            if !status.call_again && status.active == 0 {
                break;
            }
        }

        if let Some(core) = target {
            if core.is_pending() {
                tracing::warn!(transfer_id = %core.id(), "Transfer never completed");
                self.remove(core);
                self.settle_abandoned(core);
            }
        }
    }

    fn dispatch(&mut self, completion: Completion) {
        let Completion { mut handle, result } = completion;
        let id = handle.id();

        let Some(index) = self.position(id) else {
            tracing::debug!(transfer_id = %id, "Dropping completion for unknown transfer");
            self.engine.remove(id);
            return;
        };
        let Registered { core, started } = self.registry.remove(index);
        self.engine.remove(id);
        metrics::in_flight_removed(1);

        let method = core.request().method.as_str().to_string();
        let elapsed = Some(started.elapsed());
        let settled = match result {
            Ok(info) => match handle.assemble_response(info) {
                Ok(response) => {
                    tracing::debug!(transfer_id = %id, status = response.status().as_u16(), "Transfer fulfilled");
                    metrics::record_transfer(&method, Outcome::Success, elapsed);
                    core.fulfill(response)
                }
                Err(err) => {
                    tracing::warn!(transfer_id = %id, error = %err, "Response assembly failed");
                    metrics::record_transfer(&method, Outcome::AssemblyError, elapsed);
                    core.reject(TransferError::assembly(err, core.request().clone()))
                }
            },
            Err(err) => {
                tracing::warn!(transfer_id = %id, error = %err, "Transfer failed");
                metrics::record_transfer(&method, Outcome::TransportError, elapsed);
                core.reject(TransferError::transport(err.message(), core.request().clone()))
            }
        };
        if settled.is_err() {
            tracing::debug!(transfer_id = %id, "Completion for an already settled transfer");
        }
    }

    fn settle_abandoned(&self, core: &Arc<PromiseCore>) {
        if core
            .reject(TransferError::abandoned(core.request().clone()))
            .is_ok()
        {
            metrics::record_transfer(core.request().method.as_str(), Outcome::Abandoned, None);
        }
    }

    fn position(&self, id: TransferId) -> Option<usize> {
        self.registry.iter().position(|entry| entry.core.id() == id)
    }
}

impl Drop for MultiRunner {
    fn drop(&mut self) {
        let registered = std::mem::take(&mut self.registry);
        metrics::in_flight_removed(registered.len());
        for entry in registered {
            self.engine.remove(entry.core.id());
            self.settle_abandoned(&entry.core);
        }
    }
}

impl std::fmt::Debug for MultiRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiRunner")
            .field("registered", &self.registry.len())
            .finish()
    }
}

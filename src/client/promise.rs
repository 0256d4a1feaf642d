//! Promises for asynchronous transfers.
//!
//! # Responsibilities
//! - Own a transfer's handle until the runner takes it
//! - Hold the single settled outcome of the transfer
//! - Let callers wait on, inspect, or cancel one transfer
//!
//! # Design Decisions
//! - Settlement consumes the pending state; a second settlement is refused
//! - Waiting drives the shared runner until this transfer settles

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::client::runner::MultiRunner;
use crate::error::TransferError;
use crate::http::request::RequestHead;
use crate::http::response::Response;
use crate::transfer::handle::{TransferHandle, TransferId};

/// Observable state of a promise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    Pending,
    Fulfilled,
    Rejected,
}

/// The promise was settled before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("promise is already settled")]
pub struct AlreadySettled;

#[derive(Debug)]
enum Outcome {
    Pending,
    Fulfilled(Response),
    Rejected(TransferError),
    /// The outcome was handed to a waiter.
    Claimed(PromiseState),
}

/// Shared state of one asynchronous transfer.
#[derive(Debug)]
pub struct PromiseCore {
    id: TransferId,
    request: RequestHead,
    handle: Mutex<Option<TransferHandle>>,
    outcome: Mutex<Outcome>,
}

impl PromiseCore {
    pub fn new(handle: TransferHandle, request: RequestHead) -> Self {
        Self {
            id: handle.id(),
            request,
            handle: Mutex::new(Some(handle)),
            outcome: Mutex::new(Outcome::Pending),
        }
    }

    pub fn id(&self) -> TransferId {
        self.id
    }

    /// The request this transfer was made for.
    pub fn request(&self) -> &RequestHead {
        &self.request
    }

    pub fn state(&self) -> PromiseState {
        match &*self.outcome() {
            Outcome::Pending => PromiseState::Pending,
            Outcome::Fulfilled(_) => PromiseState::Fulfilled,
            Outcome::Rejected(_) => PromiseState::Rejected,
            Outcome::Claimed(state) => *state,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state() == PromiseState::Pending
    }

    /// Move the transfer handle out for registration with an engine.
    pub(crate) fn take_handle(&self) -> Option<TransferHandle> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    pub(crate) fn fulfill(&self, response: Response) -> Result<(), AlreadySettled> {
        self.settle(Outcome::Fulfilled(response))
    }

    pub(crate) fn reject(&self, error: TransferError) -> Result<(), AlreadySettled> {
        self.settle(Outcome::Rejected(error))
    }

    fn settle(&self, outcome: Outcome) -> Result<(), AlreadySettled> {
        let mut current = self.outcome();
        if !matches!(*current, Outcome::Pending) {
            return Err(AlreadySettled);
        }
        *current = outcome;
        Ok(())
    }

    /// Take the settled outcome. `None` while pending or once claimed.
    pub(crate) fn claim(&self) -> Option<Result<Response, TransferError>> {
        let mut current = self.outcome();
        let state = match &*current {
            Outcome::Fulfilled(_) => PromiseState::Fulfilled,
            Outcome::Rejected(_) => PromiseState::Rejected,
            Outcome::Pending | Outcome::Claimed(_) => return None,
        };
        match std::mem::replace(&mut *current, Outcome::Claimed(state)) {
            Outcome::Fulfilled(response) => Some(Ok(response)),
            Outcome::Rejected(error) => Some(Err(error)),
            Outcome::Pending | Outcome::Claimed(_) => None,
        }
    }

    fn outcome(&self) -> MutexGuard<'_, Outcome> {
        self.outcome.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to the eventual response of an asynchronous transfer.
#[derive(Debug)]
pub struct Promise {
    core: Arc<PromiseCore>,
    runner: Arc<Mutex<MultiRunner>>,
}

impl Promise {
    pub(crate) fn new(core: Arc<PromiseCore>, runner: Arc<Mutex<MultiRunner>>) -> Self {
        Self { core, runner }
    }

    pub fn id(&self) -> TransferId {
        self.core.id()
    }

    /// The request this promise was created for.
    pub fn request(&self) -> &RequestHead {
        self.core.request()
    }

    pub fn state(&self) -> PromiseState {
        self.core.state()
    }

    /// Drive the runner until this transfer settles, then return its outcome.
    pub fn wait(self) -> Result<Response, TransferError> {
        if self.core.is_pending() {
            self.runner
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .wait(Some(&self.core));
        }
        self.core
            .claim()
            .unwrap_or_else(|| Err(TransferError::abandoned(self.core.request().clone())))
    }

    /// Withdraw a pending transfer. Returns false if it had already settled.
    pub fn cancel(&self) -> bool {
        if !self.core.is_pending() {
            return false;
        }
        self.runner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.core);
        let cancelled = self
            .core
            .reject(TransferError::cancelled(self.core.request().clone()))
            .is_ok();
        if cancelled {
            tracing::debug!(transfer_id = %self.core.id(), "Transfer cancelled");
            crate::observability::metrics::record_transfer(
                self.core.request().method.as_str(),
                crate::observability::metrics::Outcome::Cancelled,
                None,
            );
        }
        cancelled
    }
}

//! HTTP transfer client.
//!
//! # Data Flow
//! ```text
//! send(request)
//!     → Translator::build (options merged, version checked)
//!     → reusable handle checkout
//!     → Transport::perform (blocking)
//!     → assemble_response → Response
//!
//! send_async(request)
//!     → Translator::build
//!     → fresh handle → PromiseCore → MultiRunner::add
//!     → Promise (wait / cancel / state)
//! ```
//!
//! # Design Decisions
//! - The synchronous path reuses one handle; it is reset after every transfer
//! - The runner is created on first asynchronous submission and shared by
//!   every promise the client hands out
//! - Configuration errors surface before the engine is touched, including
//!   passthrough options the engine would not act on

pub mod promise;
pub mod runner;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use http::Request;

use crate::config::schema::ClientConfig;
use crate::engine::{Engine, HyperEngine, Transport};
use crate::error::{ConfigurationError, Error, TransferError};
use crate::http::body::Body;
use crate::http::response::Response;
use crate::observability::metrics::{self, Outcome};
use crate::transfer::handle::TransferHandle;
use crate::transfer::options::TransferOptions;
use crate::transfer::translator::Translator;

pub use promise::{Promise, PromiseCore, PromiseState};
pub use runner::MultiRunner;

/// Sends HTTP requests synchronously or as promises.
pub struct Client {
    config: ClientConfig,
    engine: Arc<dyn Engine>,
    translator: Translator,
    transport: Box<dyn Transport>,
    handle: TransferHandle,
    runner: Option<Arc<Mutex<MultiRunner>>>,
}

impl Client {
    /// Build a client on the bundled hyper engine.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let engine = Arc::new(HyperEngine::new(config.engine.clone()));
        Self::with_engine(config, engine)
    }

    /// Build a client on any transport engine.
    pub fn with_engine(config: ClientConfig, engine: Arc<dyn Engine>) -> Result<Self, Error> {
        let translator = Translator::new(config.defaults.clone(), engine.supports_http2());
        let transport = engine.easy()?;
        let handle = TransferHandle::new(config.sink.memory_limit_bytes);

        tracing::debug!(
            http2 = engine.supports_http2(),
            sink_memory_limit = config.sink.memory_limit_bytes,
            "Client created"
        );
        Ok(Self {
            config,
            engine,
            translator,
            transport,
            handle,
            runner: None,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a request and block until the response is assembled.
    pub fn send(&mut self, request: Request<Body>) -> Result<Response, Error> {
        self.send_with(request, &TransferOptions::default())
    }

    /// Like `send`, with per-call options layered over the client defaults.
    pub fn send_with(&mut self, request: Request<Body>, options: &TransferOptions) -> Result<Response, Error> {
        let (config, head) = self.translator.build(request, options)?;
        self.engine.check_options(&config.options.engine)?;
        let started = Instant::now();
        let method = head.method.as_str().to_string();

        let mut checkout = self.handle.checkout(config);
        let info = match self.transport.perform(&mut checkout) {
            Ok(info) => info,
            Err(err) => {
                tracing::warn!(
                    transfer_id = %checkout.id(),
                    method = %head.method,
                    url = %head.uri,
                    error = %err,
                    "Transfer failed"
                );
                metrics::record_transfer(&method, Outcome::TransportError, Some(started.elapsed()));
                return Err(TransferError::transport(err.message(), head).into());
            }
        };

        match checkout.assemble_response(info) {
            Ok(response) => {
                tracing::info!(
                    method = %head.method,
                    url = %head.uri,
                    status = response.status().as_u16(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Transfer complete"
                );
                metrics::record_transfer(&method, Outcome::Success, Some(started.elapsed()));
                Ok(response)
            }
            Err(err) => {
                metrics::record_transfer(&method, Outcome::AssemblyError, Some(started.elapsed()));
                Err(TransferError::assembly(err, head).into())
            }
        }
    }

    /// Submit a request without waiting for it.
    pub fn send_async(&mut self, request: Request<Body>) -> Result<Promise, Error> {
        self.send_async_with(request, &TransferOptions::default())
    }

    /// Like `send_async`, with per-call options layered over the client defaults.
    pub fn send_async_with(
        &mut self,
        request: Request<Body>,
        options: &TransferOptions,
    ) -> Result<Promise, Error> {
        let (config, head) = self.translator.build(request, options)?;
        self.engine.check_options(&config.options.engine)?;
        let runner = self.runner()?;

        let mut handle = TransferHandle::new(self.config.sink.memory_limit_bytes);
        handle.configure(config);
        let core = Arc::new(PromiseCore::new(handle, head));
        runner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add(core.clone())?;
        Ok(Promise::new(core, runner))
    }

    /// Drive every submitted transfer to completion.
    pub fn wait_all(&self) {
        if let Some(runner) = &self.runner {
            runner.lock().unwrap_or_else(PoisonError::into_inner).wait(None);
        }
    }

    /// Asynchronous transfers submitted and not yet settled.
    pub fn in_flight(&self) -> usize {
        self.runner
            .as_ref()
            .map(|runner| runner.lock().unwrap_or_else(PoisonError::into_inner).len())
            .unwrap_or(0)
    }

    fn runner(&mut self) -> Result<Arc<Mutex<MultiRunner>>, ConfigurationError> {
        if let Some(runner) = &self.runner {
            return Ok(runner.clone());
        }
        let runner = Arc::new(Mutex::new(MultiRunner::new(self.engine.multi()?)));
        self.runner = Some(runner.clone());
        Ok(runner)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("handle", &self.handle.id())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

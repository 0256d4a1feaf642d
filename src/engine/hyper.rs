//! Transport engine built on hyper.
//!
//! # Responsibilities
//! - Send a `TransferConfig` over the hyper-util pooled client
//! - Feed the response head back as header lines, then stream body frames
//! - Run multi transfers as tasks on a private runtime
//!
//! # Design Decisions
//! - Each engine owns a current-thread runtime, so transfers only make
//!   progress inside `perform`
//! - HTTP/2 uses a separate prior-knowledge client (`http2` feature)
//! - The whole transfer (connect, head, body) is bounded by `timeout_ms`
//! - Passthrough options are parsed into `EngineOptions`; unknown keys are
//!   refused before the transfer starts

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::stream;
use http::header::{
    HeaderName, HeaderValue, AUTHORIZATION, CONTENT_LENGTH, REFERER, TRANSFER_ENCODING, USER_AGENT,
};
use http::{Request, Version};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::Frame;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tokio::runtime::Runtime;
use tokio::task::{AbortHandle, JoinSet};

use crate::config::schema::EngineConfig;
use crate::engine::{Completion, Engine, MultiTransport, PerformStatus, Transport, TransferInfo, TransportError};
use crate::error::{ConfigurationError, RegistrationError};
use crate::http::headers::split_header_line;
use crate::http::replay::version_label;
use crate::transfer::config::{BodyStrategy, HttpVersion, TransferConfig};
use crate::transfer::handle::{TransferHandle, TransferId};

type TransferBody = UnsyncBoxBody<Bytes, io::Error>;
type HttpClient = Client<HttpConnector, TransferBody>;

/// Engine factory backed by hyper.
#[derive(Debug, Clone)]
pub struct HyperEngine {
    config: EngineConfig,
}

impl HyperEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

impl Default for HyperEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine for HyperEngine {
    fn supports_http2(&self) -> bool {
        cfg!(feature = "http2") && self.config.http2
    }

    fn check_options(&self, options: &BTreeMap<String, String>) -> Result<(), ConfigurationError> {
        EngineOptions::parse(options).map(|_| ())
    }

    fn easy(&self) -> Result<Box<dyn Transport>, ConfigurationError> {
        Ok(Box::new(HyperTransport {
            clients: Clients::build(&self.config),
            runtime: runtime()?,
        }))
    }

    fn multi(&self) -> Result<Box<dyn MultiTransport>, ConfigurationError> {
        Ok(Box::new(HyperMulti {
            tasks: JoinSet::new(),
            in_flight: HashMap::new(),
            completed: VecDeque::new(),
            clients: Clients::build(&self.config),
            poll_interval: Duration::from_millis(self.config.poll_interval_ms),
            runtime: runtime()?,
        }))
    }
}

/// Passthrough options the hyper engine acts on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOptions {
    /// Fail the transfer once the response body would exceed this many bytes.
    pub max_filesize: Option<u64>,
    /// `Referer` sent when the request carries none.
    pub referer: Option<HeaderValue>,
}

impl EngineOptions {
    /// Keys accepted in the passthrough map.
    pub const KEYS: [&'static str; 2] = ["max_filesize", "referer"];

    pub fn parse(options: &BTreeMap<String, String>) -> Result<Self, ConfigurationError> {
        let invalid = |key: &str, reason: String| ConfigurationError::InvalidEngineOption {
            key: key.to_string(),
            reason,
        };

        let mut parsed = Self::default();
        for (key, value) in options {
            match key.to_ascii_lowercase().as_str() {
                "max_filesize" => {
                    let limit = value.trim().parse::<u64>().map_err(|e| invalid(key, e.to_string()))?;
                    parsed.max_filesize = Some(limit);
                }
                "referer" => {
                    let referer = HeaderValue::from_str(value).map_err(|e| invalid(key, e.to_string()))?;
                    parsed.referer = Some(referer);
                }
                _ => return Err(ConfigurationError::UnknownEngineOption(key.clone())),
            }
        }
        Ok(parsed)
    }
}

fn runtime() -> Result<Runtime, ConfigurationError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(ConfigurationError::Runtime)
}

/// Pooled clients, one per wire protocol.
#[derive(Clone)]
struct Clients {
    http1: HttpClient,
    #[cfg(feature = "http2")]
    http2: HttpClient,
}

impl Clients {
    fn build(config: &EngineConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_millis(config.connect_timeout_ms)));
        connector.set_nodelay(true);
        let idle = Duration::from_secs(config.pool_idle_timeout_secs);

        let http1 = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(idle)
            .pool_timer(TokioTimer::new())
            .build(connector.clone());

        #[cfg(feature = "http2")]
        let http2 = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(idle)
            .pool_timer(TokioTimer::new())
            .http2_only(true)
            .build(connector);

        Self {
            http1,
            #[cfg(feature = "http2")]
            http2,
        }
    }

    fn for_version(&self, version: HttpVersion) -> &HttpClient {
        match version {
            #[cfg(feature = "http2")]
            HttpVersion::Http2 => &self.http2,
            _ => &self.http1,
        }
    }
}

/// Blocking single-transfer engine.
struct HyperTransport {
    clients: Clients,
    runtime: Runtime,
}

impl Transport for HyperTransport {
    fn perform(&mut self, handle: &mut TransferHandle) -> Result<TransferInfo, TransportError> {
        self.runtime.block_on(execute(&self.clients, handle))
    }
}

/// Polling multi-transfer engine.
struct HyperMulti {
    tasks: JoinSet<Completion>,
    in_flight: HashMap<TransferId, AbortHandle>,
    completed: VecDeque<Completion>,
    clients: Clients,
    poll_interval: Duration,
    runtime: Runtime,
}

impl MultiTransport for HyperMulti {
    fn add(&mut self, handle: TransferHandle) -> Result<(), RegistrationError> {
        let id = handle.id();
        if self.in_flight.contains_key(&id) {
            return Err(RegistrationError::Duplicate(id));
        }

        let clients = self.clients.clone();
        let abort = self.tasks.spawn_on(
            async move {
                let mut handle = handle;
                let result = execute(&clients, &mut handle).await;
                Completion { handle, result }
            },
            self.runtime.handle(),
        );
        self.in_flight.insert(id, abort);
        tracing::debug!(transfer_id = %id, in_flight = self.in_flight.len(), "Transfer registered");
        Ok(())
    }

    fn remove(&mut self, id: TransferId) -> bool {
        let aborted = match self.in_flight.remove(&id) {
            Some(abort) => {
                abort.abort();
                true
            }
            None => false,
        };
        let queued = self.completed.len();
        self.completed.retain(|completion| completion.handle.id() != id);
        aborted || queued != self.completed.len()
    }

    fn perform(&mut self) -> PerformStatus {
        let mut finished = Vec::new();
        if !self.tasks.is_empty() {
            let poll = self.poll_interval;
            let tasks = &mut self.tasks;
            if let Ok(Some(result)) = self
                .runtime
                .block_on(async move { tokio::time::timeout(poll, tasks.join_next()).await })
            {
                finished.push(result);
            }
        }
        while let Some(result) = self.tasks.try_join_next() {
            finished.push(result);
        }

        for result in finished {
            match result {
                Ok(completion) => {
                    self.in_flight.remove(&completion.handle.id());
                    self.completed.push_back(completion);
                }
                Err(err) if err.is_cancelled() => {
                    tracing::debug!("Removed transfer task cancelled");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Transfer task panicked");
                }
            }
        }

        PerformStatus {
            active: self.tasks.len(),
            call_again: false,
        }
    }

    fn info_read(&mut self) -> Option<Completion> {
        self.completed.pop_front()
    }
}

/// Run one configured transfer, delivering the response through the
/// handle's callbacks.
async fn execute(clients: &Clients, handle: &mut TransferHandle) -> Result<TransferInfo, TransportError> {
    let started = Instant::now();
    let uploaded = Arc::new(AtomicU64::new(0));
    let body = handle.take_body();

    let (client, request, effective_url, method, nobody, max_filesize, timeout) = {
        let config = handle
            .config()
            .ok_or_else(|| TransportError::new("Transfer handle is not configured"))?;

        let options = EngineOptions::parse(&config.options.engine)
            .map_err(|err| TransportError::new(err.to_string()))?;
        let (body, declared_size) = request_body(body, uploaded.clone());
        let mut request = build_request(config, &options, body)?;
        if let Some(size) = declared_size {
            let headers = request.headers_mut();
            if !headers.contains_key(CONTENT_LENGTH) && !headers.contains_key(TRANSFER_ENCODING) {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(size));
            }
        }

        (
            clients.for_version(config.version).clone(),
            request,
            config.url.to_string(),
            config.method.clone(),
            config.nobody,
            options.max_filesize,
            config.options.timeout_ms.map(Duration::from_millis),
        )
    };

    let transfer = receive(&client, request, handle, nobody, max_filesize);
    let (status, version, downloaded) = match timeout {
        Some(limit) => tokio::time::timeout(limit, transfer).await.map_err(|_| {
            TransportError::new(format!(
                "Operation timed out after {} milliseconds",
                limit.as_millis()
            ))
        })??,
        None => transfer.await?,
    };

    let elapsed = started.elapsed();
    tracing::debug!(
        transfer_id = %handle.id(),
        method = %method,
        url = %effective_url,
        status,
        elapsed_ms = elapsed.as_millis() as u64,
        "Transfer finished"
    );

    Ok(TransferInfo {
        effective_url,
        status,
        http_version: version_label(version).to_string(),
        total_time_secs: elapsed.as_secs_f64(),
        bytes_uploaded: uploaded.load(Ordering::Relaxed),
        bytes_downloaded: downloaded,
    })
}

async fn receive(
    client: &HttpClient,
    request: Request<TransferBody>,
    handle: &mut TransferHandle,
    nobody: bool,
    max_filesize: Option<u64>,
) -> Result<(u16, Version, u64), TransportError> {
    let response = client
        .request(request)
        .await
        .map_err(|err| TransportError::new(describe(&err)))?;

    let status = response.status();
    let version = response.version();
    let reason = response
        .extensions()
        .get::<hyper::ext::ReasonPhrase>()
        .and_then(|reason| std::str::from_utf8(reason.as_bytes()).ok())
        .or_else(|| status.canonical_reason())
        .unwrap_or_default()
        .to_string();

    handle.on_header_line(
        format!("{} {} {}\r\n", version_label(version), status.as_u16(), reason).as_bytes(),
    );
    for (name, value) in response.headers() {
        let mut line = Vec::with_capacity(name.as_str().len() + value.len() + 4);
        line.extend_from_slice(name.as_str().as_bytes());
        line.extend_from_slice(b": ");
        line.extend_from_slice(value.as_bytes());
        line.extend_from_slice(b"\r\n");
        handle.on_header_line(&line);
    }
    handle.on_header_line(b"\r\n");

    if nobody {
        return Ok((status.as_u16(), version, 0));
    }

    let too_large = || TransportError::new("Maximum file size exceeded");
    if let Some(limit) = max_filesize {
        let declared = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());
        if declared.is_some_and(|length| length > limit) {
            return Err(too_large());
        }
    }

    let mut body = response.into_body();
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|err| TransportError::new(describe(&err)))?;
        if let Ok(data) = frame.into_data() {
            if max_filesize.is_some_and(|limit| handle.received() + data.len() as u64 > limit) {
                return Err(too_large());
            }
            handle
                .on_body_chunk(&data)
                .map_err(|err| TransportError::new(format!("Failed writing received data: {err}")))?;
        }
    }

    Ok((status.as_u16(), version, handle.received()))
}

/// Convert the body strategy into a hyper body. Streamed bodies return
/// their declared size so it can be sent as `Content-Length`.
fn request_body(strategy: BodyStrategy, uploaded: Arc<AtomicU64>) -> (TransferBody, Option<u64>) {
    match strategy {
        BodyStrategy::None => (Empty::<Bytes>::new().map_err(|never| match never {}).boxed_unsync(), None),
        BodyStrategy::Inline(bytes) => {
            uploaded.store(bytes.len() as u64, Ordering::Relaxed);
            (Full::new(bytes).map_err(|never| match never {}).boxed_unsync(), None)
        }
        BodyStrategy::Streamed(source) => {
            let declared = source.expected_size();
            let frames = stream::unfold(Some(source), move |state| {
                let uploaded = uploaded.clone();
                async move {
                    let mut source = state?;
                    match source.read_chunk() {
                        Ok(Some(chunk)) => {
                            uploaded.fetch_add(chunk.len() as u64, Ordering::Relaxed);
                            Some((Ok(Frame::data(chunk)), Some(source)))
                        }
                        Ok(None) => None,
                        Err(err) => Some((Err(err), None)),
                    }
                }
            });
            (StreamBody::new(frames).boxed_unsync(), declared)
        }
    }
}

/// Turn a transfer configuration into a hyper request.
fn build_request(
    config: &TransferConfig,
    options: &EngineOptions,
    body: TransferBody,
) -> Result<Request<TransferBody>, TransportError> {
    let mut request = Request::new(body);
    *request.method_mut() = config.method.clone();
    *request.uri_mut() = config.url.clone();
    *request.version_mut() = config.version.as_version();

    let headers = request.headers_mut();
    for line in &config.header_lines {
        let shown = || String::from_utf8_lossy(line).into_owned();
        let Some((name, value)) = split_header_line(line) else {
            return Err(TransportError::new(format!("Malformed header line '{}'", shown())));
        };
        // An empty value suppresses the header.
        if value.is_empty() {
            continue;
        }
        let name = HeaderName::from_bytes(name)
            .map_err(|err| TransportError::new(format!("Invalid header name in '{}': {err}", shown())))?;
        let value = HeaderValue::from_bytes(value)
            .map_err(|err| TransportError::new(format!("Invalid header value in '{}': {err}", shown())))?;
        headers.append(name, value);
    }

    if let Some(credentials) = &config.credentials {
        if !headers.contains_key(AUTHORIZATION) {
            let value = HeaderValue::from_str(&credentials.basic_authorization())
                .map_err(|err| TransportError::new(format!("Invalid credentials: {err}")))?;
            headers.insert(AUTHORIZATION, value);
        }
    }
    if let Some(referer) = &options.referer {
        if !headers.contains_key(REFERER) {
            headers.insert(REFERER, referer.clone());
        }
    }
    if let Some(agent) = &config.options.user_agent {
        if !headers.contains_key(USER_AGENT) {
            let value = HeaderValue::from_str(agent)
                .map_err(|err| TransportError::new(format!("Invalid user agent: {err}")))?;
            headers.insert(USER_AGENT, value);
        }
    }

    Ok(request)
}

/// Error message including every source in the chain.
fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

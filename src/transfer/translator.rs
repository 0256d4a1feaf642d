//! Request → transfer configuration.
//!
//! # Responsibilities
//! - Merge per-call overrides over client defaults
//! - Map the request's protocol version onto what the engine can speak
//! - Pick the body strategy (none / inline / streamed)
//! - Synthesize header lines (`Transfer-Encoding`, `Expect`)
//! - Lift URL credentials into a separate auth option
//!
//! # Body Strategy
//! ```text
//! GET / HEAD / TRACE / CONNECT      → no body (HEAD also reads no response body)
//! other, size known and <= 1 MiB    → inline buffer, sent verbatim
//! other, size unknown or > 1 MiB    → rewind if seekable, streamed upload
//! ```
//!
//! # Design Decisions
//! - Version errors surface here, before any network activity
//! - The upload wiring is always derived from the request itself

use http::{Method, Request, Uri, Version};

use crate::error::ConfigurationError;
use crate::http::body::Body;
use crate::http::request::{without_userinfo, RequestHead};
use crate::transfer::config::{
    BodyStrategy, Credentials, HttpVersion, TransferConfig, UploadSource, DEFAULT_UPLOAD_CHUNK,
};
use crate::transfer::options::TransferOptions;

/// Bodies up to this size are buffered and sent as one field.
pub const MAX_INLINE_BODY: u64 = 1024 * 1024;

/// Builds transfer configurations against client-level defaults.
#[derive(Debug, Clone)]
pub struct Translator {
    defaults: TransferOptions,
    http2_supported: bool,
}

impl Translator {
    pub fn new(defaults: TransferOptions, http2_supported: bool) -> Self {
        Self {
            defaults,
            http2_supported,
        }
    }

    pub fn defaults(&self) -> &TransferOptions {
        &self.defaults
    }

    /// Build the configuration for one request. Consumes the request; its
    /// head is returned as a snapshot for diagnostics.
    pub fn build(
        &self,
        request: Request<Body>,
        overrides: &TransferOptions,
    ) -> Result<(TransferConfig, RequestHead), ConfigurationError> {
        let version = map_version(request.version(), self.http2_supported)?;
        let options = self.defaults.merge(overrides);
        let head = RequestHead::from_request(&request);

        let (url, credentials) = split_credentials(request.uri())?;
        let (parts, mut body) = request.into_parts();
        let size = body.size();
        let seekable = body.is_seekable();
        let method = parts.method;

        let mut header_lines = Vec::with_capacity(parts.headers.len() + 2);
        for (name, value) in parts.headers.iter() {
            let mut line = Vec::with_capacity(name.as_str().len() + value.len() + 2);
            line.extend_from_slice(name.as_str().as_bytes());
            line.extend_from_slice(b": ");
            line.extend_from_slice(value.as_bytes());
            header_lines.push(line);
        }

        let nobody = method == Method::HEAD;
        let strategy = if carries_no_body(&method) {
            BodyStrategy::None
        } else {
            match size {
                Some(size) if size <= MAX_INLINE_BODY => {
                    BodyStrategy::Inline(body.into_bytes().map_err(ConfigurationError::BodyRead)?)
                }
                _ => {
                    if seekable {
                        body.rewind().map_err(ConfigurationError::BodyRead)?;
                    }
                    let chunk_size = options.upload_chunk_size.unwrap_or(DEFAULT_UPLOAD_CHUNK);
                    BodyStrategy::Streamed(
                        UploadSource::new(body.into_reader(), chunk_size).with_expected_size(size),
                    )
                }
            }
        };

        if !parts.headers.contains_key(http::header::TRANSFER_ENCODING) && size.is_none() {
            header_lines.push(b"Transfer-Encoding: chunked".to_vec());
        }

        if !parts.headers.contains_key(http::header::EXPECT)
            && (method == Method::POST || method == Method::PUT)
        {
            let pre_h2 = parts.version < Version::HTTP_2;
            let large = size.map_or(true, |size| size > MAX_INLINE_BODY);
            if (pre_h2 && !seekable) || large {
                header_lines.push(b"Expect: 100-Continue".to_vec());
            } else {
                header_lines.push(b"Expect: ".to_vec());
            }
        }

        tracing::debug!(
            method = %method,
            url = %url,
            version = ?version,
            body_size = ?size,
            streamed = matches!(strategy, BodyStrategy::Streamed(_)),
            "Built transfer configuration"
        );

        let config = TransferConfig {
            method,
            url,
            version,
            header_lines,
            body: strategy,
            nobody,
            credentials,
            options,
        };
        Ok((config, head))
    }
}

fn carries_no_body(method: &Method) -> bool {
    matches!(method.as_str(), "GET" | "HEAD" | "TRACE" | "CONNECT")
}

/// Map a request version onto an engine protocol version.
pub fn map_version(version: Version, http2_supported: bool) -> Result<HttpVersion, ConfigurationError> {
    match version {
        Version::HTTP_11 => Ok(HttpVersion::Http11),
        Version::HTTP_2 if http2_supported => Ok(HttpVersion::Http2),
        Version::HTTP_2 => Err(ConfigurationError::UnsupportedVersion {
            version: "2.0".to_string(),
        }),
        _ => Ok(HttpVersion::Http10),
    }
}

/// Strip `user:pass@` from the URL, returning the credentials separately.
fn split_credentials(uri: &Uri) -> Result<(Uri, Option<Credentials>), ConfigurationError> {
    let has_userinfo = uri
        .authority()
        .is_some_and(|authority| authority.as_str().contains('@'));
    if !has_userinfo {
        return Ok((uri.clone(), None));
    }

    let invalid = |reason: String| ConfigurationError::InvalidUrl {
        url: without_userinfo(uri).to_string(),
        reason,
    };

    let mut url = url::Url::parse(&uri.to_string()).map_err(|e| invalid(e.to_string()))?;
    let credentials = Credentials {
        username: url.username().to_string(),
        password: url.password().map(str::to_string),
    };
    url.set_username("")
        .map_err(|_| invalid("cannot strip username".to_string()))?;
    url.set_password(None)
        .map_err(|_| invalid("cannot strip password".to_string()))?;

    let stripped = url
        .as_str()
        .parse::<Uri>()
        .map_err(|e| invalid(e.to_string()))?;
    Ok((stripped, Some(credentials)))
}

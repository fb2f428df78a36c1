//! Status probe logic.

use std::sync::Arc;
use std::time::Duration;

use http::Uri;
use http_body_util::BodyExt;
use oms_core::{AppStatus, keys};
use oms_state::ConfigLookup;
use tracing::{debug, warn};

use crate::error::{ProbeError, ProbeResult};

/// Resolves and probes application liveness.
#[derive(Clone)]
pub struct StatusProber {
    lookup: Arc<dyn ConfigLookup>,
    local_port: u16,
    timeout: Duration,
}

impl StatusProber {
    /// `local_port` is the port this process listens on; access URLs that
    /// point at it are answered without a network call.
    pub fn new(lookup: Arc<dyn ConfigLookup>, local_port: u16, timeout: Duration) -> Self {
        Self {
            lookup,
            local_port,
            timeout,
        }
    }

    /// Liveness of `app_key`, or of this process when no key is given.
    pub async fn status(&self, app_key: Option<&str>) -> ProbeResult<AppStatus> {
        let app_key = match app_key.map(str::trim) {
            Some(k) if !k.is_empty() => k,
            _ => return Ok(AppStatus::up()),
        };

        let key = keys::access_url(app_key);
        let access_url = match self.lookup.lookup(&key)? {
            Some(v) if !v.trim().is_empty() => v.trim().to_string(),
            _ => return Err(ProbeError::ConfigMissing(key)),
        };
        let uri = parse_access_url(&key, &access_url)?;

        if uri.port_u16() == Some(self.local_port) {
            debug!(%app_key, port = self.local_port, "access url points at self");
            return Ok(AppStatus::up());
        }

        let status = http_status_probe(&uri, self.timeout).await;
        if !status.status {
            warn!(%app_key, url = %access_url, "app reported down or unreachable");
        }
        Ok(status)
    }
}

/// Validate an access URL of the form `scheme://host:port[/path]`.
///
/// The value must contain exactly two `:` separators and carry an explicit
/// numeric port.
fn parse_access_url(key: &str, value: &str) -> ProbeResult<Uri> {
    let malformed = || ProbeError::ConfigMalformed {
        key: key.to_string(),
        value: value.to_string(),
    };
    if value.split(':').count() != 3 {
        return Err(malformed());
    }
    let uri: Uri = value.parse().map_err(|_| malformed())?;
    if uri.host().is_none() || uri.port_u16().is_none() {
        return Err(malformed());
    }
    Ok(uri)
}

/// GET `uri` and decode the peer's [`AppStatus`].
///
/// Never fails: any transport, protocol, or decoding problem yields
/// `status = false`.
pub async fn http_status_probe(uri: &Uri, timeout: Duration) -> AppStatus {
    if uri.scheme_str() != Some("http") {
        warn!(%uri, "only plain http access urls can be probed");
        return AppStatus::down();
    }
    let Some(authority) = uri.authority().map(|a| a.as_str().to_string()) else {
        return AppStatus::down();
    };
    let path = uri.path_and_query().map_or("/", |p| p.as_str()).to_string();

    let result = tokio::time::timeout(timeout, async {
        let stream = match tokio::net::TcpStream::connect(&authority).await {
            Ok(s) => s,
            Err(e) => {
                debug!(error = %e, %uri, "status probe connection failed");
                return AppStatus::down();
            }
        };

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
            Ok(pair) => pair,
            Err(e) => {
                debug!(error = %e, %uri, "status probe handshake failed");
                return AppStatus::down();
            }
        };

        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = match http::Request::builder()
            .method("GET")
            .uri(path.as_str())
            .header("host", authority.as_str())
            .header("user-agent", "oms-health/0.1")
            .header("accept", "application/json")
            .body(http_body_util::Empty::<bytes::Bytes>::new())
        {
            Ok(req) => req,
            Err(e) => {
                debug!(error = %e, %uri, "status probe request invalid");
                return AppStatus::down();
            }
        };

        let resp = match sender.send_request(req).await {
            Ok(resp) => resp,
            Err(e) => {
                debug!(error = %e, %uri, "status probe request failed");
                return AppStatus::down();
            }
        };

        if !resp.status().is_success() {
            debug!(status = %resp.status(), %uri, "status probe non-2xx");
            return AppStatus::down();
        }

        let body = match resp.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                debug!(error = %e, %uri, "status probe body read failed");
                return AppStatus::down();
            }
        };

        match serde_json::from_slice::<AppStatus>(&body) {
            Ok(status) => status,
            Err(e) => {
                debug!(error = %e, %uri, "status probe body is not an app status");
                AppStatus::down()
            }
        }
    })
    .await;

    match result {
        Ok(status) => status,
        Err(_) => {
            debug!(%uri, ?timeout, "status probe timed out");
            AppStatus::down()
        }
    }
}

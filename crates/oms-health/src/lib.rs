//! oms-health: liveness probing for OMS-managed applications.
//!
//! A probe without an app key reports this process as alive. With an app
//! key, the peer's base URL is read from `<APPKEY>_ACCESS_URL`; if its port
//! is our own listening port the probe short-circuits to `true`, otherwise
//! the peer is asked over HTTP and its `{"status": bool}` reply is passed
//! through.
//!
//! Probes are best-effort: connection errors, timeouts, non-2xx replies and
//! undecodable bodies all read as `status = false`. Only configuration
//! problems are reported as errors.

pub mod error;
pub mod prober;

pub use error::{ProbeError, ProbeResult};
pub use prober::{StatusProber, http_status_probe};

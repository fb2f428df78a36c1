//! OMS deployment engine.
//!
//! Uploaded packages are stored as-is; an upgrade unpacks one of them into
//! the application's install directory and restarts the application.
//!
//! # Components
//!
//! - **`package`**: upload, paging, and lookup of stored packages
//! - **`staging`**: filesystem side of an upgrade (sentinel check, extract,
//!   merge into `lib/`, swap)
//! - **`engine`**: the serialized upgrade procedure
//!
//! ```text
//! upgrade(id)
//!   ├─ record + config lookup
//!   ├─ sentinel check           (no mutation before this passes)
//!   ├─ .oms-staging-*/          archive, extracted/, lib/ (merged copy)
//!   ├─ rename swap into lib/
//!   ├─ tag flip                 (one store transaction)
//!   └─ ProcessController::operate(type, RESTART)
//! ```

pub mod engine;
pub mod error;
pub mod package;
pub mod staging;

pub use engine::{UpgradeEngine, UpgradeReport};
pub use error::{DeployError, DeployResult};
pub use package::{PackageStore, PackageUpload};
pub use staging::InstallOutcome;

/// Run blocking store or filesystem work on the blocking pool.
pub(crate) async fn run_blocking<T, F>(f: F) -> DeployResult<T>
where
    F: FnOnce() -> DeployResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DeployError::Join(e.to_string()))?
}

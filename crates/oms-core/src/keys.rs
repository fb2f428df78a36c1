//! Configuration-key naming conventions.
//!
//! Keys are formed by appending a fixed suffix to the application type as
//! given, e.g. `WCS` + `_INSTALL_PATH`.

use thiserror::Error;

pub const INSTALL_PATH: &str = "_INSTALL_PATH";
pub const DEPLOY_SHELL: &str = "_DEPLOY_SHELL";
pub const ACCESS_URL: &str = "_ACCESS_URL";

/// `<TYPE>_INSTALL_PATH`: directory holding the application's files.
pub fn install_path(app_type: &str) -> String {
    format!("{app_type}{INSTALL_PATH}")
}

/// `<TYPE>_DEPLOY_SHELL`: deploy script path.
pub fn deploy_shell(app_type: &str) -> String {
    format!("{app_type}{DEPLOY_SHELL}")
}

/// `<APPKEY>_ACCESS_URL`: base URL used to probe a peer, e.g.
/// `http://127.0.0.1:8089`.
pub fn access_url(app_key: &str) -> String {
    format!("{app_key}{ACCESS_URL}")
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidAppKey {
    #[error("app key is required")]
    Missing,
    #[error("app key {0:?} contains characters not allowed in a unit name")]
    Characters(String),
}

/// Check an application key before it is used to build config keys or a
/// service unit name. Only characters valid in a systemd unit name pass.
/// Returns the trimmed key.
pub fn validate_app_key(app_key: &str) -> Result<&str, InvalidAppKey> {
    let key = app_key.trim();
    if key.is_empty() {
        return Err(InvalidAppKey::Missing);
    }
    let valid = key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'));
    if !valid {
        return Err(InvalidAppKey::Characters(key.to_string()));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_append_suffix_verbatim() {
        assert_eq!(install_path("WCS"), "WCS_INSTALL_PATH");
        assert_eq!(deploy_shell("WCS"), "WCS_DEPLOY_SHELL");
        assert_eq!(access_url("wms"), "wms_ACCESS_URL");
    }

    #[test]
    fn app_key_charset() {
        assert_eq!(validate_app_key(" WCS "), Ok("WCS"));
        assert_eq!(validate_app_key("wms-2@blue.v1_a"), Ok("wms-2@blue.v1_a"));
        assert_eq!(validate_app_key("  "), Err(InvalidAppKey::Missing));
        for bad in ["WCS APP", "wcs;reboot", "../wcs", "wcs$(id)"] {
            assert!(
                matches!(validate_app_key(bad), Err(InvalidAppKey::Characters(_))),
                "{bad}"
            );
        }
    }
}

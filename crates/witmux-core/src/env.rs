//! Child environment construction for backends without per-session env.

use std::collections::BTreeMap;
use std::ffi::OsString;

use crate::types::EnvironmentOverlay;

/// Inherit the current process environment and overlay `overlay` on top.
///
/// Overlay entries replace inherited values of the same name; everything else
/// passes through untouched.
pub fn build_env(overlay: &EnvironmentOverlay) -> BTreeMap<OsString, OsString> {
    let mut env: BTreeMap<OsString, OsString> = std::env::vars_os().collect();
    for (key, value) in overlay {
        env.insert(OsString::from(key), OsString::from(value));
    }
    env
}

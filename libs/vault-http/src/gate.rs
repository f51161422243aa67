//! Debug gate: decides whether diagnostics may be attached to a problem document.

use std::net::IpAddr;

use http::{HeaderMap, HeaderName};

use crate::config::{EnvMode, Settings};

/// Core decision.
///
/// - `disabled` always wins.
/// - development: the caller must be allowed.
/// - production/test: the opt-in header must be set and the caller must be allowed.
#[must_use]
pub fn should_show_debug(
    mode: EnvMode,
    is_allowed_caller: bool,
    header_present: bool,
    disabled: bool,
) -> bool {
    if disabled {
        return false;
    }
    match mode {
        EnvMode::Development => is_allowed_caller,
        EnvMode::Production | EnvMode::Test => header_present && is_allowed_caller,
    }
}

/// `should_show_debug` bound to the configured header and allow-list.
#[derive(Debug, Clone)]
pub struct DebugGate {
    mode: EnvMode,
    header: HeaderName,
    allow_list: Vec<IpAddr>,
    disabled: bool,
}

impl DebugGate {
    #[must_use]
    pub fn new(mode: EnvMode, header: HeaderName, allow_list: Vec<IpAddr>, disabled: bool) -> Self {
        Self {
            mode,
            header,
            allow_list: allow_list.into_iter().map(|ip| ip.to_canonical()).collect(),
            disabled,
        }
    }

    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.env,
            settings.debug_header.clone(),
            settings.allow_list.clone(),
            settings.disable_debug,
        )
    }

    /// An empty allow-list admits everyone, but only in development.
    #[must_use]
    pub fn is_allowed_caller(&self, caller: Option<IpAddr>) -> bool {
        if self.allow_list.is_empty() {
            return self.mode == EnvMode::Development;
        }
        caller.is_some_and(|ip| self.allow_list.contains(&ip.to_canonical()))
    }

    /// Whether the request opted in via the debug header ("1" or "true").
    #[must_use]
    pub fn header_opt_in(&self, headers: &HeaderMap) -> bool {
        headers
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| matches!(v.trim(), "1" | "true"))
    }

    #[must_use]
    pub fn evaluate(&self, caller: Option<IpAddr>, header_opt_in: bool) -> bool {
        should_show_debug(
            self.mode,
            self.is_allowed_caller(caller),
            header_opt_in,
            self.disabled,
        )
    }
}

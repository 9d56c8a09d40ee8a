//! # Route Guard
//!
//! Decides whether a protected screen may render for the current auth state.
//! Rules apply in order: loading, unauthenticated, role mismatch, allow.
//!
//! The role check reads the profile role only. The token-claim fallback used by
//! [`AuthState::has_role`] is deliberately not consulted here.

use crate::config::AppConfig;
use crate::models::Role;
use crate::session_store::AuthState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Auth state not settled; show a neutral loading indicator
    Loading,
    /// Not signed in; redirect to the sign-in screen
    RedirectToLogin(String),
    /// Signed in without the required role; redirect to the landing screen
    RedirectToDefault(String),
    Allow,
}

impl GuardDecision {
    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            GuardDecision::RedirectToLogin(path) | GuardDecision::RedirectToDefault(path) => {
                Some(path)
            }
            GuardDecision::Loading | GuardDecision::Allow => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGuard {
    login_path: String,
    default_path: String,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl RouteGuard {
    pub fn new(login_path: impl Into<String>, default_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
            default_path: default_path.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.login_path, &config.default_landing_path)
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn default_path(&self) -> &str {
        &self.default_path
    }

    pub fn evaluate(&self, state: &AuthState, required_role: Option<Role>) -> GuardDecision {
        if state.loading {
            return GuardDecision::Loading;
        }

        if !state.is_authenticated() {
            return GuardDecision::RedirectToLogin(self.login_path.clone());
        }

        if let Some(required) = required_role
            && state.profile_role() != Some(required)
        {
            return GuardDecision::RedirectToDefault(self.default_path.clone());
        }

        GuardDecision::Allow
    }
}

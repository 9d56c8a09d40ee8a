//! # Authentication and Authorization
//!
//! Session lifecycle, profile/role resolution, and route guarding for the
//! dashboard client.

pub mod controller;
pub mod guard;
pub mod provider;
pub mod routes;
pub mod token;

pub use controller::{AuthController, AuthListener, ProfileFetch};
pub use guard::{GuardDecision, RouteGuard};
pub use provider::{IdentityProvider, LocalIdentityProvider, ProfileSource};
pub use routes::{NavItem, Navigation, navigate, navigation_for};
pub use token::{TokenClaims, decode_claims, parse_role_from_token, session_from_token};

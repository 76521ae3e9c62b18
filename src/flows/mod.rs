//! Login Flows
//!
//! The Authorization Code + PKCE engine and its provider variants:
//!
//! - **OAuth2** (RFC 6749 Section 4.1 with RFC 7636 PKCE)
//! - **OpenID Connect**: adds `nonce` and requires an ID token

pub mod authorization_code;
pub mod oauth2;
pub mod openid;
pub mod variant;

pub use authorization_code::{cancel_on_ctrl_c, AuthorizationCodeFlow, FlowState};
pub use oauth2::OAuth2Flow;
pub use openid::OpenIdFlow;
pub use variant::FlowVariant;

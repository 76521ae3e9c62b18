//! Core Components
//!
//! PKCE, state, transport, the loopback listener, browser launch, token
//! exchange and response validation.

pub mod browser;
pub mod exchange;
pub mod listener;
pub mod pkce;
pub mod state;
pub mod transport;
pub mod validation;

pub use browser::*;
pub use exchange::*;
pub use listener::*;
pub use pkce::*;
pub use state::*;
pub use transport::*;
pub use validation::*;

//! Edge Gateway - authentication, credential refresh and dispatch at the edge.
//!
//! Every inbound request is classified against the exemption policy, its
//! bearer credential is verified locally, an expired credential is refreshed
//! through the identity service when the caller presents a usable refresh
//! credential, privileged paths are role-checked, and allowed requests are
//! forwarded to the backend their path routes to.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod filter;
pub mod guard;
pub mod identity;
pub mod jwt;
pub mod middleware;
pub mod observability;
pub mod policy;
pub mod proxy;
pub mod refresh;
pub mod responder;
pub mod server;
pub mod shutdown;

pub use config::{Config, ConfigError};
pub use error::{ErrorCode, GatewayError};
pub use filter::{AuthOutcome, EdgeFilter, RequestView};
pub use identity::{HttpIdentityClient, IdentityClient, TokenPair};
pub use policy::GatewayPolicy;
pub use responder::ErrorStatus;
pub use server::{AppState, build_router};

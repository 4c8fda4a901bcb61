//! X OAuth 2.0 authorization-code flow with PKCE.

pub mod flow;
pub mod janitor;
pub mod pkce;

pub use flow::{
    AuthUrl, AuthUrlOptions, CallbackResult, StateStats, StateSummary, XOAuthFlowManager,
    XOAuthTokens,
};
pub use janitor::StateJanitor;

pub mod auth;
pub mod metrics;

pub use auth::{auth_middleware, optional_auth_middleware, AuthUser, MaybeAuthUser};
pub use metrics::metrics_middleware;

//! Session and role handling for the automation portal.
//!
//! [`services::session::SessionController`] exchanges the identity
//! provider's encrypted login token for a session credential, resolves the
//! signed-in [`models::user::User`] from the backend, and attaches the
//! credential to every backend call. [`router::build_router`] serves it to
//! browsers with the credential kept in an HTTP-only cookie.

pub mod access;
pub mod config;
pub mod credentials;
pub mod error;
pub mod router;
pub mod state;

pub mod crypto {
    pub mod aes;
}

pub mod models {
    pub mod session;
    pub mod user;
}

pub mod services {
    pub mod session;
    pub mod tasks;
}

pub mod handlers {
    pub mod auth;
    pub mod tasks;
}

pub mod middleware_layer {
    pub mod auth;
}

pub use error::{AppError, Result};

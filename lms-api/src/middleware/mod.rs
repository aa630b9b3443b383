/// Middleware modules for the API server
///
/// - `auth`: resolves the request actor from a Bearer token
/// - `security`: security response headers

pub mod auth;
pub mod security;

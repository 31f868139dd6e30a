//! Accounts and sessions: bcrypt passwords, HS256 bearer tokens, the request
//! guard that resolves the acting user, and the `/api/auth` endpoints.

pub mod guard;
pub mod handlers;
pub mod password;
pub mod profile;
pub mod token;

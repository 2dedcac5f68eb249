pub mod client;
pub mod error;
pub mod oauth;
pub mod pkce;

pub use client::{TokenResponse, TwitterClient, TwitterUser};
pub use error::TwitterError;

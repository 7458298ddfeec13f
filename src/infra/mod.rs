pub mod auth;
pub mod network;

//! Consent HTTP Plugin
//!
//! [`HttpTransport`](consent_sdk::HttpTransport) on top of `reqwest` with
//! rustls. The consent module builds complete requests; this plugin sends
//! them and hands back status and body.

pub mod config;
pub mod transport;

pub use config::TransportConfig;
pub use transport::ReqwestTransport;

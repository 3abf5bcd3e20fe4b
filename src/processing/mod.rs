//! The Gesuch processing core: outbound microservice client, synchronous
//! fallback path, webhook signature verification, and idempotent webhook
//! payload application.

pub mod client;
pub mod fallback;
pub mod signature;
pub mod webhooks;

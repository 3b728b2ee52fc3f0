pub mod credential_codec;
pub mod health_service;
pub mod ip_notifier;
pub mod rate_limit_service;
pub mod token_service;
pub mod token_store;

pub mod refresh_token_store;

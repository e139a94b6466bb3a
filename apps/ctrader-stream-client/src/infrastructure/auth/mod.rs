//! Credential adapters: the HTTP token exchange and the durable store.

pub mod store;
pub mod token;

pub use store::FileCredentialStore;
pub use token::HttpTokenExchange;

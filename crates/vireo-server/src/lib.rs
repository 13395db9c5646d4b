pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod pagination;
pub mod query;
pub mod request;
pub mod request_meta;
pub mod respond;
pub mod sanitize;
pub mod security;
pub mod state;
pub mod validate;

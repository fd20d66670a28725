pub mod auth;

pub use auth::{create_token, hash_pin, is_valid_pin, verify_pin, verify_token};

pub mod auth_error;
pub mod token_codec;

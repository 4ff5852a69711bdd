pub mod blacklist_entry;
pub mod device;
pub mod refresh_token;
pub mod session;
pub mod user;

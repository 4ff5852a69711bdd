pub mod dtos;
pub mod ports;
pub mod services;

// Re-exportaciones para facilitar el acceso a los principales puertos
pub use ports::auth_ports::{BlacklistStoragePort, SessionEventPort, SessionStoragePort, UserStoragePort};

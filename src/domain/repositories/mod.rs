pub mod blacklist_repository;
pub mod session_repository;

mod blacklist_pg_repository;
mod session_pg_repository;
mod user_pg_repository;

pub use blacklist_pg_repository::BlacklistPgRepository;
pub use session_pg_repository::SessionPgRepository;
pub use user_pg_repository::UserPgRepository;

pub mod session_dto;
pub mod user_dto;

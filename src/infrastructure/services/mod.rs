pub mod expiry_sweeper;
pub mod session_event_notifier;

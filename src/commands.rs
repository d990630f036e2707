pub mod archive;
pub mod handle_event;
pub mod triggers;

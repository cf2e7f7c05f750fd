pub mod event;
pub mod origin;
pub mod punch_kind;

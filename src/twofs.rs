pub mod block;
pub mod chain;
pub mod errno;
pub mod fs;
pub mod layout;
pub mod path;
pub mod twofs;

// vim:ts=2 sw=2

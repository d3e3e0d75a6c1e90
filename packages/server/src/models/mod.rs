pub mod code;
pub mod shared;
pub mod task;
pub mod theory;

pub mod code;
pub mod task;
pub mod theory;

mod code;
mod common;
mod theory;

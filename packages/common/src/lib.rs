pub mod attempt_status;
pub mod catalog;
pub mod exec_class;
pub mod retry;
pub mod review_answer;

pub use attempt_status::AttemptStatus;
pub use catalog::{Difficulty, UserRole};
pub use exec_class::ExecClass;
pub use review_answer::ReviewAnswer;

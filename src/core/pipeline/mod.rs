pub mod grading;
pub mod judging;
pub mod polling;

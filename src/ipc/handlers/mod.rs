pub mod assignments;
pub mod core;
pub mod courses;
pub mod grades;
pub mod lectures;
pub mod modules;
pub mod progress;

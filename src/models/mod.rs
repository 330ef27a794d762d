pub mod attendance;
pub mod department;
pub mod document;
pub mod employee;
pub mod help;
pub mod leave;
pub mod notification;
pub mod salary;
pub mod settings;
pub mod task_report;
pub mod user;

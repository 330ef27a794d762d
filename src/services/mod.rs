pub mod attendance;
pub mod leave;
pub mod payroll;
pub mod task_report;
pub mod tax;

pub mod logger;
pub mod report_logger;
pub mod result;

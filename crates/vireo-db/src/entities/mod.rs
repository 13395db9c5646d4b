pub mod activity_logs;
pub mod customers;
pub mod users;

pub mod activity;
pub mod customers;

pub mod activity;
pub mod principal;
pub mod token;

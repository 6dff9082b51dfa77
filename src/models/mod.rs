pub mod bank_account;
pub mod booking;
pub mod dispute;
pub mod user;
pub mod wallet;
pub mod withdrawal;

pub mod alarm;
pub mod assignment;
pub mod chainage;
pub mod log_entry;
pub mod message;
pub mod verification;

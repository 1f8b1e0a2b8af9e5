pub mod error;
pub mod requests;

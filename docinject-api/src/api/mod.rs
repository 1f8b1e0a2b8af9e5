pub mod docs;
pub mod memory;
pub mod status;

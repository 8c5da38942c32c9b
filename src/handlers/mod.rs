// Handler modules
pub mod generate;
pub mod topology;

// Re-export all handler functions
pub use generate::{handle_generate, handle_validate};
pub use topology::handle_topology;

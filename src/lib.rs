// Trellis - declarative REST resource trees for Rust
//
// Describe resources once; routing, content negotiation, conditional
// requests, pagination and link expansion follow from the description.

// Re-export core functionality
pub use trellis_core::*;

// Re-export optional crates
#[cfg(feature = "config")]
pub use trellis_config;

#[cfg(feature = "testing")]
pub use trellis_testing;

// Prelude for common imports
pub mod prelude {
    pub use trellis_core::prelude::*;

    #[cfg(feature = "config")]
    pub use trellis_config::{ConfigBuilder, ConfigManager, TrellisConfig};
}

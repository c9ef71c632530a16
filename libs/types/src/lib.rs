//! Types library for the simulated exchange matching core
//!
//! Provides the type definitions shared by every service crate: identifiers,
//! integer price/volume newtypes, the order lifecycle, book-level change
//! events, and the command outcome taxonomy.
//!
//! # Modules
//! - `ids`: Unique identifiers (OrderId, UserId, Ticker)
//! - `numeric`: Integer price and volume types
//! - `order`: Order lifecycle types
//! - `events`: Book-level change events
//! - `errors`: Command outcome taxonomy

pub mod errors;
pub mod events;
pub mod ids;
pub mod numeric;
pub mod order;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::errors::*;
    pub use crate::events::*;
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::order::*;
}

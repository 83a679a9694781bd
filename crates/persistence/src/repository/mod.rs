//! Repository implementations for database operations

pub mod analysis;
pub mod prices;
pub mod stocks;

pub use analysis::*;
pub use prices::*;
pub use stocks::*;

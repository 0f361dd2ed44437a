pub mod errors;
pub mod location_registry;
pub mod messages;
pub mod st_model;
pub mod trade_planner;
mod trading;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_objects;

pub use errors::*;
pub use location_registry::*;
pub use messages::*;
pub use st_model::*;
pub use trade_planner::*;
pub use trading::*;

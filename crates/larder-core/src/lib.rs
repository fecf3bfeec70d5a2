//! Domain logic for larder: preference scoring, weekly plan generation,
//! grocery aggregation and the parent approval workflow.

pub mod actor;
pub mod approval;
pub mod catalog;
pub mod error;
pub mod external;
pub mod feedback;
pub mod grocery;
pub mod ingest;
pub mod lock;
pub mod notify;
pub mod planner;
pub mod preference;
pub mod recipes;
pub mod seasonal;
pub mod sync;
pub mod week;

pub use actor::{Actor, ParentCapability};
pub use catalog::Catalog;
pub use error::{LarderError, Result};
pub use week::IsoWeek;

pub mod error;
pub mod extract;
pub mod numeric;
pub mod report;
pub mod rows;
pub mod token;

pub use error::{ExtractError, Result};
pub use extract::analyze;
pub use report::{ErrorReport, Report};
pub use token::{pages_from_json, Page, PositionedToken};

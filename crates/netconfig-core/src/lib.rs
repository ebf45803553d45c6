pub mod config;
pub mod device;
pub mod diff;
pub mod directive;
pub mod error;
pub mod io;
pub mod options;
pub mod paths;
pub mod registry;
pub mod render;
pub mod timer;
pub mod timespec;
pub mod types;
pub mod workflow;

pub use error::{ErrorKind, NetconfigError, Result};
pub use types::{ChangeRequest, OutcomeRecord};
pub use workflow::{FireOutcome, FireReport, Workflow};

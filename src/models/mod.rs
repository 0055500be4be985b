pub mod hook;
pub mod release;
pub mod usage;

pub use hook::SessionContext;
pub use release::{ReleaseStatus, Updates};
pub use usage::{ExtraCredit, UsageSnapshot};

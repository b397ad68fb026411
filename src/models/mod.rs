pub mod account;
pub mod case;

// re-export types from parent modules
pub use account::{AccountProfile, LoginPin, PendingRegistration, UserAccount};
pub use case::{CaseRecord, CaseStatus};

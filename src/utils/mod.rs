pub mod crypto; // Password hashing and code generation
pub mod time;
pub mod validator; // Input validation helpers

pub use time::{Clock, ManualClock, SystemClock};

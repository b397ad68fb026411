// Module declarations
pub mod auth_service;
pub mod case_service;
pub mod email_service;

// Public re-exports
pub use auth_service::{AuthService, AuthSession, CodeReceipt};
pub use case_service::{CaseService, CaseStatistics, CaseSummary};
pub use email_service::{EmailDispatcher, EmailError, MemoryMailer, SmtpMailer};

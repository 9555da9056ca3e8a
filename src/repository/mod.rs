//! Data access layer (Repository pattern)

pub mod credential;
pub mod job;
pub mod receipt;

pub use credential::CredentialRepository;
pub use job::JobRepository;
pub use receipt::ReceiptRepository;

//! Business logic layer

pub mod dispatch;
pub mod login;
pub mod worker;

pub use dispatch::{DispatchOutcome, EmailDispatcher};
pub use login::{IssuedSession, LoginService};
pub use worker::JobWorker;

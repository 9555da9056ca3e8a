//! Email sending for Assure Core
//!
//! Transport lives behind the `EmailProvider` trait; templates are rendered
//! with simple `{{variable}}` substitution before a message reaches the
//! provider.

pub mod provider;
pub mod smtp;
pub mod templates;

pub use provider::{EmailProvider, EmailProviderError};
pub use smtp::SmtpEmailProvider;
pub use templates::{EmailTemplate, RenderedEmail, TemplateEngine};

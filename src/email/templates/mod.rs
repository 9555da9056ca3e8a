//! Email template system
//!
//! Simple variable substitution with {{variable_name}} syntax. Each job
//! type maps to exactly one template; the match in `render_job` is
//! exhaustive, so a new job type will not compile without one.

use crate::domain::EmailJob;
use std::collections::HashMap;

/// Available email templates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailTemplate {
    /// Email address verification
    Verification,
    /// Password reset link
    PasswordReset,
    /// Post-signup welcome
    Welcome,
    /// Account locked after repeated failed logins
    AccountLocked,
    /// Invitation to join an office
    Invitation,
}

impl EmailTemplate {
    /// Get the subject line for this template
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Verification => "Verify your email address",
            Self::PasswordReset => "Reset your password",
            Self::Welcome => "Welcome to Assure",
            Self::AccountLocked => "Your account has been locked",
            Self::Invitation => "{{inviter_name}} has invited you to Assure",
        }
    }

    /// Get the HTML body template
    pub fn html_body(&self) -> &'static str {
        match self {
            Self::Verification => VERIFICATION_HTML,
            Self::PasswordReset => PASSWORD_RESET_HTML,
            Self::Welcome => WELCOME_HTML,
            Self::AccountLocked => ACCOUNT_LOCKED_HTML,
            Self::Invitation => INVITATION_HTML,
        }
    }

    /// Get the plain text body template
    pub fn text_body(&self) -> &'static str {
        match self {
            Self::Verification => VERIFICATION_TEXT,
            Self::PasswordReset => PASSWORD_RESET_TEXT,
            Self::Welcome => WELCOME_TEXT,
            Self::AccountLocked => ACCOUNT_LOCKED_TEXT,
            Self::Invitation => INVITATION_TEXT,
        }
    }
}

/// Template rendering engine with variable substitution
#[derive(Debug, Default)]
pub struct TemplateEngine {
    variables: HashMap<String, String>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Render a template string, replacing {{variable}} with values
    pub fn render(&self, template: &str) -> String {
        let mut result = template.to_string();

        for (key, value) in &self.variables {
            let placeholder = format!("{{{{{}}}}}", key);
            result = result.replace(&placeholder, value);
        }

        result
    }

    /// Render a complete email template
    pub fn render_template(&self, template: EmailTemplate) -> RenderedEmail {
        RenderedEmail {
            subject: self.render(template.subject()),
            html_body: self.render(template.html_body()),
            text_body: self.render(template.text_body()),
        }
    }
}

/// Rendered email with all variables substituted
#[derive(Debug, Clone)]
pub struct RenderedEmail {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Render the template for a decoded job payload.
pub fn render_job(job: &EmailJob) -> RenderedEmail {
    let mut engine = TemplateEngine::new();

    let template = match job {
        EmailJob::Verification {
            name, verify_url, ..
        } => {
            engine.set("name", name).set("verify_url", verify_url);
            EmailTemplate::Verification
        }
        EmailJob::PasswordReset { name, reset_url, .. } => {
            engine.set("name", name).set("reset_url", reset_url);
            EmailTemplate::PasswordReset
        }
        EmailJob::Welcome { name, .. } => {
            engine.set("name", name);
            EmailTemplate::Welcome
        }
        EmailJob::AccountLocked { name, .. } => {
            engine.set("name", name);
            EmailTemplate::AccountLocked
        }
        EmailJob::Invitation {
            inviter_name,
            invite_url,
            ..
        } => {
            engine
                .set("inviter_name", inviter_name)
                .set("invite_url", invite_url);
            EmailTemplate::Invitation
        }
    };

    engine.render_template(template)
}

// ============================================================================
// Email Templates
// ============================================================================

const VERIFICATION_HTML: &str = r#"<!DOCTYPE html>
<html>
<body style="font-family: -apple-system, 'Segoe UI', Roboto, Arial, sans-serif; color: #333;">
    <div style="max-width: 600px; margin: 40px auto; padding: 32px; background: #ffffff; border-radius: 8px;">
        <h1 style="color: #0f6b4f; font-size: 22px;">Verify your email</h1>
        <p>Hi {{name}},</p>
        <p>Confirm this email address to finish setting up your Assure account:</p>
        <p style="text-align: center; margin: 28px 0;">
            <a href="{{verify_url}}" style="background-color: #0f6b4f; color: #ffffff; padding: 12px 24px; text-decoration: none; border-radius: 6px; font-weight: 600;">Verify email</a>
        </p>
        <p style="font-size: 13px; color: #666;">If the button does not work, copy this link into your browser:<br>{{verify_url}}</p>
    </div>
</body>
</html>"#;

const VERIFICATION_TEXT: &str = r#"Hi {{name}},

Confirm this email address to finish setting up your Assure account:

{{verify_url}}

If you did not create an account, you can ignore this message.
"#;

const PASSWORD_RESET_HTML: &str = r#"<!DOCTYPE html>
<html>
<body style="font-family: -apple-system, 'Segoe UI', Roboto, Arial, sans-serif; color: #333;">
    <div style="max-width: 600px; margin: 40px auto; padding: 32px; background: #ffffff; border-radius: 8px;">
        <h1 style="color: #0f6b4f; font-size: 22px;">Reset your password</h1>
        <p>Hi {{name}},</p>
        <p>We received a request to reset your password. This link expires in one hour:</p>
        <p style="text-align: center; margin: 28px 0;">
            <a href="{{reset_url}}" style="background-color: #0f6b4f; color: #ffffff; padding: 12px 24px; text-decoration: none; border-radius: 6px; font-weight: 600;">Choose a new password</a>
        </p>
        <p style="font-size: 13px; color: #666;">If you did not request this, no action is needed; your password is unchanged.</p>
    </div>
</body>
</html>"#;

const PASSWORD_RESET_TEXT: &str = r#"Hi {{name}},

We received a request to reset your password. This link expires in one hour:

{{reset_url}}

If you did not request this, no action is needed; your password is unchanged.
"#;

const WELCOME_HTML: &str = r#"<!DOCTYPE html>
<html>
<body style="font-family: -apple-system, 'Segoe UI', Roboto, Arial, sans-serif; color: #333;">
    <div style="max-width: 600px; margin: 40px auto; padding: 32px; background: #ffffff; border-radius: 8px;">
        <h1 style="color: #0f6b4f; font-size: 22px;">Welcome to Assure</h1>
        <p>Hi {{name}},</p>
        <p>Your account is ready. You can now manage clients, policies and renewals from one place.</p>
        <p>If anything looks off, reply to this email and we will help.</p>
    </div>
</body>
</html>"#;

const WELCOME_TEXT: &str = r#"Hi {{name}},

Welcome to Assure. Your account is ready: you can now manage clients,
policies and renewals from one place.

If anything looks off, reply to this email and we will help.
"#;

const ACCOUNT_LOCKED_HTML: &str = r#"<!DOCTYPE html>
<html>
<body style="font-family: -apple-system, 'Segoe UI', Roboto, Arial, sans-serif; color: #333;">
    <div style="max-width: 600px; margin: 40px auto; padding: 32px; background: #ffffff; border-radius: 8px;">
        <h1 style="color: #b42318; font-size: 22px;">Your account has been locked</h1>
        <p>Hi {{name}},</p>
        <p>We locked your account after several unsuccessful sign-in attempts. Existing sessions have been signed out.</p>
        <p>If this was you, reset your password to regain access. If it was not, contact your office administrator.</p>
    </div>
</body>
</html>"#;

const ACCOUNT_LOCKED_TEXT: &str = r#"Hi {{name}},

We locked your account after several unsuccessful sign-in attempts.
Existing sessions have been signed out.

If this was you, reset your password to regain access. If it was not,
contact your office administrator.
"#;

const INVITATION_HTML: &str = r#"<!DOCTYPE html>
<html>
<body style="font-family: -apple-system, 'Segoe UI', Roboto, Arial, sans-serif; color: #333;">
    <div style="max-width: 600px; margin: 40px auto; padding: 32px; background: #ffffff; border-radius: 8px;">
        <h1 style="color: #0f6b4f; font-size: 22px;">You're invited</h1>
        <p>Hi,</p>
        <p><strong>{{inviter_name}}</strong> has invited you to join their office on Assure.</p>
        <p style="text-align: center; margin: 28px 0;">
            <a href="{{invite_url}}" style="background-color: #0f6b4f; color: #ffffff; padding: 12px 24px; text-decoration: none; border-radius: 6px; font-weight: 600;">Accept invitation</a>
        </p>
        <p style="font-size: 13px; color: #666;">If the button does not work, copy this link into your browser:<br>{{invite_url}}</p>
    </div>
</body>
</html>"#;

const INVITATION_TEXT: &str = r#"Hi,

{{inviter_name}} has invited you to join their office on Assure.

Accept the invitation here:

{{invite_url}}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_single_variable() {
        let mut engine = TemplateEngine::new();
        engine.set("name", "Dana");
        assert_eq!(engine.render("Hello, {{name}}!"), "Hello, Dana!");
    }

    #[test]
    fn test_render_repeated_variable() {
        let mut engine = TemplateEngine::new();
        engine.set("name", "Dana");
        assert_eq!(engine.render("{{name}} and {{name}}"), "Dana and Dana");
    }

    #[test]
    fn test_render_unknown_variable_left_in_place() {
        let engine = TemplateEngine::new();
        assert_eq!(engine.render("Hello, {{name}}!"), "Hello, {{name}}!");
    }

    #[test]
    fn test_render_job_password_reset() {
        let rendered = render_job(&EmailJob::PasswordReset {
            to: "agent@example.com".to_string(),
            name: "Agent Smith".to_string(),
            reset_url: "https://app.assure.example/reset/tok123".to_string(),
        });

        assert_eq!(rendered.subject, "Reset your password");
        assert!(rendered.html_body.contains("Agent Smith"));
        assert!(rendered.html_body.contains("https://app.assure.example/reset/tok123"));
        assert!(rendered.text_body.contains("tok123"));
    }

    #[test]
    fn test_render_job_invitation_subject() {
        let rendered = render_job(&EmailJob::Invitation {
            to: "new@example.com".to_string(),
            inviter_name: "Casey Park".to_string(),
            invite_url: "https://app.assure.example/invite/xyz".to_string(),
        });

        assert_eq!(rendered.subject, "Casey Park has invited you to Assure");
        assert!(rendered.html_body.contains("https://app.assure.example/invite/xyz"));
    }

    #[test]
    fn test_render_job_account_locked_mentions_sessions() {
        let rendered = render_job(&EmailJob::AccountLocked {
            to: "client@example.com".to_string(),
            name: "Client".to_string(),
        });

        assert!(rendered.html_body.contains("signed out"));
        assert!(rendered.text_body.contains("unsuccessful sign-in attempts"));
    }

    #[test]
    fn test_every_template_has_all_bodies() {
        for template in [
            EmailTemplate::Verification,
            EmailTemplate::PasswordReset,
            EmailTemplate::Welcome,
            EmailTemplate::AccountLocked,
            EmailTemplate::Invitation,
        ] {
            assert!(!template.subject().is_empty());
            assert!(!template.html_body().is_empty());
            assert!(!template.text_body().is_empty());
        }
    }
}

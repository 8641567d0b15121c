//! Reference Notifier: emails the payload through an SMTP relay.
//!
//! The original (`original_source/notification/email/email.go`) never got
//! past a stub; its parameter names (`from`, `subject`, `smtp`, `user`,
//! `password`) are kept here and filled in with a real `lettre` transport,
//! the crate the wider example pack reaches for when it needs SMTP.
use lettre::message::Message;
use lettre::transport::smtp::authentication::Credentials;
use lettre::SmtpTransport;
use lettre::Transport;

use crate::broadcaster::notifier;
use crate::broadcaster::notifier::Notifier;
use crate::errors::ErrorKind;
use crate::scheduler::Parameters;
use crate::Result;
use crate::ResultExt;

const NOTIFIER_KIND: &str = "email";
const DEFAULT_SUBJECT: &str = "fleetwatch notification";

/// Registers the `email` notifier type with the global factory.
pub fn register() {
    notifier::register(NOTIFIER_KIND, |id, params| {
        Ok(Box::new(EmailNotifier::from_parameters(id, params)?) as Box<dyn Notifier>)
    });
}

pub struct EmailNotifier {
    id: String,
    from: String,
    to: String,
    subject: String,
    transport: SmtpTransport,
}

impl EmailNotifier {
    fn from_parameters(id: String, mut params: Parameters) -> Result<EmailNotifier> {
        let from = take_required(&mut params, "from")?;
        let to = take_required(&mut params, "to")?;
        let smtp = take_required(&mut params, "smtp")?;
        let subject = take_optional(&mut params, "subject")?.unwrap_or_else(|| DEFAULT_SUBJECT.to_string());
        let user = take_optional(&mut params, "user")?;
        let password = take_optional(&mut params, "password")?;
        if !params.is_empty() {
            let unknown: Vec<String> = params.keys().cloned().collect();
            return Err(ErrorKind::InvalidNotifierParameters(format!(
                "unknown keys: {}",
                unknown.join(", ")
            ))
            .into());
        }

        let mut builder = SmtpTransport::relay(&smtp)
            .chain_err(|| ErrorKind::InvalidNotifierParameters(format!("invalid smtp relay '{}'", smtp)))?;
        if let (Some(user), Some(password)) = (user, password) {
            builder = builder.credentials(Credentials::new(user, password));
        }

        Ok(EmailNotifier {
            id,
            from,
            to,
            subject,
            transport: builder.build(),
        })
    }
}

fn take_required(params: &mut Parameters, key: &str) -> Result<String> {
    let value = params
        .remove(key)
        .ok_or_else(|| ErrorKind::InvalidNotifierParameters(format!("missing required key '{}'", key)))?;
    serde_yaml::from_value(value)
        .chain_err(|| ErrorKind::InvalidNotifierParameters(format!("'{}' must be a string", key)))
}

fn take_optional(params: &mut Parameters, key: &str) -> Result<Option<String>> {
    match params.remove(key) {
        None => Ok(None),
        Some(value) => serde_yaml::from_value(value)
            .map(Some)
            .chain_err(|| ErrorKind::InvalidNotifierParameters(format!("'{}' must be a string", key))),
    }
}

impl Notifier for EmailNotifier {
    fn id(&self) -> &str {
        &self.id
    }

    fn notify(&self, payload: &[u8]) -> Result<()> {
        let body = String::from_utf8_lossy(payload).into_owned();
        let message = Message::builder()
            .from(self.from.parse().chain_err(|| "invalid 'from' address")?)
            .to(self.to.parse().chain_err(|| "invalid 'to' address")?)
            .subject(self.subject.clone())
            .body(body)
            .chain_err(|| "failed to build email message")?;
        self.transport
            .send(&message)
            .chain_err(|| format!("email notifier '{}' send failed", self.id))?;
        Ok(())
    }
}

//! Outbound notification — the email seam the dispatcher sends through.

pub mod smtp;

use async_trait::async_trait;

use crate::error::NotifyError;

pub use smtp::SmtpNotifier;

/// Template fields for one round's scheduling email.
#[derive(Debug, Clone)]
pub struct Invite {
    pub candidate: String,
    pub candidate_email: String,
    pub company: String,
    pub interviewer: String,
    pub round_name: String,
    pub round_link: String,
}

/// Notification transport.
///
/// Implementations must report quota exhaustion as
/// `NotifyError::QuotaExceeded` — it is the sole backpressure trigger.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, invite: &Invite) -> Result<(), NotifyError>;
}

/// Subject line for a scheduling email.
pub fn invite_subject(invite: &Invite) -> String {
    format!("{}: {} scheduling", invite.company, invite.round_name)
}

/// Plain-text body for a scheduling email.
pub fn invite_body(invite: &Invite) -> String {
    let mut body = String::with_capacity(256);
    body.push_str(&format!("Hi {},\n\n", invite.candidate));
    body.push_str(&format!(
        "Your {} with {} is ready to be scheduled.\n",
        invite.round_name, invite.company
    ));
    body.push_str(&format!("Pick a slot that works for you: {}\n\n", invite.round_link));
    if !invite.interviewer.trim().is_empty() {
        body.push_str(&format!("You'll be speaking with {}.\n\n", invite.interviewer));
    }
    body.push_str("Best of luck!\n");
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invite() -> Invite {
        Invite {
            candidate: "Jo".into(),
            candidate_email: "jo@x.com".into(),
            company: "Acme".into(),
            interviewer: "Sam".into(),
            round_name: "Round 2".into(),
            round_link: "https://calendly.com/acme/r2".into(),
        }
    }

    #[test]
    fn subject_names_company_and_round() {
        let subject = invite_subject(&invite());
        assert!(subject.contains("Acme"));
        assert!(subject.contains("Round 2"));
    }

    #[test]
    fn body_contains_link_and_interviewer() {
        let body = invite_body(&invite());
        assert!(body.contains("Hi Jo"));
        assert!(body.contains("https://calendly.com/acme/r2"));
        assert!(body.contains("Sam"));
    }

    #[test]
    fn body_omits_blank_interviewer() {
        let mut i = invite();
        i.interviewer = "  ".into();
        let body = invite_body(&i);
        assert!(!body.contains("speaking with"));
    }
}

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use rand::Rng;
use regex::Regex;
use serenity::model::id::{GuildId, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{error, warn};

use crate::config::Config;

/// Domains of the French academies, the only addresses accepted for
/// professor verification.
const ACADEMIC_DOMAINS: &[&str] = &[
    "ac-aix-marseille.fr",
    "ac-amiens.fr",
    "ac-besancon.fr",
    "ac-bordeaux.fr",
    "ac-clermont.fr",
    "ac-corse.fr",
    "ac-creteil.fr",
    "ac-dijon.fr",
    "ac-grenoble.fr",
    "ac-guadeloupe.fr",
    "ac-guyane.fr",
    "ac-lille.fr",
    "ac-limoges.fr",
    "ac-lyon.fr",
    "ac-martinique.fr",
    "ac-mayotte.fr",
    "ac-montpellier.fr",
    "ac-nancy-metz.fr",
    "ac-nantes.fr",
    "ac-nice.fr",
    "ac-normandie.fr",
    "ac-orleans-tours.fr",
    "ac-paris.fr",
    "ac-poitiers.fr",
    "ac-reims.fr",
    "ac-rennes.fr",
    "ac-reunion.fr",
    "ac-strasbourg.fr",
    "ac-toulouse.fr",
    "ac-versailles.fr",
    "education.gouv.fr",
];

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_.+-]+@([a-z.-]+)$").unwrap())
}

/// Check if an address belongs to a French academy.
pub fn is_academic_email(email: &str) -> bool {
    email_pattern()
        .captures(email)
        .map(|captures| ACADEMIC_DOMAINS.contains(&&captures[1]))
        .unwrap_or(false)
}

/// Generate a random 6 digit verification code.
pub fn generate_verification_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Thin SMTP sender over lettre, built once from the environment.
#[derive(Clone)]
pub struct Mailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl Mailer {
    /// None when the SMTP environment is incomplete; professor
    /// verification is then disabled with a warning, not an error.
    pub fn from_config(config: &Config) -> Option<Self> {
        let (server, user, password) = match (
            config.smtp_server.as_deref(),
            config.email_user.as_deref(),
            config.email_password.as_deref(),
        ) {
            (Some(s), Some(u), Some(p)) => (s, u, p),
            _ => {
                warn!(
                    "SMTP environment is incomplete, professor verification will not work"
                );
                return None;
            }
        };

        let from = match user.parse::<Mailbox>() {
            Ok(from) => from,
            Err(e) => {
                error!("EMAIL_USER is not a valid address: {}", e);
                return None;
            }
        };
        let transport = match SmtpTransport::relay(server) {
            Ok(builder) => builder
                .credentials(Credentials::new(user.to_string(), password.to_string()))
                .build(),
            Err(e) => {
                error!("Cannot build SMTP transport for {}: {}", server, e);
                return None;
            }
        };
        Some(Self { transport, from })
    }

    /// Send one plaintext message. Blocking; call from spawn_blocking.
    pub fn send(&self, to: &str, subject: &str, body: String) -> anyhow::Result<()> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(subject)
            .body(body)?;
        self.transport.send(&email)?;
        Ok(())
    }
}

struct Pending {
    code: String,
    guild_id: GuildId,
}

/// In-process map of users waiting for their emailed verification code.
/// Entries expire through a timer task in the professor command.
#[derive(Clone, Default)]
pub struct PendingVerifications {
    inner: Arc<Mutex<HashMap<UserId, Pending>>>,
}

impl PendingVerifications {
    pub fn insert(&self, user_id: UserId, code: String, guild_id: GuildId) {
        let mut inner = self.inner.lock().unwrap();
        inner.insert(user_id, Pending { code, guild_id });
    }

    /// Consumes the pending entry when the message contains the right
    /// code. A wrong code leaves the entry in place for another try.
    pub fn take_if_match(&self, user_id: UserId, content: &str) -> Option<GuildId> {
        let mut inner = self.inner.lock().unwrap();
        match inner.get(&user_id) {
            Some(pending) if content.contains(&pending.code) => {
                let guild_id = pending.guild_id;
                inner.remove(&user_id);
                Some(guild_id)
            }
            _ => None,
        }
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.inner.lock().unwrap().contains_key(&user_id)
    }

    /// Returns true when an entry was still pending (the timeout case).
    pub fn expire(&self, user_id: UserId) -> bool {
        self.inner.lock().unwrap().remove(&user_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_academic_email_check() {
        assert!(is_academic_email("jean.dupont@ac-paris.fr"));
        assert!(is_academic_email("j-dupont2@ac-nancy-metz.fr"));
        assert!(!is_academic_email("jean.dupont@gmail.com"));
        assert!(!is_academic_email("jean.dupont@ac-paris.fr.evil.com"));
        assert!(!is_academic_email("not-an-email"));
        assert!(!is_academic_email("two@at@ac-paris.fr"));
    }

    #[test]
    fn test_verification_code_shape() {
        for _ in 0..100 {
            let code = generate_verification_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            assert!(!code.starts_with('0'));
        }
    }

    #[test]
    fn test_pending_verifications() {
        let pending = PendingVerifications::default();
        let user = UserId::new(7);
        pending.insert(user, "123456".to_string(), GuildId::new(1));
        assert!(pending.contains(user));

        // Wrong code leaves the entry for another try
        assert_eq!(pending.take_if_match(user, "000000"), None);
        assert!(pending.contains(user));

        assert_eq!(
            pending.take_if_match(user, "le code est 123456 merci"),
            Some(GuildId::new(1))
        );
        assert!(!pending.contains(user));
        assert!(!pending.expire(user));
    }
}

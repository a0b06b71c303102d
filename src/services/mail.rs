use std::{sync::Arc, time::Duration};

use askama::Template;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

use crate::config::{MailConfig, MailTransport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub to_name: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("failed to render email: {0}")]
    Render(#[from] askama::Error),

    #[error("mail transport failed: {0}")]
    Transport(String),

    #[error("mail api rejected message with status {status}")]
    Rejected { status: u16 },
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Writes outgoing mail to the log. Bodies carry tokens, so only headers are logged.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        info!(to = %email.to, subject = %email.subject, "mail not delivered (log transport)");
        Ok(())
    }
}

#[derive(Serialize)]
struct Address<'a> {
    email: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
struct HttpMailPayload<'a> {
    from: Address<'a>,
    to: [Address<'a>; 1],
    subject: &'a str,
    html: &'a str,
}

/// Posts mail as JSON to a transactional mail API.
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    from: String,
    from_name: String,
}

impl HttpMailer {
    pub fn new(cfg: &MailConfig, api_url: String) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| MailError::Transport(err.to_string()))?;

        Ok(Self {
            client,
            api_url,
            api_key: cfg.api_key.clone(),
            from: cfg.from.clone(),
            from_name: cfg.from_name.clone(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let payload = HttpMailPayload {
            from: Address {
                email: &self.from,
                name: &self.from_name,
            },
            to: [Address {
                email: &email.to,
                name: &email.to_name,
            }],
            subject: &email.subject,
            html: &email.html,
        };

        let mut request = self.client.post(&self.api_url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| MailError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            return Err(MailError::Rejected {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

pub fn mailer_from_config(cfg: &MailConfig) -> anyhow::Result<Arc<dyn Mailer>> {
    match (cfg.transport, &cfg.api_url) {
        (MailTransport::Log, _) => Ok(Arc::new(LogMailer)),
        (MailTransport::Http, Some(url)) => Ok(Arc::new(HttpMailer::new(cfg, url.clone())?)),
        (MailTransport::Http, None) => anyhow::bail!("mail.api_url is required for http transport"),
    }
}

#[derive(Template)]
#[template(path = "email/confirm_email.html")]
struct ConfirmEmailTemplate<'a> {
    username: &'a str,
    link: String,
}

#[derive(Template)]
#[template(path = "email/reset_password.html")]
struct ResetPasswordTemplate<'a> {
    username: &'a str,
    token: &'a str,
    endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailJob {
    Confirmation {
        email: String,
        username: String,
        base_url: String,
        token: String,
    },
    PasswordReset {
        email: String,
        username: String,
        base_url: String,
        token: String,
    },
}

impl MailJob {
    pub fn recipient(&self) -> &str {
        match self {
            MailJob::Confirmation { email, .. } | MailJob::PasswordReset { email, .. } => email,
        }
    }

    pub fn render(&self) -> Result<Email, MailError> {
        match self {
            MailJob::Confirmation {
                email,
                username,
                base_url,
                token,
            } => {
                let link = format!(
                    "{}/api/auth/confirmed_email/{token}",
                    base_url.trim_end_matches('/')
                );
                let html = ConfirmEmailTemplate { username, link }.render()?;
                Ok(Email {
                    to: email.clone(),
                    to_name: username.clone(),
                    subject: "Confirm your email".to_string(),
                    html,
                })
            }
            MailJob::PasswordReset {
                email,
                username,
                base_url,
                token,
            } => {
                let endpoint = format!(
                    "{}/api/auth/reset_password",
                    base_url.trim_end_matches('/')
                );
                let html = ResetPasswordTemplate {
                    username,
                    token,
                    endpoint,
                }
                .render()?;
                Ok(Email {
                    to: email.clone(),
                    to_name: username.clone(),
                    subject: "Password reset request".to_string(),
                    html,
                })
            }
        }
    }
}

/// Handle to the background delivery worker.
#[derive(Clone)]
pub struct MailQueue {
    tx: mpsc::Sender<MailJob>,
}

impl MailQueue {
    pub fn spawn(mailer: Arc<dyn Mailer>, cfg: &MailConfig) -> Self {
        let (tx, rx) = mpsc::channel(cfg.queue_capacity.max(1));
        let worker = Worker {
            mailer,
            max_attempts: cfg.max_attempts.max(1),
            backoff: Duration::from_millis(cfg.retry_backoff_ms),
        };
        tokio::spawn(worker.run(rx));
        Self { tx }
    }

    /// Never blocks; a full or closed queue drops the job with a log line.
    pub fn enqueue(&self, job: MailJob) {
        match self.tx.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(job)) => {
                warn!(to = %job.recipient(), "mail queue full, dropping message");
            }
            Err(TrySendError::Closed(job)) => {
                error!(to = %job.recipient(), "mail worker stopped, dropping message");
            }
        }
    }

    pub fn send_confirmation(&self, email: &str, username: &str, base_url: &str, token: String) {
        self.enqueue(MailJob::Confirmation {
            email: email.to_string(),
            username: username.to_string(),
            base_url: base_url.to_string(),
            token,
        });
    }

    pub fn send_password_reset(&self, email: &str, username: &str, base_url: &str, token: String) {
        self.enqueue(MailJob::PasswordReset {
            email: email.to_string(),
            username: username.to_string(),
            base_url: base_url.to_string(),
            token,
        });
    }
}

struct Worker {
    mailer: Arc<dyn Mailer>,
    max_attempts: u32,
    backoff: Duration,
}

impl Worker {
    async fn run(self, mut rx: mpsc::Receiver<MailJob>) {
        while let Some(job) = rx.recv().await {
            self.deliver(&job).await;
        }
        debug!("mail queue closed");
    }

    async fn deliver(&self, job: &MailJob) {
        let email = match job.render() {
            Ok(email) => email,
            Err(err) => {
                error!(to = %job.recipient(), error = %err, "failed to render email");
                return;
            }
        };

        for attempt in 1..=self.max_attempts {
            match self.mailer.send(&email).await {
                Ok(()) => {
                    debug!(to = %email.to, attempt, "mail delivered");
                    return;
                }
                Err(err) if attempt < self.max_attempts => {
                    warn!(to = %email.to, attempt, error = %err, "mail delivery failed, retrying");
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(err) => {
                    error!(to = %email.to, attempt, error = %err, "giving up on mail delivery");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicU32, Ordering},
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::{Email, MailError, MailJob, MailQueue, Mailer};
    use crate::config::MailConfig;

    struct FlakyMailer {
        failures_left: AtomicU32,
        attempts: mpsc::UnboundedSender<bool>,
    }

    #[async_trait]
    impl Mailer for FlakyMailer {
        async fn send(&self, _email: &Email) -> Result<(), MailError> {
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            let _ = self.attempts.send(!failing);
            if failing {
                Err(MailError::Transport("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn quick_config(max_attempts: u32) -> MailConfig {
        MailConfig {
            max_attempts,
            retry_backoff_ms: 1,
            ..MailConfig::default()
        }
    }

    fn confirmation() -> MailJob {
        MailJob::Confirmation {
            email: "a@x.com".to_string(),
            username: "alice".to_string(),
            base_url: "http://localhost:3000/".to_string(),
            token: "abc.def.ghi".to_string(),
        }
    }

    async fn collect_attempts(rx: &mut mpsc::UnboundedReceiver<bool>) -> Vec<bool> {
        let mut attempts = Vec::new();
        while let Ok(Some(ok)) = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await
        {
            attempts.push(ok);
        }
        attempts
    }

    #[test]
    fn confirmation_links_to_the_confirm_route() {
        let email = confirmation().render().expect("template should render");

        assert_eq!(email.to, "a@x.com");
        assert!(
            email
                .html
                .contains("http://localhost:3000/api/auth/confirmed_email/abc.def.ghi")
        );
        assert!(email.html.contains("alice"));
    }

    #[test]
    fn reset_mail_carries_token_and_endpoint() {
        let email = MailJob::PasswordReset {
            email: "a@x.com".to_string(),
            username: "alice".to_string(),
            base_url: "http://localhost:3000/".to_string(),
            token: "abc.def.ghi".to_string(),
        }
        .render()
        .expect("template should render");

        assert_eq!(email.subject, "Password reset request");
        assert!(email.html.contains("<code id=\"reset-token\">abc.def.ghi</code>"));
        assert!(email.html.contains("http://localhost:3000/api/auth/reset_password"));
    }

    #[tokio::test]
    async fn retries_until_the_mailer_recovers() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mailer = Arc::new(FlakyMailer {
            failures_left: AtomicU32::new(2),
            attempts: tx,
        });
        let queue = MailQueue::spawn(mailer, &quick_config(5));

        queue.enqueue(confirmation());

        assert_eq!(collect_attempts(&mut rx).await, vec![false, false, true]);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mailer = Arc::new(FlakyMailer {
            failures_left: AtomicU32::new(u32::MAX),
            attempts: tx,
        });
        let queue = MailQueue::spawn(mailer, &quick_config(3));

        queue.enqueue(confirmation());

        assert_eq!(collect_attempts(&mut rx).await, vec![false, false, false]);
    }
}

use derive_more::{Display, From};
use futures::future::BoxFuture;
use log::info;
use serde::Serialize;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

#[derive(Debug, Display, From)]
pub enum MailError {
    #[display(fmt = "mail transport error: {}", _0)]
    Transport(reqwest::Error),
}

impl std::error::Error for MailError {}

/// Delivers verification codes.
pub trait Mailer: Send + Sync {
    fn send_verification<'a>(&'a self, to: &'a str, code: &'a str) -> BoxFuture<'a, Result<(), MailError>>;
}

pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    from: String,
}

impl ResendMailer {
    pub fn new(api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            from,
        }
    }
}

#[derive(Serialize)]
struct ResendEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: String,
}

fn verification_html(code: &str) -> String {
    format!(
        "<div style=\"font-family: sans-serif; max-width: 600px; margin: 0 auto;\">\
         <h1>Welcome to CampusHub!</h1>\
         <p>Your verification code is:</p>\
         <div style=\"padding: 20px; text-align: center; font-size: 32px; font-weight: bold; letter-spacing: 4px;\">{code}</div>\
         <p>This code expires in 10 minutes.</p>\
         </div>"
    )
}

impl Mailer for ResendMailer {
    fn send_verification<'a>(&'a self, to: &'a str, code: &'a str) -> BoxFuture<'a, Result<(), MailError>> {
        Box::pin(async move {
            let email = ResendEmail {
                from: &self.from,
                to: [to],
                subject: "Verify your CampusHub account",
                html: verification_html(code),
            };
            self.client
                .post(RESEND_ENDPOINT)
                .bearer_auth(&self.api_key)
                .json(&email)
                .send()
                .await?
                .error_for_status()?;
            info!("verification email sent to {}", to);
            Ok::<(), MailError>(())
        })
    }
}

/// Writes codes to the log instead of sending them. Used when no mail provider is configured.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send_verification<'a>(&'a self, to: &'a str, code: &'a str) -> BoxFuture<'a, Result<(), MailError>> {
        info!("verification code for {}: {}", to, code);
        Box::pin(std::future::ready(Ok(())))
    }
}

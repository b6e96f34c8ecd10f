//! Outbound email: transport selection and message rendering.
//!
//! Both notification emails are rendered here so the two HTTP handlers share
//! one subject/text/html pipeline and one optional-detail template.

use anyhow::Result;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::{smtp::authentication::Credentials, stub::AsyncStubTransport},
    AsyncSendmailTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use rand::Rng;
use shared::NotifyPayload;
use std::sync::Arc;

use crate::config::SmtpConfig;

/// Rotating flavor lines, one picked per email.
const MOOD_LINES: &[&str] = &[
    "If there is a small pause in the day, we could meet.",
    "Some thoughts travel better face to face.",
    "If it suits you, a brief meeting would be enough.",
    "Small matters do not need long deliberation.",
    "One line is rarely the whole story.",
    "If a few words feel thin, a meeting can hold more.",
    "An easy meeting is sometimes the clearest reply.",
    "A quiet talk can be lighter than a long thread.",
    "If the time is kind, let us meet once.",
    "A short meeting can say what messages cannot.",
    "Between notes, a meeting can be gentle.",
    "If your day allows, we could meet without fuss.",
    "Some things are simpler in person.",
    "A face-to-face moment can be the softest answer.",
    "When a thought lingers, a meeting clears it.",
    "If we meet once, the rest may be easier.",
    "A brief meeting is sometimes the cleanest way.",
    "If it is not a burden, a meeting would be good.",
    "One meeting can spare many messages.",
    "A quiet meeting can carry more than a long note.",
];

fn mood_line() -> &'static str {
    MOOD_LINES[rand::thread_rng().gen_range(0..MOOD_LINES.len())]
}

/// Per-request base URL override wins over the configured one; trailing
/// slashes are trimmed either way.
pub fn resolve_site_url(override_url: Option<&str>, configured: &str) -> String {
    let raw = override_url
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(configured);
    raw.trim().trim_end_matches('/').to_string()
}

pub(crate) fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// The populated meeting details, in display order. Blank and missing fields
/// simply don't appear; time needs both a start and a duration.
fn detail_lines(p: &NotifyPayload) -> Vec<(&'static str, String)> {
    let mut lines = Vec::new();
    if let Some(date) = p.date.as_deref().filter(|s| !s.is_empty()) {
        lines.push(("Date", date.to_string()));
    }
    if let (Some(start), Some(minutes)) = (
        p.start_time.as_deref().filter(|s| !s.is_empty()),
        p.duration_minutes,
    ) {
        lines.push(("Time", format!("{} ({} min)", start, minutes)));
    }
    if let Some(place) = p.place.as_deref().filter(|s| !s.is_empty()) {
        lines.push(("Place", place.to_string()));
    }
    if let Some(note) = p.note.as_deref().filter(|s| !s.is_empty()) {
        lines.push(("Note", note.to_string()));
    }
    lines
}

fn sender_label(p: &NotifyPayload) -> &str {
    p.from_name
        .as_deref()
        .filter(|s| !s.is_empty())
        .or(p.from_email.as_deref().filter(|s| !s.is_empty()))
        .unwrap_or("Someone")
}

fn recipient_label(p: &NotifyPayload) -> &str {
    p.to_name
        .as_deref()
        .filter(|s| !s.is_empty())
        .or(p.to_email.as_deref())
        .unwrap_or("there")
}

#[derive(Debug, Clone)]
pub struct RenderedEmail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

fn render_details_text(details: &[(&'static str, String)]) -> String {
    details
        .iter()
        .map(|(label, value)| format!("{}: {}", label, value))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_details_html(details: &[(&'static str, String)]) -> String {
    details
        .iter()
        .map(|(label, value)| {
            format!(
                "<div><strong>{}:</strong> {}</div>",
                label,
                escape_html(value)
            )
        })
        .collect::<Vec<_>>()
        .join("\n                ")
}

fn wrap_html(heading: &str, intro: &str, mood: &str, details_html: &str, link_label: &str, link: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <body style="margin:0; padding:0; background:#e9eef1; color:#1f1f1f;">
    <table role="presentation" cellpadding="0" cellspacing="0" width="100%" style="background:#e9eef1; padding:36px 12px;">
      <tr>
        <td align="center">
          <table role="presentation" cellpadding="0" cellspacing="0" width="100%" style="max-width:600px; background:#ffffff; border:1px solid #d6dbe0;">
            <tr>
              <td style="padding:28px 32px 16px;">
                <div style="font-family: Georgia, 'Times New Roman', serif; font-size:12px; letter-spacing:0.24em; text-transform:uppercase; color:#6c7884;">
                  LetterMeet Note
                </div>
                <div style="margin-top:10px; font-family: Georgia, 'Times New Roman', serif; font-size:22px; color:#1f2b3a;">
                  {heading}
                </div>
              </td>
            </tr>
            <tr>
              <td style="padding:16px 32px 18px; font-family: 'Helvetica Neue', Arial, sans-serif; font-size:14px; line-height:1.7;">
                <div>{intro}</div>
                <div style="margin-top:10px; font-style: italic; color:#3b4954;">{mood}</div>
              </td>
            </tr>
            <tr>
              <td style="padding:0 32px 18px; font-family: 'Helvetica Neue', Arial, sans-serif; font-size:14px; line-height:1.6;">
                {details_html}
              </td>
            </tr>
            <tr>
              <td style="padding:0 32px 24px; font-family: 'Helvetica Neue', Arial, sans-serif; font-size:14px;">
                <div>{link_label}</div>
                <div style="margin-top:6px;"><a href="{link}">{link}</a></div>
              </td>
            </tr>
            <tr>
              <td style="padding:0 32px 26px; font-family: Georgia, 'Times New Roman', serif; font-size:14px; color:#1f2b3a;">
                &mdash; LetterMeet
              </td>
            </tr>
          </table>
        </td>
      </tr>
    </table>
  </body>
</html>
"#
    )
}

/// Email sent to the recipient when a new request lands.
pub fn render_new_request(p: &NotifyPayload, site_url: &str) -> RenderedEmail {
    let sender = sender_label(p);
    let recipient = recipient_label(p);
    let mood = mood_line();
    let details = detail_lines(p);
    let inbox_url = format!("{}/inbox", site_url);

    let subject = format!("New LetterMeet request from {}", sender);

    let text = format!(
        "Hi {recipient},\n\n\
         {sender} just sent you a LetterMeet request.\n\
         {mood}\n\n\
         {details}\n\n\
         You can view and respond on LetterMeet:\n\
         Inbox: {inbox_url}\n\n\
         \u{2014} LetterMeet",
        details = render_details_text(&details),
    );

    let html = wrap_html(
        "A request has arrived.",
        &format!(
            "Dear {}, {} just sent you a LetterMeet request.",
            escape_html(recipient),
            escape_html(sender)
        ),
        mood,
        &render_details_html(&details),
        "You can view and respond in your Inbox:",
        &inbox_url,
    );

    RenderedEmail { subject, text, html }
}

/// Email sent back to the original sender once the recipient has decided.
pub fn render_reply(p: &NotifyPayload, accepted: bool, site_url: &str) -> RenderedEmail {
    let verb = if accepted { "accepted" } else { "declined" };
    // On the reply leg the payload is addressed back to the original sender,
    // so from_* here names the recipient who decided.
    let decider = sender_label(p);
    let addressee = recipient_label(p);
    let mood = mood_line();
    let details = detail_lines(p);
    let sent_url = format!("{}/sent", site_url);

    let subject = format!("LetterMeet Note: your request was {}", verb);

    let text = format!(
        "LetterMeet Note\n\
         A reply has arrived.\n\n\
         Dear {addressee},\n\n\
         {decider} has {verb} your LetterMeet request.\n\
         {mood}\n\n\
         {details}\n\n\
         Check the status in your Sent page:\n\
         Sent: {sent_url}\n\n\
         \u{2014} LetterMeet",
        details = render_details_text(&details),
    );

    let html = wrap_html(
        "A reply has arrived.",
        &format!(
            "Dear {}, {} has {} your LetterMeet request.",
            escape_html(addressee),
            escape_html(decider),
            verb
        ),
        mood,
        &render_details_html(&details),
        "Check the status in your Sent page:",
        &sent_url,
    );

    RenderedEmail { subject, text, html }
}

// ============================================================================
// Transport
// ============================================================================

#[derive(Clone)]
enum Transport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    // Arc because the sendmail transport itself is not Clone.
    Sendmail(Arc<AsyncSendmailTransport<Tokio1Executor>>),
    /// Accepts and records everything. Used when email is disabled and by
    /// tests that assert on what would have been sent.
    Stub(AsyncStubTransport),
}

#[derive(Clone)]
pub struct Mailer {
    transport: Transport,
    from: Mailbox,
}

impl Mailer {
    pub fn from_config(config: &SmtpConfig) -> Result<Self> {
        let from: Mailbox = format!("{} <{}>", config.from_name, config.from_email).parse()?;

        let transport = if !config.enabled {
            tracing::warn!("Outbound email disabled; messages will be dropped");
            Transport::Stub(AsyncStubTransport::new_ok())
        } else if config.use_sendmail {
            Transport::Sendmail(Arc::new(AsyncSendmailTransport::<Tokio1Executor>::new()))
        } else {
            let creds = Credentials::new(config.username.clone(), config.password.clone());
            let smtp = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
                .credentials(creds)
                .port(config.port)
                .build();
            Transport::Smtp(smtp)
        };

        Ok(Self { transport, from })
    }

    /// A mailer backed by a recording stub, plus a handle to the recordings.
    pub fn stub() -> Result<(Self, AsyncStubTransport)> {
        let stub = AsyncStubTransport::new_ok();
        let from: Mailbox = "LetterMeet <goodday@lettermeet.cafe>".parse()?;
        Ok((
            Self {
                transport: Transport::Stub(stub.clone()),
                from,
            },
            stub,
        ))
    }

    pub async fn send(&self, to_email: &str, email: &RenderedEmail) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to_email.parse()?)
            .subject(email.subject.as_str())
            .multipart(MultiPart::alternative_plain_html(
                email.text.clone(),
                email.html.clone(),
            ))?;

        match &self.transport {
            Transport::Smtp(t) => {
                t.send(message).await?;
            }
            Transport::Sendmail(t) => {
                t.send(message).await?;
            }
            Transport::Stub(t) => {
                t.send(message).await?;
            }
        }
        Ok(())
    }
}

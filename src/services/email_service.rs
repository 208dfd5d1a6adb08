use crate::config::Config;
use crate::error::Result;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// Thin wrapper over the async SMTP transport. One transactional send
/// operation; delivery retries are left to the next scheduled run.
#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ))
            .build();
        Ok(Self {
            transport,
            from: config.smtp_from.parse()?,
        })
    }

    pub async fn send(&self, to: &str, subject: &str, text: String, html: String) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(text, html))?;
        self.transport.send(message).await?;
        Ok(())
    }
}

/// Substitute `{{name}}`-style placeholders. No escaping is applied; the
/// templates are trusted files shipped with the service or stored in job
/// config.
pub fn render_template(template: &str, vars: &[(&str, String)]) -> String {
    let mut rendered = template.to_string();
    for (key, value) in vars {
        rendered = rendered.replace(&format!("{{{{{}}}}}", key), value);
    }
    rendered
}

/// Crude tag strip used to derive the plain-text alternative part from the
/// HTML template.
pub fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_substituted() {
        let rendered = render_template(
            "Hi {{name}}, your handle {{handle}} is idle.",
            &[
                ("name", "Alice".to_string()),
                ("handle", "alice_cf".to_string()),
            ],
        );
        assert_eq!(rendered, "Hi Alice, your handle alice_cf is idle.");
    }

    #[test]
    fn unknown_placeholders_are_left_untouched() {
        let rendered = render_template("{{name}} / {{missing}}", &[("name", "Bob".to_string())]);
        assert_eq!(rendered, "Bob / {{missing}}");
    }

    #[test]
    fn substitution_does_not_escape_values() {
        let rendered = render_template(
            "<p>{{name}}</p>",
            &[("name", "<b>Eve</b>".to_string())],
        );
        assert_eq!(rendered, "<p><b>Eve</b></p>");
    }

    #[test]
    fn strip_tags_flattens_markup() {
        let text = strip_tags("<html><body><p>Hello <b>there</b></p>\n<p>friend</p></body></html>");
        assert_eq!(text, "Hello there friend");
    }
}

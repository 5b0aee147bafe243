//! # Email Templates
//!
//! Transactional emails for the waitlist.
//!
//! Each template renders a subject, an HTML body and a plain text body from the same inputs. Some clients
//! only show the text part, so both bodies carry the position and, for the welcome email, the referral
//! code and link.
//!
//! ## Templates
//!
//! - Confirmation: sent after joining, links to the confirm endpoint, token expires in 24 hours
//! - Welcome: sent after confirming, hands out the referral link
const BRAND: &str = "Accountability Bet";
const PURPLE: &str = "#9333ea";
const PURPLE_DARK: &str = "#7c3aed";
const GRAY: &str = "#6b7280";
const GRAY_LIGHT: &str = "#f3f4f6";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Template {
    Confirmation {
        confirmation_url: String,
        position: u32,
        site_url: String,
    },
    Welcome {
        position: u32,
        referral_code: String,
        referral_url: String,
        site_url: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

impl Template {
    pub fn name(&self) -> &'static str {
        match self {
            Template::Confirmation { .. } => "confirmation",
            Template::Welcome { .. } => "welcome",
        }
    }

    pub fn render(&self) -> RenderedEmail {
        match self {
            Template::Confirmation {
                confirmation_url,
                position,
                site_url,
            } => render_confirmation(confirmation_url, *position, site_url),
            Template::Welcome {
                position,
                referral_code,
                referral_url,
                site_url,
            } => render_welcome(*position, referral_code, referral_url, site_url),
        }
    }
}

fn render_confirmation(confirmation_url: &str, position: u32, site_url: &str) -> RenderedEmail {
    let subject = format!("Confirm your spot on the {BRAND} waitlist");
    let url = escape(confirmation_url);

    let content = format!(
        r#"<h1>Confirm Your Spot</h1>
      <p style="text-align: center;">
        You're one click away from joining the waitlist for {BRAND} -
        the app that helps you achieve your goals with real financial stakes.
      </p>
      <div class="highlight">
        <p style="text-align: center; margin-bottom: 8px; font-size: 14px;">Your current position:</p>
        <div class="position">#{position}</div>
      </div>
      <div class="button-container">
        <a href="{url}" class="button">Confirm My Email</a>
      </div>
      <p style="text-align: center; font-size: 14px; color: #9ca3af;">
        This link expires in 24 hours.
      </p>"#
    );

    let footer = format!("If you didn't sign up for {BRAND}, you can safely ignore this email.");
    let html = layout(&subject, &content, &footer, site_url);

    let text = format!(
        "Confirm Your Spot on {BRAND}

You're one click away from joining the waitlist for {BRAND} - the app that helps you achieve your goals with real financial stakes.

Your current position: #{position}

Click here to confirm your email:
{confirmation_url}

This link expires in 24 hours.

---

{footer}

{site}
",
        site = display_host(site_url),
    );

    RenderedEmail {
        subject,
        html,
        text,
    }
}

fn render_welcome(
    position: u32,
    referral_code: &str,
    referral_url: &str,
    site_url: &str,
) -> RenderedEmail {
    let subject = format!("You're on the list! Welcome to {BRAND}");
    let code = escape(referral_code);
    let url = escape(referral_url);

    let content = format!(
        r#"<h1>You're In!</h1>
      <p style="text-align: center;">
        Your email is confirmed. You're officially on the {BRAND} waitlist!
      </p>
      <div class="highlight">
        <p style="text-align: center; margin-bottom: 8px; font-size: 14px;">Your position:</p>
        <div class="position">#{position}</div>
      </div>
      <p style="text-align: center;">
        <strong>Want to move up the list?</strong><br>
        Share your referral link with friends. Each friend who joins moves you up.
      </p>
      <div class="highlight" style="text-align: center;">
        <p style="font-size: 14px; margin-bottom: 8px;">Your referral link:</p>
        <p style="font-size: 16px; font-weight: 600; color: {PURPLE}; word-break: break-all;">
          {url}
        </p>
      </div>
      <p style="text-align: center; font-size: 14px;">
        Your referral code: <strong>{code}</strong>
      </p>"#
    );

    let footer = "We'll email you when it's your turn to join.";
    let html = layout(&subject, &content, footer, site_url);

    let text = format!(
        "You're In! Welcome to {BRAND}

Your email is confirmed. You're officially on the {BRAND} waitlist!

Your position: #{position}

---

Want to move up the list?

Share your referral link with friends. Each friend who joins moves you up.

Your referral link: {referral_url}
Your referral code: {referral_code}

---

{footer}

{site}
",
        site = display_host(site_url),
    );

    RenderedEmail {
        subject,
        html,
        text,
    }
}

fn layout(subject: &str, content: &str, footer: &str, site_url: &str) -> String {
    let subject = escape(subject);
    let href = escape(site_url);
    let host = escape(display_host(site_url));
    let styles = styles();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{subject}</title>
  <style>{styles}</style>
</head>
<body>
  <div class="container">
    <div class="card">
      <div class="logo">{BRAND}</div>
      {content}
      <div class="footer">
        <p>{footer}</p>
        <p style="margin-top: 16px;">
          <a href="{href}">{host}</a>
        </p>
      </div>
    </div>
  </div>
</body>
</html>
"#
    )
}

fn styles() -> String {
    format!(
        r#"
  body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', Arial, sans-serif; line-height: 1.6; color: #1f2937; margin: 0; padding: 0; background-color: {GRAY_LIGHT}; }}
  .container {{ max-width: 600px; margin: 0 auto; padding: 40px 20px; }}
  .card {{ background-color: #ffffff; border-radius: 16px; padding: 40px; box-shadow: 0 4px 6px rgba(0, 0, 0, 0.05); }}
  .logo {{ font-size: 24px; font-weight: 700; color: {PURPLE}; text-align: center; margin-bottom: 32px; }}
  h1 {{ font-size: 28px; font-weight: 700; color: #1f2937; margin: 0 0 16px 0; text-align: center; }}
  p {{ color: {GRAY}; margin: 0 0 16px 0; font-size: 16px; }}
  .button {{ display: inline-block; background: linear-gradient(135deg, {PURPLE} 0%, {PURPLE_DARK} 100%); color: #ffffff !important; text-decoration: none; padding: 16px 32px; border-radius: 12px; font-weight: 600; font-size: 16px; text-align: center; margin: 24px 0; }}
  .button-container {{ text-align: center; }}
  .footer {{ text-align: center; margin-top: 32px; padding-top: 24px; border-top: 1px solid #e5e7eb; font-size: 14px; color: #9ca3af; }}
  .footer a {{ color: {PURPLE}; text-decoration: none; }}
  .highlight {{ background-color: {GRAY_LIGHT}; border-radius: 8px; padding: 16px; margin: 16px 0; }}
  .position {{ font-size: 48px; font-weight: 800; color: {PURPLE}; text-align: center; margin: 16px 0; }}
"#
    )
}

/// `https://example.com/` -> `example.com`
fn display_host(site_url: &str) -> &str {
    site_url
        .split_once("://")
        .map_or(site_url, |(_, rest)| rest)
        .trim_end_matches('/')
}

fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());

    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }

    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confirmation() -> Template {
        Template::Confirmation {
            confirmation_url: "https://example.com/api/waitlist/confirm?token=abc&x=1".to_string(),
            position: 42,
            site_url: "https://example.com".to_string(),
        }
    }

    fn welcome() -> Template {
        Template::Welcome {
            position: 3,
            referral_code: "XYZ1".to_string(),
            referral_url: "https://example.com?ref=XYZ1".to_string(),
            site_url: "https://example.com".to_string(),
        }
    }

    #[test]
    fn confirmation_bodies_carry_position_and_link() {
        let email = confirmation().render();

        assert_eq!(
            email.subject,
            "Confirm your spot on the Accountability Bet waitlist"
        );
        assert!(email.html.contains("#42"));
        assert!(email.text.contains("#42"));
        assert!(
            email
                .html
                .contains("https://example.com/api/waitlist/confirm?token=abc&amp;x=1")
        );
        assert!(
            email
                .text
                .contains("https://example.com/api/waitlist/confirm?token=abc&x=1")
        );
        assert!(email.text.contains("expires in 24 hours"));
    }

    #[test]
    fn welcome_bodies_carry_referral() {
        let email = welcome().render();

        assert_eq!(
            email.subject,
            "You're on the list! Welcome to Accountability Bet"
        );
        for body in [&email.html, &email.text] {
            assert!(body.contains("#3"));
            assert!(body.contains("XYZ1"));
            assert!(body.contains("https://example.com?ref=XYZ1"));
        }
    }

    #[test]
    fn footer_shows_bare_host() {
        let email = welcome().render();

        assert!(email.html.contains(r#"<a href="https://example.com">example.com</a>"#));
        assert!(email.text.trim_end().ends_with("example.com"));
    }

    #[test]
    fn names() {
        assert_eq!(confirmation().name(), "confirmation");
        assert_eq!(welcome().name(), "welcome");
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }
}

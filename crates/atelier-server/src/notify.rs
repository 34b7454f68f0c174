//! Owner notifications: new visitors (throttled per IP + user agent) and
//! contact form submissions.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use atelier_core::{
    contact::Contact,
    mail::OutgoingMail,
    visitor::{notification_cache_key, visitor_fingerprint, VisitorLocation},
};

use crate::state::AppState;

/// What happened to a visitor notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    /// Already notified within the throttle window, or a crawler.
    Skipped,
    /// The mail transport failed; no throttle key was written.
    Failed,
    /// No owner address configured or visitor mails switched off.
    Disabled,
}

/// A single tracked visit.
#[derive(Debug, Clone)]
pub struct Visit {
    pub location: VisitorLocation,
    pub user_agent: String,
    pub page: Option<String>,
    pub referrer: Option<String>,
    pub at: DateTime<Utc>,
}

/// Browser and OS as classified from the User-Agent header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UaInfo {
    pub browser: String,
    pub browser_version: Option<String>,
    pub os: String,
    pub os_version: Option<String>,
    pub category: String,
}

/// Parse a `User-Agent` string via `woothee`. `None` for empty input or
/// strings woothee cannot classify.
pub fn parse_user_agent(user_agent: &str) -> Option<UaInfo> {
    if user_agent.is_empty() {
        return None;
    }
    let result = woothee::parser::Parser::new().parse(user_agent)?;

    // woothee reports unknown values as "" or "UNKNOWN".
    let non_empty = |s: &str| (!s.is_empty() && s != "UNKNOWN").then(|| s.to_string());

    Some(UaInfo {
        browser: result.name.to_string(),
        browser_version: non_empty(&*result.version),
        os: result.os.to_string(),
        os_version: non_empty(&*result.os_version),
        category: result.category.to_string(),
    })
}

fn visit_mail_body(visit: &Visit) -> String {
    let loc = &visit.location;
    let ua = parse_user_agent(&visit.user_agent);
    let mut lines = vec![
        "A new visitor arrived on the site.".to_string(),
        String::new(),
        format!("IP address: {}", loc.ip),
        format!("City:       {}", loc.city),
        format!("Region:     {}", loc.region.as_deref().unwrap_or("-")),
        format!("Country:    {}", loc.country),
        format!("Timezone:   {}", loc.timezone.as_deref().unwrap_or("-")),
    ];
    if let Some(ua) = &ua {
        lines.push(format!(
            "Browser:    {} {}",
            ua.browser,
            ua.browser_version.as_deref().unwrap_or("")
        ));
        lines.push(format!(
            "OS:         {} {}",
            ua.os,
            ua.os_version.as_deref().unwrap_or("")
        ));
    }
    lines.push(format!("User agent: {}", visit.user_agent));
    lines.push(format!("Page:       {}", visit.page.as_deref().unwrap_or("-")));
    lines.push(format!(
        "Referrer:   {}",
        visit.referrer.as_deref().unwrap_or("-")
    ));
    lines.push(format!("Time (UTC): {}", visit.at.format("%Y-%m-%d %H:%M:%S")));
    lines
        .into_iter()
        .map(|l| l.trim_end().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// E-mail the owner about `visit`, at most once per (ip, user agent) pair per
/// throttle window.
///
/// The throttle key is written only after a successful send, so a failed
/// delivery is retried on the next visit. The existence check and the write
/// are separate cache calls; two simultaneous first visits can both send.
pub async fn notify_visit(state: &AppState, visit: &Visit) -> NotifyOutcome {
    let Some(owner) = state.config.notify_email.as_deref() else {
        return NotifyOutcome::Disabled;
    };
    if !state.config.visit_notifications {
        return NotifyOutcome::Disabled;
    }
    if parse_user_agent(&visit.user_agent).is_some_and(|ua| ua.category == "crawler") {
        debug!(user_agent = %visit.user_agent, "Crawler visit; not notifying");
        return NotifyOutcome::Skipped;
    }

    let fingerprint = visitor_fingerprint(&visit.location.ip, &visit.user_agent);
    let key = notification_cache_key(&fingerprint);
    if state.cache.has(&key).await {
        debug!(fingerprint = %fingerprint, "Visitor already notified within window");
        return NotifyOutcome::Skipped;
    }

    let mail = OutgoingMail {
        to: owner.to_string(),
        subject: format!(
            "[{}] New visitor from {}, {}",
            state.config.app_name, visit.location.city, visit.location.country
        ),
        body: visit_mail_body(visit),
        reply_to: None,
    };
    match state.mailer.send(mail).await {
        Ok(()) => {
            state
                .cache
                .put(&key, Value::Bool(true), state.config.visit_notify_ttl())
                .await;
            info!(fingerprint = %fingerprint, ip = %visit.location.ip, "Visitor notification sent");
            NotifyOutcome::Sent
        }
        Err(e) => {
            warn!(fingerprint = %fingerprint, error = %e, "Visitor notification failed");
            NotifyOutcome::Failed
        }
    }
}

/// E-mail the owner a stored contact submission. Best-effort: failures are
/// logged and swallowed.
pub async fn notify_contact(state: &AppState, contact: &Contact) -> bool {
    let Some(owner) = state.config.notify_email.as_deref() else {
        return false;
    };
    let mail = OutgoingMail {
        to: owner.to_string(),
        subject: format!(
            "[{}] New contact form submission from {}",
            state.config.app_name,
            contact.full_name()
        ),
        body: format!(
            "Name:    {}\nEmail:   {}\nSent at: {} UTC\n\n{}\n",
            contact.full_name(),
            contact.email,
            contact.created_at.format("%Y-%m-%d %H:%M:%S"),
            contact.message
        ),
        reply_to: Some(contact.email.clone()),
    };
    match state.mailer.send(mail).await {
        Ok(()) => true,
        Err(e) => {
            warn!(contact_id = %contact.id, error = %e, "Contact notification failed");
            false
        }
    }
}

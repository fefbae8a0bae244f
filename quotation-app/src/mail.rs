//! Emails a rendered quotation over SMTP.

use std::sync::Arc;

use lettre::message::{header::ContentType, Attachment, Mailbox, Message, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{SmtpTransport, Transport};

use crate::images::{image_refs, resolve_images};
use crate::pdf::{render_quotation, RenderOptions, RenderedPdf};
use crate::quotation::Quotation;
use crate::settings::{Settings, SmtpTlsMode};
use crate::store::Store;
use crate::{format_currency, QuotationError, Result};

#[derive(Debug, Clone, Default)]
pub struct EmailRequest {
    pub to: String,
    pub subject: Option<String>,
    pub body: Option<String>,
}

fn email_err(msg: impl Into<String>) -> QuotationError {
    QuotationError::Email(msg.into())
}

pub fn default_subject(settings: &Settings, q: &Quotation) -> String {
    let company = settings.company_name.trim();
    if company.is_empty() {
        format!("Quotation {}", q.quotation_number.trim())
    } else {
        format!("Quotation {} from {}", q.quotation_number.trim(), company)
    }
}

pub fn default_body(settings: &Settings, q: &Quotation) -> String {
    let greeting = match q.customer_name.trim() {
        "" => "Hello,".to_string(),
        name => format!("Dear {name},"),
    };
    let currency = if q.currency.trim().is_empty() {
        settings.default_currency.as_str()
    } else {
        q.currency.as_str()
    };

    let mut body = format!(
        "{greeting}\n\nPlease find attached quotation {} for a total of {}.",
        q.quotation_number.trim(),
        format_currency(currency, q.totals().grand_total)
    );
    if !q.valid_until.trim().is_empty() {
        body.push_str(&format!(" The quotation is valid until {}.", q.valid_until.trim()));
    }
    body.push_str("\n\nKind regards,\n");
    for line in [settings.signatory_name.trim(), settings.company_name.trim()] {
        if !line.is_empty() {
            body.push_str(line);
            body.push('\n');
        }
    }
    body
}

/// Builds the message with the PDF attached. Validates addresses and the
/// SMTP settings before anything leaves the process.
pub fn build_message(settings: &Settings, q: &Quotation, pdf: &RenderedPdf, req: &EmailRequest) -> Result<Message> {
    settings.validate_smtp()?;

    if req.to.trim().is_empty() {
        return Err(QuotationError::validation("Recipient email address is required."));
    }
    let subject = req
        .subject
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_subject(settings, q));
    let body = req
        .body
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_body(settings, q));

    let from_mailbox: Mailbox = settings
        .smtp_from
        .trim()
        .parse()
        .map_err(|_| QuotationError::validation("Invalid From address in SMTP settings."))?;
    let to_mailbox: Mailbox = req
        .to
        .trim()
        .parse()
        .map_err(|_| QuotationError::validation("Invalid recipient email address."))?;

    let content_type = ContentType::parse(mime::APPLICATION_PDF.essence_str())
        .map_err(|e| email_err(format!("Failed to build PDF attachment content type: {e}")))?;
    let attachment = Attachment::new(pdf.file_name.clone()).body(pdf.bytes.clone(), content_type);

    Message::builder()
        .from(from_mailbox)
        .to(to_mailbox)
        .subject(subject)
        .multipart(MultiPart::mixed().singlepart(SinglePart::plain(body)).singlepart(attachment))
        .map_err(|e| email_err(format!("Failed to build email: {e}")))
}

fn build_smtp_transport(s: &Settings) -> Result<SmtpTransport> {
    s.validate_smtp()?;
    let port = u16::try_from(s.smtp_port)
        .map_err(|_| QuotationError::validation("SMTP is not configured: invalid port."))?;
    let host = s.smtp_host.trim();
    tracing::debug!(host, port, tls = s.smtp_use_tls, mode = s.resolved_tls_mode().as_str(), "smtp transport");

    let mut builder = if s.smtp_use_tls {
        match s.resolved_tls_mode() {
            SmtpTlsMode::Implicit => {
                let tls_params = TlsParameters::new(host.to_string())
                    .map_err(|e| email_err(format!("Failed to configure TLS parameters: {e}")))?;
                SmtpTransport::builder_dangerous(host)
                    .port(port)
                    .tls(Tls::Wrapper(tls_params))
            }
            SmtpTlsMode::Starttls => SmtpTransport::starttls_relay(host)
                .map_err(|e| email_err(format!("Invalid SMTP host: {e}")))?
                .port(port),
        }
    } else {
        SmtpTransport::builder_dangerous(host).port(port)
    };

    if !s.smtp_user.trim().is_empty() {
        builder = builder.credentials(Credentials::new(s.smtp_user.clone(), s.smtp_password.clone()));
    }

    Ok(builder.build())
}

/// Sends on the blocking pool; lettre's SMTP transport is synchronous.
pub async fn send_message(settings: &Settings, message: Message) -> Result<()> {
    let settings = Arc::new(settings.clone());
    tokio::task::spawn_blocking(move || {
        let transport = build_smtp_transport(&settings)?;
        transport.send(&message).map_err(|e| {
            tracing::error!(error = %e, "email send failed");
            email_err(format!("Failed to send email: {e}"))
        })?;
        Ok::<(), QuotationError>(())
    })
    .await
    .map_err(|e| QuotationError::Task(e.to_string()))?
}

/// Renders the stored quotation, emails it and marks it sent.
pub async fn send_quotation(
    store: &Store,
    http: &reqwest::Client,
    id: &str,
    req: &EmailRequest,
    options: &RenderOptions,
) -> Result<Quotation> {
    let mut q = store
        .get_quotation(id)
        .await?
        .ok_or_else(|| QuotationError::not_found("quotation", id))?;
    let settings = store.settings().await?;

    q.validate_for_save()?;
    settings.validate_smtp()?;
    if req.to.trim().is_empty() {
        return Err(QuotationError::validation("Recipient email address is required."));
    }

    let images = resolve_images(http, &image_refs(&q, &settings)).await;
    let pdf = render_quotation(&q, &settings, &images, options)?;
    let message = build_message(&settings, &q, &pdf, req)?;
    send_message(&settings, message).await?;

    q.mark_sent();
    store.save_quotation(&mut q).await?;
    tracing::info!(id = %q.id, number = %q.quotation_number, to = %req.to.trim(), "quotation sent");
    Ok(q)
}

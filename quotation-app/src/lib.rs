//! Quotation builder core.
//!
//! A quotation is an explicit aggregate: titled groups of priced line items,
//! optional add-on services per item, free-form proposal sections and cached
//! totals. Commands on [`Quotation`] keep every derived figure current; the
//! [`pdf`] module lays the aggregate out as a paginated document and the
//! [`store`] module persists it to SQLite.

use time::{format_description::well_known::Rfc3339, Date, OffsetDateTime};

pub mod catalog;
mod error;
pub mod images;
pub mod mail;
pub mod pdf;
pub mod quotation;
pub mod settings;
pub mod store;

pub use catalog::{Catalog, Customer, MemoryCatalog, PrimaryContact, Product, ProductService};
pub use error::{QuotationError, Result};
pub use images::{image_refs, resolve_images, ImageSet};
pub use mail::{send_quotation, EmailRequest};
pub use pdf::{render_quotation, RenderOptions, RenderedPdf};
pub use quotation::{
    DiscountType, ItemUpdate, PrintVisibility, ProductSelection, Quotation, QuotationItem,
    QuotationSection, QuotationStatus, QuotationTitle, SectionType, ServiceCache, TaxType, Totals,
};
pub use settings::{Settings, SettingsPatch, SmtpTlsMode};
pub use store::{resolve_db_path, QuotationSummary, Store};

pub(crate) fn now_iso() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

pub(crate) fn format_ymd(d: Date) -> String {
    format!("{:04}-{:02}-{:02}", d.year(), u8::from(d.month()), d.day())
}

pub(crate) fn today_ymd() -> String {
    format_ymd(OffsetDateTime::now_utc().date())
}

/// File-name-safe form of `input`: whitespace becomes `-`, runs of other
/// unsafe characters collapse to one `_`, and separators are trimmed from
/// both ends.
pub fn sanitize_filename(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.trim().chars() {
        let mapped = match ch {
            c if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_') => c,
            c if c.is_whitespace() => '-',
            _ => '_',
        };
        if mapped == '_' && out.ends_with('_') {
            continue;
        }
        out.push(mapped);
    }
    let cleaned = out.trim_matches(|c| matches!(c, '-' | '_' | '.'));
    if cleaned.is_empty() {
        "quotation".to_string()
    } else {
        cleaned.to_string()
    }
}

/// `quotation-{number}.pdf`
pub fn pdf_file_name(quotation_number: &str) -> String {
    sanitize_filename(&format!("quotation-{}.pdf", quotation_number.trim()))
}

/// Two decimals with comma thousands separators, e.g. `1,234,567.50`.
pub fn format_money(v: f64) -> String {
    let s = format!("{:.2}", v.abs());
    let (int_part, dec_part) = s.split_once('.').unwrap_or((s.as_str(), "00"));

    let mut out = String::new();
    let chars: Vec<char> = int_part.chars().collect();
    let mut cnt = 0;
    for i in (0..chars.len()).rev() {
        if cnt == 3 {
            out.push(',');
            cnt = 0;
        }
        out.push(chars[i]);
        cnt += 1;
    }
    let int_with_sep: String = out.chars().rev().collect();
    let sign = if v < 0.0 && s != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, int_with_sep, dec_part)
}

pub fn format_currency(currency: &str, v: f64) -> String {
    let code = currency.trim();
    if code.is_empty() {
        format_money(v)
    } else {
        format!("{} {}", code, format_money(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_groups_thousands() {
        assert_eq!(format_money(0.0), "0.00");
        assert_eq!(format_money(232.5), "232.50");
        assert_eq!(format_money(1234567.891), "1,234,567.89");
        assert_eq!(format_money(-1500.0), "-1,500.00");
    }

    #[test]
    fn file_name_is_sanitized() {
        assert_eq!(pdf_file_name("QT-0007"), "quotation-QT-0007.pdf");
        assert_eq!(pdf_file_name("QT/7"), "quotation-QT_7.pdf");
        assert_eq!(pdf_file_name("QT 2026/\\07"), "quotation-QT-2026_07.pdf");
        assert_eq!(sanitize_filename(" /.. "), "quotation");
    }

    #[test]
    fn currency_prefix() {
        assert_eq!(format_currency("INR", 25.0), "INR 25.00");
        assert_eq!(format_currency(" ", 25.0), "25.00");
    }
}

//! Company profile, bank details, numbering and SMTP configuration.

use serde::{Deserialize, Serialize};

use crate::{QuotationError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SmtpTlsMode {
    Implicit,
    Starttls,
}

impl SmtpTlsMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmtpTlsMode::Implicit => "implicit",
            SmtpTlsMode::Starttls => "starttls",
        }
    }

    pub fn default_for_port(port: i64) -> SmtpTlsMode {
        match port {
            465 => SmtpTlsMode::Implicit,
            _ => SmtpTlsMode::Starttls,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub is_configured: bool,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub company_address: String,
    #[serde(default)]
    pub company_email: String,
    #[serde(default)]
    pub company_phone: String,
    #[serde(default)]
    pub company_website: String,
    #[serde(default)]
    pub tax_id: String,

    #[serde(default)]
    pub bank_name: String,
    #[serde(default)]
    pub bank_account_name: String,
    #[serde(default)]
    pub bank_account_number: String,
    #[serde(default)]
    pub bank_branch: String,
    #[serde(default)]
    pub bank_ifsc: String,
    #[serde(default)]
    pub bank_swift: String,

    #[serde(default)]
    pub logo_url: String,
    #[serde(default)]
    pub signatory_name: String,
    #[serde(default)]
    pub signatory_designation: String,

    pub quotation_prefix: String,
    pub next_quotation_number: i64,
    pub default_currency: String,
    #[serde(default = "default_validity_days")]
    pub default_validity_days: i64,

    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: i64,
    #[serde(default)]
    pub smtp_user: String,
    #[serde(default)]
    pub smtp_password: String,
    #[serde(default)]
    pub smtp_from: String,
    #[serde(default = "default_smtp_use_tls")]
    pub smtp_use_tls: bool,
    #[serde(default)]
    pub smtp_tls_mode: Option<SmtpTlsMode>,
}

fn default_validity_days() -> i64 {
    30
}

fn default_smtp_port() -> i64 {
    587
}

fn default_smtp_use_tls() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            is_configured: false,
            company_name: String::new(),
            company_address: String::new(),
            company_email: String::new(),
            company_phone: String::new(),
            company_website: String::new(),
            tax_id: String::new(),
            bank_name: String::new(),
            bank_account_name: String::new(),
            bank_account_number: String::new(),
            bank_branch: String::new(),
            bank_ifsc: String::new(),
            bank_swift: String::new(),
            logo_url: String::new(),
            signatory_name: String::new(),
            signatory_designation: String::new(),
            quotation_prefix: "QT".to_string(),
            next_quotation_number: 1,
            default_currency: "INR".to_string(),
            default_validity_days: default_validity_days(),
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            smtp_user: String::new(),
            smtp_password: String::new(),
            smtp_from: String::new(),
            smtp_use_tls: true,
            smtp_tls_mode: Some(SmtpTlsMode::Starttls),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub is_configured: Option<bool>,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
    pub company_email: Option<String>,
    pub company_phone: Option<String>,
    pub company_website: Option<String>,
    pub tax_id: Option<String>,
    pub bank_name: Option<String>,
    pub bank_account_name: Option<String>,
    pub bank_account_number: Option<String>,
    pub bank_branch: Option<String>,
    pub bank_ifsc: Option<String>,
    pub bank_swift: Option<String>,
    pub logo_url: Option<String>,
    pub signatory_name: Option<String>,
    pub signatory_designation: Option<String>,
    pub quotation_prefix: Option<String>,
    pub next_quotation_number: Option<i64>,
    pub default_currency: Option<String>,
    pub default_validity_days: Option<i64>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<i64>,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
    pub smtp_use_tls: Option<bool>,
    pub smtp_tls_mode: Option<SmtpTlsMode>,
}

macro_rules! apply_fields {
    ($target:expr, $patch:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(v) = $patch.$field {
                $target.$field = v;
            }
        )+
    };
}

impl Settings {
    pub fn apply(&mut self, patch: SettingsPatch) -> Result<()> {
        if let Some(n) = patch.next_quotation_number {
            if n < 1 {
                return Err(QuotationError::validation("Next quotation number must be at least 1."));
            }
        }
        if let Some(p) = patch.smtp_port {
            if !(1..=65535).contains(&p) {
                return Err(QuotationError::validation("SMTP port must be between 1 and 65535."));
            }
        }
        if let Some(d) = patch.default_validity_days {
            if d < 0 {
                return Err(QuotationError::validation("Validity days cannot be negative."));
            }
        }

        let port_changed = patch.smtp_port.is_some();
        let mode = patch.smtp_tls_mode;

        apply_fields!(
            self,
            patch,
            is_configured,
            company_name,
            company_address,
            company_email,
            company_phone,
            company_website,
            tax_id,
            bank_name,
            bank_account_name,
            bank_account_number,
            bank_branch,
            bank_ifsc,
            bank_swift,
            logo_url,
            signatory_name,
            signatory_designation,
            quotation_prefix,
            next_quotation_number,
            default_currency,
            default_validity_days,
            smtp_host,
            smtp_port,
            smtp_user,
            smtp_password,
            smtp_from,
            smtp_use_tls,
        );

        if mode.is_some() {
            self.smtp_tls_mode = mode;
        } else if port_changed {
            self.smtp_tls_mode = Some(SmtpTlsMode::default_for_port(self.smtp_port));
        }
        Ok(())
    }

    pub fn resolved_tls_mode(&self) -> SmtpTlsMode {
        self.smtp_tls_mode
            .unwrap_or_else(|| SmtpTlsMode::default_for_port(self.smtp_port))
    }

    /// Number for the next quotation, e.g. `QT-0007`.
    pub fn format_quotation_number(&self, n: i64) -> String {
        let prefix = self.quotation_prefix.trim();
        if prefix.is_empty() {
            format!("{:0>4}", n)
        } else {
            format!("{}-{:0>4}", prefix, n)
        }
    }

    pub fn has_bank_details(&self) -> bool {
        [
            &self.bank_name,
            &self.bank_account_name,
            &self.bank_account_number,
            &self.bank_ifsc,
            &self.bank_swift,
        ]
        .iter()
        .any(|s| !s.trim().is_empty())
    }

    pub fn validate_smtp(&self) -> Result<()> {
        if self.smtp_host.trim().is_empty() {
            return Err(QuotationError::validation("SMTP is not configured: missing host."));
        }
        if self.smtp_port <= 0 || self.smtp_port > 65535 {
            return Err(QuotationError::validation("SMTP is not configured: invalid port."));
        }
        if self.smtp_from.trim().is_empty() {
            return Err(QuotationError::validation("SMTP is not configured: missing From address."));
        }
        let user_empty = self.smtp_user.trim().is_empty();
        let pass_empty = self.smtp_password.trim().is_empty();
        if user_empty ^ pass_empty {
            return Err(QuotationError::validation(
                "SMTP auth is not configured correctly: set both user and password, or leave both empty.",
            ));
        }
        if self.smtp_use_tls {
            let mode = self.resolved_tls_mode();
            if self.smtp_port == 465 && mode != SmtpTlsMode::Implicit {
                return Err(QuotationError::validation(
                    "SMTP TLS mode mismatch: port 465 requires Implicit TLS (SMTPS).",
                ));
            }
            if self.smtp_port == 587 && mode != SmtpTlsMode::Starttls {
                return Err(QuotationError::validation("SMTP TLS mode mismatch: port 587 requires STARTTLS."));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_applies_only_given_fields() {
        let mut s = Settings::default();
        s.apply(SettingsPatch {
            company_name: Some("Acme Networks".into()),
            bank_account_number: Some("00112233".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(s.company_name, "Acme Networks");
        assert_eq!(s.quotation_prefix, "QT");
        assert!(s.has_bank_details());
    }

    #[test]
    fn port_change_resets_tls_mode_unless_given() {
        let mut s = Settings::default();
        s.apply(SettingsPatch {
            smtp_port: Some(465),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(s.resolved_tls_mode(), SmtpTlsMode::Implicit);

        s.apply(SettingsPatch {
            smtp_port: Some(2525),
            smtp_tls_mode: Some(SmtpTlsMode::Implicit),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(s.resolved_tls_mode(), SmtpTlsMode::Implicit);
    }

    #[test]
    fn invalid_patch_is_rejected_untouched() {
        let mut s = Settings::default();
        let err = s.apply(SettingsPatch {
            company_name: Some("Changed".into()),
            next_quotation_number: Some(0),
            ..Default::default()
        });
        assert!(err.is_err());
        assert_eq!(s.company_name, "");
    }

    #[test]
    fn quotation_number_format() {
        let s = Settings::default();
        assert_eq!(s.format_quotation_number(7), "QT-0007");
        assert_eq!(s.format_quotation_number(12345), "QT-12345");
    }

    #[test]
    fn smtp_validation() {
        let mut s = Settings::default();
        assert!(s.validate_smtp().is_err());
        s.smtp_host = "smtp.example.test".into();
        s.smtp_from = "Sales <sales@example.test>".into();
        assert!(s.validate_smtp().is_ok());
        s.smtp_user = "sales".into();
        assert!(s.validate_smtp().is_err());
        s.smtp_password = "secret".into();
        s.smtp_port = 465;
        s.smtp_tls_mode = Some(SmtpTlsMode::Starttls);
        assert!(s.validate_smtp().is_err());
    }
}

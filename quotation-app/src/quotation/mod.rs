//! The quotation aggregate and the commands that mutate it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use time::{Duration, OffsetDateTime};

use crate::catalog::{Customer, ProductService};
use crate::{format_ymd, now_iso, QuotationError, Result};

mod editor;
mod item;
mod services;
mod title;
mod totals;

pub use editor::{ItemUpdate, ProductSelection};
pub use item::{line_breakdown, DiscountType, LineBreakdown, PrintVisibility, QuotationItem, RateKind, TaxType};
pub use services::{auto_description, ServiceCache, AUTO_DESCRIPTION_PREFIX};
pub use title::QuotationTitle;
pub use totals::{TitleTotals, Totals};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotationStatus {
    #[default]
    Draft,
    Sent,
    Approved,
    Rejected,
}

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotationStatus::Draft => "draft",
            QuotationStatus::Sent => "sent",
            QuotationStatus::Approved => "approved",
            QuotationStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for QuotationStatus {
    type Err = QuotationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(QuotationStatus::Draft),
            "sent" => Ok(QuotationStatus::Sent),
            "approved" => Ok(QuotationStatus::Approved),
            "rejected" => Ok(QuotationStatus::Rejected),
            other => Err(QuotationError::validation(format!(
                "Invalid quotation status: {other}. Use draft, sent, approved or rejected"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    CoverPage,
    ExecutiveSummary,
    CompanyOverview,
    ScopeOfWork,
    QuotationItems,
    PaymentTerms,
    TermsConditions,
    Acceptance,
}

impl SectionType {
    pub const ALL: [SectionType; 8] = [
        SectionType::CoverPage,
        SectionType::ExecutiveSummary,
        SectionType::CompanyOverview,
        SectionType::ScopeOfWork,
        SectionType::QuotationItems,
        SectionType::PaymentTerms,
        SectionType::TermsConditions,
        SectionType::Acceptance,
    ];

    pub fn default_title(&self) -> &'static str {
        match self {
            SectionType::CoverPage => "Cover Page",
            SectionType::ExecutiveSummary => "Executive Summary",
            SectionType::CompanyOverview => "Company Overview",
            SectionType::ScopeOfWork => "Scope of Work",
            SectionType::QuotationItems => "Quotation Items",
            SectionType::PaymentTerms => "Payment Terms",
            SectionType::TermsConditions => "Terms & Conditions",
            SectionType::Acceptance => "Acceptance",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationSection {
    pub id: String,
    #[serde(rename = "type")]
    pub section_type: SectionType,
    pub title: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub data: Value,
}

fn default_enabled() -> bool {
    true
}

pub fn default_sections() -> Vec<QuotationSection> {
    SectionType::ALL
        .iter()
        .enumerate()
        .map(|(idx, t)| QuotationSection {
            id: uuid::Uuid::new_v4().to_string(),
            section_type: *t,
            title: t.default_title().to_string(),
            enabled: true,
            order: idx as u32,
            data: match t {
                SectionType::QuotationItems => json!({}),
                _ => Value::Null,
            },
        })
        .collect()
}

const DEFAULT_VALIDITY_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quotation {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub quotation_number: String,
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub status: QuotationStatus,
    #[serde(default)]
    pub issue_date: String,
    #[serde(default)]
    pub valid_until: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub terms: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub customer_company: String,
    #[serde(default)]
    pub customer_email: String,
    #[serde(default)]
    pub customer_phone: String,
    #[serde(default = "default_sections")]
    pub sections: Vec<QuotationSection>,

    #[serde(default)]
    titles: Vec<QuotationTitle>,
    #[serde(default)]
    items: Vec<QuotationItem>,
    #[serde(default)]
    selected_services: BTreeMap<String, BTreeMap<String, bool>>,
    #[serde(default)]
    service_details: BTreeMap<String, Vec<ProductService>>,
    #[serde(default)]
    collapsed_titles: Vec<String>,

    #[serde(default)]
    subtotal: f64,
    #[serde(default)]
    total_discount: f64,
    #[serde(default)]
    total_tax: f64,
    #[serde(default)]
    service_charges: f64,
    #[serde(default)]
    total_amount: f64,

    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,

    #[serde(skip)]
    service_cache: ServiceCache,
}

impl Quotation {
    /// A draft issued today, valid for 30 days, with the default sections.
    pub fn new(quotation_number: impl Into<String>) -> Self {
        let today = OffsetDateTime::now_utc().date();
        let now = now_iso();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            quotation_number: quotation_number.into(),
            customer_id: String::new(),
            status: QuotationStatus::Draft,
            issue_date: format_ymd(today),
            valid_until: format_ymd(today + Duration::days(DEFAULT_VALIDITY_DAYS)),
            currency: String::new(),
            notes: String::new(),
            terms: String::new(),
            customer_name: String::new(),
            customer_company: String::new(),
            customer_email: String::new(),
            customer_phone: String::new(),
            sections: default_sections(),
            titles: Vec::new(),
            items: Vec::new(),
            selected_services: BTreeMap::new(),
            service_details: BTreeMap::new(),
            collapsed_titles: Vec::new(),
            subtotal: 0.0,
            total_discount: 0.0,
            total_tax: 0.0,
            service_charges: 0.0,
            total_amount: 0.0,
            created_by: String::new(),
            created_at: now.clone(),
            updated_at: now,
            service_cache: ServiceCache::default(),
        }
    }

    /// Parses a stored or hand-written document and re-derives every cached figure.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut q: Quotation = serde_json::from_str(json)?;
        if let Some(orphan) = q.items.iter().find(|i| q.title(&i.title_id).is_none()) {
            return Err(QuotationError::validation(format!(
                "Item {} belongs to unknown title {}.",
                orphan.id, orphan.title_id
            )));
        }
        if q.id.trim().is_empty() {
            q.id = uuid::Uuid::new_v4().to_string();
        }
        if !q.sections.iter().any(|s| s.section_type == SectionType::QuotationItems) {
            let order = q.sections.iter().map(|s| s.order + 1).max().unwrap_or(0);
            q.sections.push(QuotationSection {
                id: uuid::Uuid::new_v4().to_string(),
                section_type: SectionType::QuotationItems,
                title: SectionType::QuotationItems.default_title().to_string(),
                enabled: true,
                order,
                data: json!({}),
            });
        }
        q.renumber_items();
        q.refresh_totals();
        Ok(q)
    }

    pub fn set_validity_days(&mut self, days: i64) {
        let issued = time::Date::parse(
            &self.issue_date,
            &time::macros::format_description!("[year]-[month]-[day]"),
        )
        .unwrap_or_else(|_| OffsetDateTime::now_utc().date());
        self.valid_until = format_ymd(issued + Duration::days(days.max(0)));
    }

    /// Binds the customer and copies its contact fields onto the document.
    pub fn assign_customer(&mut self, customer: &Customer) {
        self.customer_id = customer.id.clone();
        self.customer_company = customer.company_name.clone();
        self.customer_name = customer.primary_contact.name.clone();
        self.customer_email = customer.primary_contact.email.clone();
        self.customer_phone = customer.primary_contact.phone.clone();
        self.touch();
    }

    pub fn titles(&self) -> &[QuotationTitle] {
        &self.titles
    }

    pub fn items(&self) -> &[QuotationItem] {
        &self.items
    }

    pub fn item(&self, item_id: &str) -> Option<&QuotationItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    pub fn items_in<'a>(&'a self, title_id: &'a str) -> impl Iterator<Item = &'a QuotationItem> + 'a {
        self.items.iter().filter(move |i| i.title_id == title_id)
    }

    /// Titles with at least one item, in title order.
    pub fn titles_with_items(&self) -> Vec<&QuotationTitle> {
        self.titles
            .iter()
            .filter(|t| self.items.iter().any(|i| i.title_id == t.id))
            .collect()
    }

    pub fn totals(&self) -> Totals {
        Totals {
            subtotal: self.subtotal,
            total_discount: self.total_discount,
            total_tax: self.total_tax,
            service_charges: self.service_charges,
            grand_total: self.total_amount,
        }
    }

    pub fn title_totals(&self) -> Vec<TitleTotals> {
        self.titles
            .iter()
            .map(|t| {
                let items: Vec<&QuotationItem> = self.items_in(&t.id).collect();
                TitleTotals {
                    title_id: t.id.clone(),
                    title: t.title.clone(),
                    item_count: items.len(),
                    totals: Totals::from_items(items),
                }
            })
            .collect()
    }

    /// Re-derives item amounts and the aggregate totals, and caches them
    /// onto the document and the items section.
    pub fn refresh_totals(&mut self) {
        for item in &mut self.items {
            item.recalculate();
        }
        let t = Totals::from_items(&self.items);
        self.subtotal = t.subtotal;
        self.total_discount = t.total_discount;
        self.total_tax = t.total_tax;
        self.service_charges = t.service_charges;
        self.total_amount = t.grand_total;

        let per_title = self.title_totals();
        if let Some(section) = self
            .sections
            .iter_mut()
            .find(|s| s.section_type == SectionType::QuotationItems)
        {
            section.data = json!({
                "subtotal": t.subtotal,
                "totalDiscount": t.total_discount,
                "totalTax": t.total_tax,
                "serviceCharges": t.service_charges,
                "totalAmount": t.grand_total,
                "titleTotals": per_title,
            });
        }
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = now_iso();
    }

    /// Recomputes display codes (`{title}.{item}`, both 1-based).
    pub(crate) fn renumber_items(&mut self) {
        for (t_idx, title) in self.titles.iter().enumerate() {
            let mut n = 0;
            for item in self.items.iter_mut().filter(|i| i.title_id == title.id) {
                n += 1;
                item.item_id = format!("{}.{}", t_idx + 1, n);
            }
        }
    }

    /// Enabled sections sorted by their order.
    pub fn sections_in_order(&self) -> Vec<&QuotationSection> {
        let mut out: Vec<&QuotationSection> = self.sections.iter().filter(|s| s.enabled).collect();
        out.sort_by_key(|s| s.order);
        out
    }

    pub fn section(&self, section_type: SectionType) -> Option<&QuotationSection> {
        self.sections.iter().find(|s| s.section_type == section_type)
    }

    pub fn set_section_enabled(&mut self, section_type: SectionType, enabled: bool) -> Result<()> {
        let section = self
            .sections
            .iter_mut()
            .find(|s| s.section_type == section_type)
            .ok_or_else(|| QuotationError::not_found("section", format!("{section_type:?}")))?;
        section.enabled = enabled;
        self.touch();
        Ok(())
    }

    /// Free-form content of a section. The items section's data is derived and cannot be set.
    pub fn set_section_data(&mut self, section_type: SectionType, data: Value) -> Result<()> {
        if section_type == SectionType::QuotationItems {
            return Err(QuotationError::validation(
                "The quotation items section is edited through titles and items.",
            ));
        }
        let section = self
            .sections
            .iter_mut()
            .find(|s| s.section_type == section_type)
            .ok_or_else(|| QuotationError::not_found("section", format!("{section_type:?}")))?;
        section.data = data;
        self.touch();
        Ok(())
    }

    /// Moves a section to `position` (0-based) and rewrites every order value.
    pub fn move_section(&mut self, section_type: SectionType, position: usize) -> Result<()> {
        self.sections.sort_by_key(|s| s.order);
        let from = self
            .sections
            .iter()
            .position(|s| s.section_type == section_type)
            .ok_or_else(|| QuotationError::not_found("section", format!("{section_type:?}")))?;
        let section = self.sections.remove(from);
        let to = position.min(self.sections.len());
        self.sections.insert(to, section);
        for (idx, s) in self.sections.iter_mut().enumerate() {
            s.order = idx as u32;
        }
        self.touch();
        Ok(())
    }

    pub fn mark_sent(&mut self) {
        self.set_status(QuotationStatus::Sent);
    }

    pub fn approve(&mut self) {
        self.set_status(QuotationStatus::Approved);
    }

    pub fn reject(&mut self) {
        self.set_status(QuotationStatus::Rejected);
    }

    /// Back to draft for further editing.
    pub fn reopen(&mut self) {
        self.set_status(QuotationStatus::Draft);
    }

    fn set_status(&mut self, status: QuotationStatus) {
        self.status = status;
        self.touch();
    }

    /// Checks run before any save or send.
    pub fn validate_for_save(&self) -> Result<()> {
        if self.customer_id.trim().is_empty() {
            return Err(QuotationError::validation("Please select a customer."));
        }
        if self.quotation_number.trim().is_empty() {
            return Err(QuotationError::validation("Quotation number is required."));
        }
        if self.items.is_empty() {
            return Err(QuotationError::validation("Please add at least one item."));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PrimaryContact;

    #[test]
    fn new_quotation_has_default_sections_in_order() {
        let q = Quotation::new("QT-0001");
        let order: Vec<SectionType> = q.sections_in_order().iter().map(|s| s.section_type).collect();
        assert_eq!(order, SectionType::ALL.to_vec());
        assert_eq!(q.status, QuotationStatus::Draft);
        assert!(q.valid_until > q.issue_date);
    }

    #[test]
    fn validation_rejects_incomplete_documents() {
        let mut q = Quotation::new("QT-0001");
        assert!(matches!(q.validate_for_save(), Err(QuotationError::Validation(m)) if m.contains("customer")));

        q.assign_customer(&Customer {
            id: "c1".into(),
            company_name: "Acme".into(),
            primary_contact: PrimaryContact {
                name: "Jo".into(),
                email: "jo@acme.test".into(),
                phone: "555".into(),
                designation: "CTO".into(),
            },
        });
        assert_eq!(q.customer_company, "Acme");
        assert!(matches!(q.validate_for_save(), Err(QuotationError::Validation(m)) if m.contains("item")));

        let t = q.add_title();
        q.add_item(&t).unwrap();
        q.quotation_number = "  ".into();
        assert!(matches!(q.validate_for_save(), Err(QuotationError::Validation(m)) if m.contains("number")));
        q.quotation_number = "QT-0001".into();
        assert!(q.validate_for_save().is_ok());
    }

    #[test]
    fn move_section_rewrites_orders() {
        let mut q = Quotation::new("QT-0001");
        q.move_section(SectionType::QuotationItems, 0).unwrap();
        q.set_section_enabled(SectionType::CoverPage, false).unwrap();
        let order: Vec<SectionType> = q.sections_in_order().iter().map(|s| s.section_type).collect();
        assert_eq!(order[0], SectionType::QuotationItems);
        assert!(!order.contains(&SectionType::CoverPage));
        let mut orders: Vec<u32> = q.sections.iter().map(|s| s.order).collect();
        orders.sort();
        assert_eq!(orders, (0..SectionType::ALL.len() as u32).collect::<Vec<_>>());
    }

    #[test]
    fn items_section_data_is_derived() {
        let mut q = Quotation::new("QT-0001");
        assert!(q.set_section_data(SectionType::QuotationItems, json!({"x": 1})).is_err());
        q.set_section_data(SectionType::ExecutiveSummary, json!(["Line one"])).unwrap();

        let t = q.add_title();
        let i = q.add_item(&t).unwrap();
        q.update_item(&i, ItemUpdate::Rate(40.0)).unwrap();
        let data = &q.section(SectionType::QuotationItems).unwrap().data;
        assert_eq!(data["totalAmount"], json!(40.0));
    }

    #[test]
    fn from_json_recomputes_cached_figures() {
        let doc = r#"{
            "quotationNumber": "QT-9",
            "customerId": "c1",
            "titles": [{"id": "t1", "title": "Hardware"}],
            "items": [
                {"id": "a", "titleId": "t1", "quantity": 2, "rate": 100, "discount": 10, "amount": 1},
                {"id": "b", "titleId": "t1", "quantity": 1, "rate": 50, "tax": 5}
            ],
            "totalAmount": 12345
        }"#;
        let q = Quotation::from_json(doc).unwrap();
        assert!((q.totals().grand_total - 232.5).abs() < 1e-9);
        assert_eq!(q.item("b").unwrap().item_id, "1.2");
        assert!(q.section(SectionType::QuotationItems).is_some());
    }

    #[test]
    fn from_json_rejects_items_without_a_title() {
        let doc = r#"{
            "quotationNumber": "QT-9",
            "customerId": "c1",
            "titles": [{"id": "t1", "title": "Hardware"}],
            "items": [
                {"id": "a", "titleId": "t1", "rate": 10},
                {"id": "b", "titleId": "ghost", "rate": 1000}
            ]
        }"#;
        let err = Quotation::from_json(doc).unwrap_err();
        assert!(matches!(err, QuotationError::Validation(m) if m.contains("ghost")));
    }

    #[test]
    fn status_commands_move_between_states() {
        let mut q = Quotation::new("QT-0001");
        q.mark_sent();
        assert_eq!(q.status, QuotationStatus::Sent);
        q.approve();
        assert_eq!(q.status, QuotationStatus::Approved);
        q.reject();
        assert_eq!(q.status, QuotationStatus::Rejected);
        q.reopen();
        assert_eq!(q.status, QuotationStatus::Draft);
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Approved".parse::<QuotationStatus>().unwrap(), QuotationStatus::Approved);
        assert!("paid".parse::<QuotationStatus>().is_err());
    }
}

//! Paginated A4 rendering of a quotation.

use std::path::{Path, PathBuf};

use crate::images::ImageSet;
use crate::quotation::{Quotation, QuotationSection, SectionType};
use crate::settings::Settings;
use crate::{pdf_file_name, today_ymd, Result};

mod canvas;
mod content;
mod items;
mod layout;
mod text;

use canvas::Canvas;
use items::ItemsBlock;
use layout::{content_width, CONTENT_LEFT, CONTENT_RIGHT};

pub use layout::{column_layout, Column, ColumnSlot, NumberingPlan, PageCursor};

const LOGO_MAX_W: f32 = 48.0;
const LOGO_MAX_H: f32 = 20.0;

#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// TrueType font to embed; the built-in Helvetica is used without one.
    pub font: Option<Vec<u8>>,
    /// Date printed in every page footer.
    pub generated_on: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            font: None,
            generated_on: today_ymd(),
        }
    }
}

/// Output of one rendering.
#[derive(Debug, Clone)]
pub struct RenderedPdf {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub numbering: NumberingPlan,
}

impl RenderedPdf {
    /// Writes the document into `dir` under its file name.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

pub fn render_quotation(
    quotation: &Quotation,
    settings: &Settings,
    images: &ImageSet,
    options: &RenderOptions,
) -> Result<RenderedPdf> {
    let doc_title = format!("Quotation {}", quotation.quotation_number.trim());
    let mut canvas = Canvas::new(&doc_title, options.font.as_deref())?;

    let currency = if quotation.currency.trim().is_empty() {
        settings.default_currency.trim().to_string()
    } else {
        quotation.currency.trim().to_string()
    };

    draw_header(&mut canvas, quotation, settings, images);

    let block = ItemsBlock {
        titles: quotation
            .titles_with_items()
            .into_iter()
            .map(|t| (t, quotation.items_in(&t.id).collect()))
            .collect(),
        title_totals: quotation.title_totals(),
        totals: quotation.totals(),
        currency,
    };

    let mut numbering = None;
    for section in quotation.sections_in_order() {
        match section.section_type {
            SectionType::QuotationItems => {
                numbering = Some(items::draw_items_block(&mut canvas, &block, settings, images));
                items::draw_notes(&mut canvas, "Notes", &quotation.notes);
                items::draw_notes(&mut canvas, "Terms", &quotation.terms);
            }
            _ => draw_free_section(&mut canvas, section),
        }
    }

    let numbering = numbering.unwrap_or_else(|| NumberingPlan::new(0, false));
    let page_count = canvas.page_count();
    let bytes = canvas.finish(&options.generated_on)?;

    tracing::info!(
        number = %quotation.quotation_number,
        pages = page_count,
        bytes = bytes.len(),
        "quotation rendered"
    );

    Ok(RenderedPdf {
        file_name: pdf_file_name(&quotation.quotation_number),
        bytes,
        page_count,
        numbering,
    })
}

fn draw_free_section(canvas: &mut Canvas<'_>, section: &QuotationSection) {
    if content::is_blank(&section.data) {
        return;
    }
    let title = if section.title.trim().is_empty() {
        section.section_type.default_title()
    } else {
        section.title.trim()
    };
    canvas.ensure(14.0);
    canvas.cursor.advance(6.0);
    canvas.text(title, 11.0, CONTENT_LEFT, canvas.cursor.y, true);
    canvas.cursor.advance(2.0);
    canvas.rule(CONTENT_LEFT, CONTENT_RIGHT, canvas.cursor.y, 0.4);
    canvas.cursor.advance(1.0);
    content::render_value(canvas, &section.data, 0);
    canvas.cursor.advance(4.0);
}

fn draw_header(canvas: &mut Canvas<'_>, q: &Quotation, settings: &Settings, images: &ImageSet) {
    let top = canvas.cursor.y;

    let logo = Some(settings.logo_url.trim())
        .filter(|s| !s.is_empty())
        .and_then(|s| images.get(s));
    let mut logo_bottom = top;
    if let Some(img) = logo {
        let (w, h) = Canvas::fit_image(img, LOGO_MAX_W, LOGO_MAX_H);
        canvas.image(img, CONTENT_RIGHT - w, top - h, w);
        logo_bottom = top - h;
    } else if !settings.logo_url.trim().is_empty() {
        tracing::warn!("company logo unavailable, rendering header without it");
    }

    let text_w = if logo.is_some() {
        content_width() - LOGO_MAX_W - 6.0
    } else {
        content_width()
    };

    let mut y = top - 5.0;
    let company = settings.company_name.trim();
    if !company.is_empty() {
        canvas.text(company, 14.0, CONTENT_LEFT, y, true);
        y -= 5.5;
    }
    let contact = [settings.company_email.trim(), settings.company_phone.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" | ");
    let tax = if settings.tax_id.trim().is_empty() {
        String::new()
    } else {
        format!("Tax ID: {}", settings.tax_id.trim())
    };
    for raw in [settings.company_address.trim(), contact.as_str(), settings.company_website.trim(), tax.as_str()] {
        for line in canvas.metrics.wrap(raw, 8.5, text_w) {
            canvas.text(&line, 8.5, CONTENT_LEFT, y, false);
            y -= 4.0;
        }
    }

    y = y.min(logo_bottom) - 2.0;
    canvas.rule(CONTENT_LEFT, CONTENT_RIGHT, y, 0.6);
    y -= 8.0;
    canvas.text_center("QUOTATION", 16.0, y, true);
    y -= 8.0;

    // customer on the left, document facts on the right
    let right_x = CONTENT_LEFT + content_width() * 0.58;
    let left_w = right_x - CONTENT_LEFT - 4.0;
    let mut ly = y;
    canvas.text("Quotation To", 9.0, CONTENT_LEFT, ly, true);
    ly -= 4.6;
    let customer_lines = [
        (q.customer_company.trim(), true),
        (q.customer_name.trim(), false),
        (q.customer_email.trim(), false),
        (q.customer_phone.trim(), false),
    ];
    for (value, bold) in customer_lines {
        for line in canvas.metrics.wrap(value, 9.0, left_w) {
            canvas.text(&line, 9.0, CONTENT_LEFT, ly, bold);
            ly -= 4.4;
        }
    }

    let mut facts = vec![
        ("Quotation No.", q.quotation_number.trim().to_string()),
        ("Date", q.issue_date.trim().to_string()),
        ("Valid Until", q.valid_until.trim().to_string()),
    ];
    if !q.created_by.trim().is_empty() {
        facts.push(("Prepared By", q.created_by.trim().to_string()));
    }
    let mut ry = y;
    for (label, value) in facts {
        canvas.text(&format!("{label}:"), 9.0, right_x, ry, true);
        canvas.text_right(&value, 9.0, CONTENT_RIGHT, ry, false);
        ry -= 4.6;
    }

    let bottom = ly.min(ry) - 1.0;
    canvas.rule(CONTENT_LEFT, CONTENT_RIGHT, bottom, 0.6);
    canvas.cursor.y = bottom - 4.0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Customer, PrimaryContact};
    use crate::quotation::{ItemUpdate, PrintVisibility};
    use serde_json::json;

    fn customer() -> Customer {
        Customer {
            id: "c1".into(),
            company_name: "Acme Networks".into(),
            primary_contact: PrimaryContact {
                name: "Jo Park".into(),
                email: "jo@acme.test".into(),
                phone: "+1 555 0100".into(),
                designation: "CTO".into(),
            },
        }
    }

    fn sample(title_count: usize, items_per_title: usize) -> Quotation {
        let mut q = Quotation::new("QT-0042");
        q.assign_customer(&customer());
        for t in 0..title_count {
            let tid = q.add_title();
            q.rename_title(&tid, format!("Section {t}")).unwrap();
            for i in 0..items_per_title {
                let id = q.add_item(&tid).unwrap();
                q.update_item(&id, ItemUpdate::ProductName(format!("Product {t}-{i}"))).unwrap();
                q.update_item(&id, ItemUpdate::Rate(100.0 + i as f64)).unwrap();
                q.update_item(&id, ItemUpdate::Quantity(2)).unwrap();
            }
        }
        q
    }

    fn settings() -> Settings {
        Settings {
            company_name: "Northwind Systems".into(),
            company_address: "12 Harbour Road".into(),
            bank_name: "First Bank".into(),
            bank_account_number: "00112233".into(),
            signatory_name: "Sam Lee".into(),
            ..Settings::default()
        }
    }

    fn render(q: &Quotation, s: &Settings) -> RenderedPdf {
        render_quotation(q, s, &ImageSet::default(), &RenderOptions::default()).unwrap()
    }

    #[test]
    fn renders_a_pdf_with_expected_name() {
        let out = render(&sample(1, 2), &settings());
        assert!(out.bytes.starts_with(b"%PDF"));
        assert_eq!(out.file_name, "quotation-QT-0042.pdf");
        assert_eq!(out.page_count, 1);
    }

    #[test]
    fn numbering_follows_rendered_titles() {
        let mut q = sample(3, 1);
        let removed = q.titles()[1].id.clone();
        q.remove_title(&removed).unwrap();
        // an empty title is not rendered and takes no number
        q.add_title();

        let out = render(&q, &settings());
        assert_eq!(out.numbering.titles, vec![1, 2]);
        assert_eq!(out.numbering.summary, 3);
        assert_eq!(out.numbering.grand_total, 4);
        assert_eq!(out.numbering.bank_details, Some(5));

        let out = render(&q, &Settings::default());
        assert_eq!(out.numbering.bank_details, None);
    }

    #[test]
    fn long_quotations_paginate() {
        let out = render(&sample(4, 20), &settings());
        assert!(out.page_count > 2, "got {} pages", out.page_count);
    }

    #[test]
    fn oversized_description_spills_across_pages() {
        let mut q = sample(1, 1);
        let item = q.items()[0].id.clone();
        let text = "Structured cabling and rack installation. ".repeat(400);
        q.update_item(&item, ItemUpdate::Description(text)).unwrap();
        let out = render(&q, &settings());
        assert!(out.page_count >= 2);
    }

    #[test]
    fn missing_images_and_hidden_columns_still_render() {
        let mut q = sample(1, 2);
        let tid = q.titles()[0].id.clone();
        let item = q.items()[0].id.clone();
        q.set_item_images(
            &item,
            vec![
                "https://unreachable.test/a.png".into(),
                "data:image/png;base64,xx".into(),
                "日本語の写真.png".into(),
            ],
        )
        .unwrap();
        q.set_title_visibility(
            &tid,
            PrintVisibility {
                sku: false,
                tax: false,
                ..PrintVisibility::default()
            },
        )
        .unwrap();
        let s = Settings {
            logo_url: "https://unreachable.test/logo.png".into(),
            ..settings()
        };
        let out = render(&q, &s);
        assert!(out.bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn resolved_images_are_embedded() {
        let mut q = sample(1, 1);
        let item = q.items()[0].id.clone();
        let uri = crate::images::tests::png_data_uri();
        q.set_item_images(&item, vec![uri.clone()]).unwrap();
        let images = ImageSet::from_data_uris([uri.as_str()]);
        let with = render_quotation(&q, &settings(), &images, &RenderOptions::default()).unwrap();
        let without = render(&q, &settings());
        assert!(with.bytes.len() > without.bytes.len());
    }

    #[test]
    fn free_sections_render_in_order_and_disabled_ones_are_skipped() {
        let mut q = sample(1, 1);
        q.set_section_data(
            SectionType::ExecutiveSummary,
            json!("We propose a phased rollout across three sites."),
        )
        .unwrap();
        q.set_section_data(
            SectionType::PaymentTerms,
            json!({"advance": "40% with order", "milestones": ["30% on delivery", "30% on sign-off"]}),
        )
        .unwrap();
        q.set_section_enabled(SectionType::QuotationItems, false).unwrap();
        let out = render(&q, &settings());
        assert!(out.bytes.starts_with(b"%PDF"));
        assert!(out.numbering.titles.is_empty());
    }

    #[test]
    fn written_file_uses_sanitized_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut q = sample(1, 1);
        q.quotation_number = "QT/7".into();
        let out = render(&q, &settings());
        let path = out.write_to(dir.path()).unwrap();
        assert!(path.ends_with("quotation-QT_7.pdf"));
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }
}

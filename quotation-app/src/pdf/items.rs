//! The numbered items block: one table per title, the quotation summary,
//! the grand total, bank details and the signature.

use super::canvas::Canvas;
use super::content::paragraph;
use super::layout::{column_layout, content_width, Column, ColumnSlot, NumberingPlan, CONTENT_LEFT, CONTENT_RIGHT};
use super::text::ellipsize;
use crate::images::ImageSet;
use crate::quotation::{QuotationItem, QuotationTitle, RateKind, TitleTotals, Totals};
use crate::settings::Settings;
use crate::{format_currency, format_money};

const BODY_SIZE: f32 = 8.0;
const HEAD_SIZE: f32 = 8.0;
const HEADING_SIZE: f32 = 10.5;
const LINE_H: f32 = 3.6;
const CELL_PAD_X: f32 = 1.2;
const CELL_PAD_Y: f32 = 1.6;
const HEADER_ROW_H: f32 = 7.0;
const HEADING_H: f32 = 8.0;
const TOTAL_ROW_H: f32 = 7.0;
const THUMB_H: f32 = 22.0;
const THUMB_MAX_W: f32 = 40.0;
const PLACEHOLDER_W: f32 = 30.0;
const THUMB_GAP: f32 = 3.0;
const BLOCK_GAP: f32 = 5.0;

/// What the items block draws, gathered up front.
pub(crate) struct ItemsBlock<'q> {
    pub(crate) titles: Vec<(&'q QuotationTitle, Vec<&'q QuotationItem>)>,
    pub(crate) title_totals: Vec<TitleTotals>,
    pub(crate) totals: Totals,
    pub(crate) currency: String,
}

pub(crate) fn draw_items_block(
    canvas: &mut Canvas<'_>,
    block: &ItemsBlock<'_>,
    settings: &Settings,
    images: &ImageSet,
) -> NumberingPlan {
    let plan = NumberingPlan::new(block.titles.len(), settings.has_bank_details());

    for ((title, items), n) in block.titles.iter().zip(&plan.titles) {
        draw_title_table(canvas, *n, title, items, images);
    }

    draw_summary(canvas, plan.summary, block);
    draw_grand_total(canvas, plan.grand_total, block);
    if let Some(n) = plan.bank_details {
        draw_bank_details(canvas, n, settings);
    }
    draw_signature(canvas, settings);
    plan
}

fn heading(canvas: &mut Canvas<'_>, text: &str, keep_with: f32) {
    canvas.ensure(HEADING_H + keep_with);
    let top = canvas.cursor.y;
    canvas.fill_rect_gray(CONTENT_LEFT, top, content_width(), HEADING_H, 0.88);
    canvas.text(text, HEADING_SIZE, CONTENT_LEFT + CELL_PAD_X, top - HEADING_H + 2.4, true);
    canvas.cursor.advance(HEADING_H);
}

fn draw_table_header(canvas: &mut Canvas<'_>, slots: &[ColumnSlot]) {
    let top = canvas.cursor.y;
    canvas.fill_rect_gray(slots[0].x, top, content_width(), HEADER_ROW_H, 0.94);
    let baseline = top - HEADER_ROW_H + 2.4;
    for slot in slots {
        canvas.stroke_rect(slot.x, top, slot.width, HEADER_ROW_H);
        let label = ellipsize(&canvas.metrics, slot.column.label(), HEAD_SIZE, slot.width - 2.0 * CELL_PAD_X);
        if slot.column.is_numeric() {
            canvas.text_right(&label, HEAD_SIZE, slot.x + slot.width - CELL_PAD_X, baseline, true);
        } else {
            canvas.text(&label, HEAD_SIZE, slot.x + CELL_PAD_X, baseline, true);
        }
    }
    canvas.cursor.advance(HEADER_ROW_H);
}

fn format_rate(v: f64, kind: RateKind) -> String {
    match kind {
        RateKind::Percentage => {
            let s = format!("{:.2}", v);
            let s = s.trim_end_matches('0').trim_end_matches('.');
            format!("{s}%")
        }
        RateKind::Fixed => format_money(v),
    }
}

fn cell_lines(canvas: &Canvas<'_>, item: &QuotationItem, slot: &ColumnSlot) -> Vec<String> {
    let inner = (slot.width - 2.0 * CELL_PAD_X).max(1.0);
    let wrap = |s: &str| canvas.metrics.wrap(s, BODY_SIZE, inner);
    let one = |s: String| vec![ellipsize(&canvas.metrics, &s, BODY_SIZE, inner)];
    match slot.column {
        Column::ItemId => one(item.item_id.clone()),
        Column::Product => wrap(&item.product_name),
        Column::Sku => wrap(&item.sku),
        Column::Description => wrap(&item.description),
        Column::Quantity => one(item.quantity.to_string()),
        Column::Rate => one(format_money(item.rate)),
        Column::Discount => one(format_rate(item.discount, item.discount_type)),
        Column::Tax => one(format_rate(item.tax, item.tax_type)),
        Column::ServiceCharges => one(format_money(item.service_charges)),
        Column::Amount => one(format_money(item.amount())),
    }
}

fn draw_title_table(
    canvas: &mut Canvas<'_>,
    n: u32,
    title: &QuotationTitle,
    items: &[&QuotationItem],
    images: &ImageSet,
) {
    let name = match title.title.trim() {
        "" => "ITEMS".to_string(),
        t => t.to_uppercase(),
    };
    let slots = column_layout(&title.print_visibility, CONTENT_LEFT, content_width());

    heading(canvas, &format!("{n}. {name}"), HEADER_ROW_H + LINE_H + 2.0 * CELL_PAD_Y);
    if !slots.is_empty() {
        draw_table_header(canvas, &slots);
    }

    for item in items {
        if !slots.is_empty() {
            let cells: Vec<Vec<String>> = slots.iter().map(|s| cell_lines(canvas, item, s)).collect();
            draw_row(canvas, &slots, &cells);
        }
        if title.print_visibility.images && !item.images.is_empty() {
            draw_item_images(canvas, item, images);
        }
    }

    let total: f64 = items.iter().map(|i| i.amount()).sum();
    canvas.ensure(TOTAL_ROW_H);
    amount_row(canvas, &format!("{n}. {name} TOTAL"), &format_money(total), true, 0.94);
    canvas.cursor.advance(BLOCK_GAP);
}

/// Draws one item row, continuing it on following pages when it is taller
/// than the space left; the header row is repeated on every new page.
fn draw_row(canvas: &mut Canvas<'_>, slots: &[ColumnSlot], cells: &[Vec<String>]) {
    let line_count = cells.iter().map(Vec::len).max().unwrap_or(0).max(1);
    let full_h = line_count as f32 * LINE_H + 2.0 * CELL_PAD_Y;
    if canvas.ensure(full_h) {
        draw_table_header(canvas, slots);
    }

    let descent = canvas.metrics.descent_mm(BODY_SIZE);
    let mut start = 0;
    while start < line_count {
        let available = canvas.cursor.y - super::layout::CONTENT_BOTTOM - 2.0 * CELL_PAD_Y;
        let fit = (available / LINE_H).floor().max(0.0) as usize;
        if fit == 0 {
            canvas.new_page();
            draw_table_header(canvas, slots);
            continue;
        }

        let end = (start + fit).min(line_count);
        let h = (end - start) as f32 * LINE_H + 2.0 * CELL_PAD_Y;
        let top = canvas.cursor.y;
        for (slot, lines) in slots.iter().zip(cells) {
            canvas.stroke_rect(slot.x, top, slot.width, h);
            for (k, line) in lines.iter().enumerate().take(end).skip(start) {
                let baseline = top - CELL_PAD_Y - (k - start + 1) as f32 * LINE_H + descent;
                if slot.column.is_numeric() {
                    canvas.text_right(line, BODY_SIZE, slot.x + slot.width - CELL_PAD_X, baseline, false);
                } else {
                    canvas.text(line, BODY_SIZE, slot.x + CELL_PAD_X, baseline, false);
                }
            }
        }
        canvas.cursor.advance(h);
        start = end;
    }
}

fn short_ref(reference: &str) -> String {
    let r = reference.trim();
    if r.len() > 48 {
        format!("{}...", r.chars().take(48).collect::<String>())
    } else {
        r.to_string()
    }
}

fn draw_item_images(canvas: &mut Canvas<'_>, item: &QuotationItem, images: &ImageSet) {
    let mut x = CONTENT_LEFT + CELL_PAD_X;
    canvas.cursor.advance(THUMB_GAP / 2.0);
    let mut row_open = false;

    for reference in &item.images {
        let resolved = images.get(reference);
        let w = match resolved {
            Some(img) => Canvas::fit_image(img, THUMB_MAX_W, THUMB_H).0,
            None => PLACEHOLDER_W,
        };

        if !row_open || x + w > CONTENT_RIGHT {
            if row_open {
                canvas.cursor.advance(THUMB_H + THUMB_GAP);
            }
            canvas.ensure(THUMB_H + THUMB_GAP);
            x = CONTENT_LEFT + CELL_PAD_X;
            row_open = true;
        }

        let top = canvas.cursor.y;
        match resolved {
            Some(img) => {
                let (w, h) = Canvas::fit_image(img, THUMB_MAX_W, THUMB_H);
                canvas.image(img, x, top - h, w);
            }
            None => {
                tracing::warn!(
                    item = %item.item_id,
                    reference = %short_ref(reference),
                    "image unavailable, drawing placeholder"
                );
                canvas.stroke_rect(x, top, PLACEHOLDER_W, THUMB_H);
                canvas.text("Image", 6.5, x + 2.0, top - THUMB_H / 2.0 + 1.5, false);
                canvas.text("unavailable", 6.5, x + 2.0, top - THUMB_H / 2.0 - 1.5, false);
            }
        }
        x += w + THUMB_GAP;
    }

    if row_open {
        canvas.cursor.advance(THUMB_H + THUMB_GAP);
    }
}

/// A full-width boxed row: label on the left, amount right-aligned.
fn amount_row(canvas: &mut Canvas<'_>, label: &str, amount: &str, bold: bool, fill: f32) {
    let top = canvas.cursor.y;
    if fill < 1.0 {
        canvas.fill_rect_gray(CONTENT_LEFT, top, content_width(), TOTAL_ROW_H, fill);
    }
    canvas.stroke_rect(CONTENT_LEFT, top, content_width(), TOTAL_ROW_H);
    let baseline = top - TOTAL_ROW_H + 2.4;
    let amount_w = canvas.metrics.width_mm(amount, 9.0);
    let label = ellipsize(&canvas.metrics, label, 9.0, content_width() - amount_w - 6.0 * CELL_PAD_X);
    canvas.text(&label, 9.0, CONTENT_LEFT + CELL_PAD_X, baseline, bold);
    canvas.text_right(amount, 9.0, CONTENT_RIGHT - CELL_PAD_X, baseline, bold);
    canvas.cursor.advance(TOTAL_ROW_H);
}

fn draw_summary(canvas: &mut Canvas<'_>, n: u32, block: &ItemsBlock<'_>) {
    heading(canvas, &format!("{n}. QUOTATION SUMMARY"), TOTAL_ROW_H);

    let mut idx = 0;
    for t in block.title_totals.iter().filter(|t| t.item_count > 0) {
        idx += 1;
        canvas.ensure(TOTAL_ROW_H);
        let name = match t.title.trim() {
            "" => "ITEMS".to_string(),
            t => t.to_uppercase(),
        };
        let label = format!("{idx}. {name}");
        amount_row(canvas, &label, &format_money(t.totals.grand_total), false, 1.0);
    }

    let t = &block.totals;
    let rows = [
        ("Subtotal", t.subtotal),
        ("Total Discount", t.total_discount),
        ("Total Tax", t.total_tax),
        ("Service Charges", t.service_charges),
    ];
    for (label, v) in rows {
        canvas.ensure(TOTAL_ROW_H);
        amount_row(canvas, label, &format_currency(&block.currency, v), false, 0.97);
    }
    canvas.cursor.advance(BLOCK_GAP);
}

fn draw_grand_total(canvas: &mut Canvas<'_>, n: u32, block: &ItemsBlock<'_>) {
    canvas.ensure(TOTAL_ROW_H + 2.0);
    amount_row(
        canvas,
        &format!("{n}. GRAND TOTAL"),
        &format_currency(&block.currency, block.totals.grand_total),
        true,
        0.85,
    );
    canvas.cursor.advance(BLOCK_GAP);
}

fn draw_bank_details(canvas: &mut Canvas<'_>, n: u32, settings: &Settings) {
    let rows = [
        ("Bank Name", settings.bank_name.as_str()),
        ("Account Name", settings.bank_account_name.as_str()),
        ("Account Number", settings.bank_account_number.as_str()),
        ("Branch", settings.bank_branch.as_str()),
        ("IFSC", settings.bank_ifsc.as_str()),
        ("SWIFT", settings.bank_swift.as_str()),
    ];
    let rows: Vec<(&str, &str)> = rows.into_iter().filter(|(_, v)| !v.trim().is_empty()).collect();

    heading(canvas, &format!("{n}. BANK DETAILS"), rows.len() as f32 * 4.6);
    canvas.cursor.advance(1.0);
    const LABEL_W: f32 = 36.0;
    for (label, value) in rows {
        let lines = canvas
            .metrics
            .wrap(value.trim(), 9.0, content_width() - LABEL_W - CELL_PAD_X);
        for (idx, line) in lines.iter().enumerate() {
            canvas.ensure(4.6);
            canvas.cursor.advance(4.6);
            let y = canvas.cursor.y + 1.0;
            if idx == 0 {
                canvas.text(&format!("{label}:"), 9.0, CONTENT_LEFT + CELL_PAD_X, y, true);
            }
            canvas.text(line, 9.0, CONTENT_LEFT + CELL_PAD_X + LABEL_W, y, false);
        }
    }
    canvas.cursor.advance(BLOCK_GAP);
}

fn draw_signature(canvas: &mut Canvas<'_>, settings: &Settings) {
    const BLOCK_H: f32 = 30.0;
    const SIG_W: f32 = 60.0;
    canvas.ensure(BLOCK_H);
    let right = CONTENT_RIGHT - CELL_PAD_X;
    let left = right - SIG_W;
    let top = canvas.cursor.y;

    let company = settings.company_name.trim();
    if !company.is_empty() {
        canvas.text_right(&format!("For {company}"), 9.0, right, top - 4.0, true);
    }
    canvas.rule(left, right, top - 20.0, 0.4);

    let name = settings.signatory_name.trim();
    let mut y = top - 24.0;
    if !name.is_empty() {
        canvas.text_right(name, 9.0, right, y, false);
        y -= 4.0;
    }
    let designation = settings.signatory_designation.trim();
    let caption = if designation.is_empty() { "Authorized Signatory" } else { designation };
    canvas.text_right(caption, 8.0, right, y, false);
    canvas.cursor.advance(BLOCK_H);
}

/// Notes and terms typed on the quotation itself, unnumbered.
pub(crate) fn draw_notes(canvas: &mut Canvas<'_>, label: &str, text: &str) {
    if text.trim().is_empty() {
        return;
    }
    canvas.ensure(HEADING_H + LINE_H);
    paragraph(canvas, label, CONTENT_LEFT, 9.5, true);
    paragraph(canvas, text, CONTENT_LEFT, 9.0, false);
    canvas.cursor.advance(BLOCK_GAP);
}

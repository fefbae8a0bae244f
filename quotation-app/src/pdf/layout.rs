//! Page geometry, table columns and section numbering. Pure layout math,
//! no drawing.

use crate::quotation::PrintVisibility;

pub(crate) const PAGE_W: f32 = 210.0;
pub(crate) const PAGE_H: f32 = 297.0;
pub(crate) const PAGE_MARGIN: f32 = 12.0;
/// Space between the border and the content.
pub(crate) const CONTENT_INSET: f32 = 4.0;
/// Height reserved above the bottom border for the page footer.
pub(crate) const FOOTER_H: f32 = 8.0;

pub(crate) const CONTENT_LEFT: f32 = PAGE_MARGIN + CONTENT_INSET;
pub(crate) const CONTENT_RIGHT: f32 = PAGE_W - PAGE_MARGIN - CONTENT_INSET;
pub(crate) const CONTENT_TOP: f32 = PAGE_H - PAGE_MARGIN - CONTENT_INSET;
pub(crate) const CONTENT_BOTTOM: f32 = PAGE_MARGIN + FOOTER_H;

pub(crate) fn content_width() -> f32 {
    CONTENT_RIGHT - CONTENT_LEFT
}

/// A table column of the items grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    ItemId,
    Product,
    Sku,
    Description,
    Quantity,
    Rate,
    Discount,
    Tax,
    ServiceCharges,
    Amount,
}

impl Column {
    pub const ALL: [Column; 10] = [
        Column::ItemId,
        Column::Product,
        Column::Sku,
        Column::Description,
        Column::Quantity,
        Column::Rate,
        Column::Discount,
        Column::Tax,
        Column::ServiceCharges,
        Column::Amount,
    ];

    /// Relative share of the table width.
    pub fn weight(&self) -> f32 {
        match self {
            Column::ItemId => 0.6,
            Column::Product => 2.0,
            Column::Sku => 1.1,
            Column::Description => 3.0,
            Column::Quantity => 0.6,
            Column::Rate => 1.1,
            Column::Discount => 0.9,
            Column::Tax => 0.9,
            Column::ServiceCharges => 1.1,
            Column::Amount => 1.3,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Column::ItemId => "#",
            Column::Product => "Product",
            Column::Sku => "SKU",
            Column::Description => "Description",
            Column::Quantity => "Qty",
            Column::Rate => "Rate",
            Column::Discount => "Discount",
            Column::Tax => "Tax",
            Column::ServiceCharges => "Services",
            Column::Amount => "Amount",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Column::Quantity | Column::Rate | Column::Discount | Column::Tax | Column::ServiceCharges | Column::Amount
        )
    }

    fn visible(&self, v: &PrintVisibility) -> bool {
        match self {
            Column::ItemId => v.item_id,
            Column::Product => v.product,
            Column::Sku => v.sku,
            Column::Description => v.description,
            Column::Quantity => v.quantity,
            Column::Rate => v.rate,
            Column::Discount => v.discount,
            Column::Tax => v.tax,
            Column::ServiceCharges => v.service_charges,
            Column::Amount => v.amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnSlot {
    pub column: Column,
    pub x: f32,
    pub width: f32,
}

/// Visible columns with x positions spread over `width` by weight.
pub fn column_layout(visibility: &PrintVisibility, left: f32, width: f32) -> Vec<ColumnSlot> {
    let visible: Vec<Column> = Column::ALL.iter().copied().filter(|c| c.visible(visibility)).collect();
    let total: f32 = visible.iter().map(Column::weight).sum();
    if total <= 0.0 {
        return Vec::new();
    }

    let mut x = left;
    visible
        .into_iter()
        .map(|column| {
            let w = width * column.weight() / total;
            let slot = ColumnSlot { column, x, width: w };
            x += w;
            slot
        })
        .collect()
}

/// Section numbers for one rendering: titles first, then the fixed trailing blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberingPlan {
    pub titles: Vec<u32>,
    pub summary: u32,
    pub grand_total: u32,
    pub bank_details: Option<u32>,
}

impl NumberingPlan {
    pub fn new(title_count: usize, with_bank_details: bool) -> Self {
        let n = title_count as u32;
        Self {
            titles: (1..=n).collect(),
            summary: n + 1,
            grand_total: n + 2,
            bank_details: with_bank_details.then_some(n + 3),
        }
    }
}

/// Vertical position on the current page, top-down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageCursor {
    pub y: f32,
    pub page: usize,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self { y: CONTENT_TOP, page: 0 }
    }
}

impl PageCursor {
    fn fits(&self, height: f32) -> bool {
        self.y - height >= CONTENT_BOTTOM
    }

    /// Moves to the top of the next page.
    pub fn next_page(&mut self) {
        self.page += 1;
        self.y = CONTENT_TOP;
    }

    /// Whether a block of `height` must move to a new page. A block taller
    /// than a whole page never breaks at the page top and runs to the bottom margin.
    pub fn needs_break(&self, height: f32) -> bool {
        !self.fits(height) && self.y < CONTENT_TOP
    }

    pub fn advance(&mut self, dy: f32) {
        self.y -= dy;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_columns_fill_the_width() {
        let slots = column_layout(&PrintVisibility::default(), 10.0, 180.0);
        assert_eq!(slots.len(), Column::ALL.len());
        assert_eq!(slots[0].x, 10.0);
        let last = slots.last().unwrap();
        assert!((last.x + last.width - 190.0).abs() < 1e-3);
    }

    #[test]
    fn hidden_columns_give_their_width_away() {
        let vis = PrintVisibility {
            sku: false,
            discount: false,
            tax: false,
            service_charges: false,
            ..PrintVisibility::default()
        };
        let slots = column_layout(&vis, 0.0, 100.0);
        let cols: Vec<Column> = slots.iter().map(|s| s.column).collect();
        assert_eq!(
            cols,
            vec![Column::ItemId, Column::Product, Column::Description, Column::Quantity, Column::Rate, Column::Amount]
        );
        let sum: f32 = slots.iter().map(|s| s.width).sum();
        assert!((sum - 100.0).abs() < 1e-3);
        let full = column_layout(&PrintVisibility::default(), 0.0, 100.0);
        assert!(slots[1].width > full[1].width);
    }

    #[test]
    fn nothing_visible_means_no_table() {
        let vis = PrintVisibility {
            item_id: false,
            product: false,
            sku: false,
            description: false,
            images: false,
            quantity: false,
            rate: false,
            discount: false,
            tax: false,
            service_charges: false,
            amount: false,
        };
        assert!(column_layout(&vis, 0.0, 100.0).is_empty());
    }

    #[test]
    fn numbering_is_sequential() {
        let plan = NumberingPlan::new(3, true);
        assert_eq!(plan.titles, vec![1, 2, 3]);
        assert_eq!((plan.summary, plan.grand_total, plan.bank_details), (4, 5, Some(6)));

        let empty = NumberingPlan::new(0, false);
        assert!(empty.titles.is_empty());
        assert_eq!((empty.summary, empty.grand_total, empty.bank_details), (1, 2, None));
    }

    #[test]
    fn cursor_breaks_before_crossing_the_bottom() {
        let mut c = PageCursor::default();
        assert!(!c.needs_break(50.0));
        c.advance(CONTENT_TOP - CONTENT_BOTTOM - 10.0);
        assert!(!c.needs_break(10.0));
        assert!(c.needs_break(10.5));
        c.next_page();
        assert_eq!(c.page, 1);
        assert_eq!(c.y, CONTENT_TOP);
    }

    #[test]
    fn oversized_block_at_page_top_does_not_loop() {
        let c = PageCursor::default();
        assert!(!c.needs_break(PAGE_H * 2.0));
        assert_eq!(c.page, 0);
    }
}

//! Drawing surface over printpdf: one bordered A4 page after another, a
//! cursor that breaks pages, and the primitives the renderer composes.

use std::io::{BufWriter, Cursor};

use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerIndex, PdfLayerReference, PdfPageIndex, Point, Rect, Rgb,
};
use printpdf::image_crate::{DynamicImage, GenericImageView};

use super::layout::{PageCursor, CONTENT_LEFT, CONTENT_RIGHT, PAGE_H, PAGE_MARGIN, PAGE_W};
use super::text::Metrics;
use crate::{QuotationError, Result};

const IMAGE_DPI: f32 = 300.0;
const BORDER_THICKNESS: f32 = 0.8;
const FOOTER_SIZE: f32 = 7.0;

fn pdf_err(e: impl std::fmt::Display) -> QuotationError {
    QuotationError::Pdf(e.to_string())
}

pub(crate) struct Canvas<'a> {
    doc: PdfDocumentReference,
    pages: Vec<(PdfPageIndex, PdfLayerIndex)>,
    layer: PdfLayerReference,
    font: IndirectFontRef,
    bold: IndirectFontRef,
    pub(crate) metrics: Metrics<'a>,
    pub(crate) cursor: PageCursor,
}

impl<'a> Canvas<'a> {
    /// Opens the document with its first bordered page. With `font_bytes`
    /// the TrueType font is embedded for all text and used for measurement.
    pub(crate) fn new(title: &str, font_bytes: Option<&'a [u8]>) -> Result<Self> {
        let (doc, page1, layer1) = PdfDocument::new(title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");

        let (font, bold, metrics) = match font_bytes {
            Some(bytes) => {
                let face = ttf_parser::Face::parse(bytes, 0)
                    .map_err(|e| QuotationError::Pdf(format!("Failed to parse font for measurement: {e}")))?;
                let font = doc.add_external_font(Cursor::new(bytes)).map_err(pdf_err)?;
                (font.clone(), font, Metrics::Ttf(face))
            }
            None => (
                doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?,
                doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_err)?,
                Metrics::Estimated,
            ),
        };

        let layer = doc.get_page(page1).get_layer(layer1);
        let canvas = Self {
            doc,
            pages: vec![(page1, layer1)],
            layer,
            font,
            bold,
            metrics,
            cursor: PageCursor::default(),
        };
        canvas.draw_border();
        Ok(canvas)
    }

    pub(crate) fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn draw_border(&self) {
        self.layer.set_outline_thickness(BORDER_THICKNESS);
        let rect = Rect::new(
            Mm(PAGE_MARGIN),
            Mm(PAGE_MARGIN),
            Mm(PAGE_W - PAGE_MARGIN),
            Mm(PAGE_H - PAGE_MARGIN),
        )
        .with_mode(PaintMode::Stroke);
        self.layer.add_rect(rect);
    }

    pub(crate) fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        self.pages.push((page, layer));
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.cursor.next_page();
        self.draw_border();
    }

    /// Starts a new page when `height` does not fit below the cursor.
    pub(crate) fn ensure(&mut self, height: f32) -> bool {
        if !self.cursor.needs_break(height) {
            return false;
        }
        self.new_page();
        true
    }

    pub(crate) fn text(&self, text: &str, size: f32, x: f32, y: f32, bold: bool) {
        if text.is_empty() {
            return;
        }
        let font = if bold { &self.bold } else { &self.font };
        self.layer.use_text(text, size, Mm(x), Mm(y), font);
    }

    pub(crate) fn text_right(&self, text: &str, size: f32, x_right: f32, y: f32, bold: bool) {
        let x = (x_right - self.metrics.width_mm(text, size)).max(0.0);
        self.text(text, size, x, y, bold);
    }

    pub(crate) fn text_center(&self, text: &str, size: f32, y: f32, bold: bool) {
        let w = self.metrics.width_mm(text, size);
        let x = CONTENT_LEFT + ((CONTENT_RIGHT - CONTENT_LEFT) - w) / 2.0;
        self.text(text, size, x, y, bold);
    }

    pub(crate) fn rule(&self, x1: f32, x2: f32, y: f32, thickness: f32) {
        self.layer.set_outline_thickness(thickness);
        self.layer.add_line(Line {
            points: vec![(Point::new(Mm(x1), Mm(y)), false), (Point::new(Mm(x2), Mm(y)), false)],
            is_closed: false,
        });
    }

    pub(crate) fn stroke_rect(&self, x: f32, y_top: f32, w: f32, h: f32) {
        self.layer.set_outline_thickness(0.3);
        let rect = Rect::new(Mm(x), Mm(y_top - h), Mm(x + w), Mm(y_top)).with_mode(PaintMode::Stroke);
        self.layer.add_rect(rect);
    }

    pub(crate) fn fill_rect_gray(&self, x: f32, y_top: f32, w: f32, h: f32, gray: f32) {
        self.layer.set_fill_color(Color::Rgb(Rgb::new(gray, gray, gray, None)));
        let rect = Rect::new(Mm(x), Mm(y_top - h), Mm(x + w), Mm(y_top)).with_mode(PaintMode::Fill);
        self.layer.add_rect(rect);
        // back to black for text
        self.layer.set_fill_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
    }

    /// Size in mm that fits `img` into `max_w` x `max_h` keeping its aspect ratio.
    pub(crate) fn fit_image(img: &DynamicImage, max_w: f32, max_h: f32) -> (f32, f32) {
        let natural_w = img.width().max(1) as f32 / IMAGE_DPI * 25.4;
        let natural_h = img.height().max(1) as f32 / IMAGE_DPI * 25.4;
        let scale = (max_w / natural_w).min(max_h / natural_h).max(0.01);
        (natural_w * scale, natural_h * scale)
    }

    /// Draws `img` scaled to width `w` with its bottom-left corner at (`x`, `y_bottom`).
    pub(crate) fn image(&self, img: &DynamicImage, x: f32, y_bottom: f32, w: f32) {
        let natural_w = img.width().max(1) as f32 / IMAGE_DPI * 25.4;
        let scale = (w / natural_w).max(0.01);
        Image::from_dynamic_image(img).add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(x)),
                translate_y: Some(Mm(y_bottom)),
                rotate: None,
                scale_x: Some(scale),
                scale_y: Some(scale),
                dpi: Some(IMAGE_DPI),
            },
        );
    }

    /// Writes `Page i of n` and the generation date on every page, then serializes.
    pub(crate) fn finish(self, generated_on: &str) -> Result<Vec<u8>> {
        let total = self.pages.len();
        let y = PAGE_MARGIN + 3.0;
        for (idx, (page, layer)) in self.pages.iter().enumerate() {
            let layer = self.doc.get_page(*page).get_layer(*layer);
            let page_label = format!("Page {} of {}", idx + 1, total);
            let w = self.metrics.width_mm(&page_label, FOOTER_SIZE);
            layer.use_text(
                format!("Generated on {generated_on}"),
                FOOTER_SIZE,
                Mm(CONTENT_LEFT),
                Mm(y),
                &self.font,
            );
            layer.use_text(page_label, FOOTER_SIZE, Mm(CONTENT_RIGHT - w), Mm(y), &self.font);
        }

        let mut writer = BufWriter::new(Vec::<u8>::new());
        self.doc.save(&mut writer).map_err(pdf_err)?;
        writer.into_inner().map_err(pdf_err)
    }
}

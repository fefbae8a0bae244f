//! Text measurement and wrapping in millimetres.

/// PDF font sizes are in points; coordinates are in millimetres.
pub(crate) const PT_TO_MM: f32 = 25.4 / 72.0;

/// Average Helvetica advance as a fraction of the em, used when no font file is loaded.
const AVG_GLYPH_EM: f32 = 0.52;

/// Width source for laid-out text.
pub(crate) enum Metrics<'a> {
    Estimated,
    Ttf(ttf_parser::Face<'a>),
}

impl<'a> Metrics<'a> {
    pub(crate) fn width_mm(&self, text: &str, font_size_pt: f32) -> f32 {
        match self {
            Metrics::Estimated => text.chars().count() as f32 * font_size_pt * AVG_GLYPH_EM * PT_TO_MM,
            Metrics::Ttf(face) => {
                let advance: u32 = text
                    .chars()
                    .filter_map(|ch| face.glyph_index(ch))
                    .filter_map(|gid| face.glyph_hor_advance(gid))
                    .map(u32::from)
                    .sum();
                font_units_to_mm(face, advance as f32, font_size_pt)
            }
        }
    }

    pub(crate) fn descent_mm(&self, font_size_pt: f32) -> f32 {
        match self {
            Metrics::Estimated => font_size_pt * PT_TO_MM * 0.20,
            // descender is negative in the font tables
            Metrics::Ttf(face) => font_units_to_mm(face, (-(face.descender() as f32)).max(0.0), font_size_pt),
        }
    }

    /// Greedy word wrap to `max_width_mm`; words wider than the box are split
    /// by character. Input newlines start new lines, blank lines are dropped.
    pub(crate) fn wrap(&self, input: &str, font_size: f32, max_width_mm: f32) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for raw in input.lines() {
            let s = raw.trim();
            if s.is_empty() {
                continue;
            }
            self.wrap_paragraph(s, font_size, max_width_mm, &mut out);
        }
        out
    }

    fn wrap_paragraph(&self, s: &str, font_size: f32, max_width_mm: f32, out: &mut Vec<String>) {
        let fits = |t: &str| self.width_mm(t, font_size) <= max_width_mm;
        let mut current = String::new();

        for word in s.split_whitespace() {
            if !current.is_empty() {
                let candidate = format!("{} {}", current, word);
                if fits(&candidate) {
                    current = candidate;
                    continue;
                }
                out.push(std::mem::take(&mut current));
            }

            if fits(word) {
                current.push_str(word);
                continue;
            }

            let mut chunk = String::new();
            for ch in word.chars() {
                let candidate = format!("{}{}", chunk, ch);
                if fits(&candidate) || chunk.is_empty() {
                    chunk = candidate;
                } else {
                    out.push(std::mem::replace(&mut chunk, ch.to_string()));
                }
            }
            current = chunk;
        }

        if !current.is_empty() {
            out.push(current);
        }
    }
}

fn font_units_to_mm(face: &ttf_parser::Face<'_>, units: f32, font_size_pt: f32) -> f32 {
    // units_per_em is validated non-zero by ttf-parser
    units / face.units_per_em() as f32 * font_size_pt * PT_TO_MM
}

/// Cuts `text` to fit `max_width_mm`, ending in `...` when shortened.
pub(crate) fn ellipsize(metrics: &Metrics<'_>, text: &str, font_size: f32, max_width_mm: f32) -> String {
    if metrics.width_mm(text, font_size) <= max_width_mm {
        return text.to_string();
    }
    let mut out = String::new();
    for ch in text.chars() {
        let candidate = format!("{}{}...", out, ch);
        if metrics.width_mm(&candidate, font_size) > max_width_mm {
            break;
        }
        out.push(ch);
    }
    format!("{}...", out)
}

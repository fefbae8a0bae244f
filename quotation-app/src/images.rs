//! Resolves item image references and the settings logo to decoded images
//! before rendering.

use std::collections::HashMap;

use base64::Engine as _;
use futures_util::future::join_all;
use printpdf::image_crate::DynamicImage;

use crate::quotation::Quotation;
use crate::settings::Settings;
use crate::{QuotationError, Result};

/// Decoded images keyed by the reference they were resolved from.
/// A reference missing from the set failed to resolve.
#[derive(Default)]
pub struct ImageSet {
    images: HashMap<String, DynamicImage>,
}

impl ImageSet {
    pub fn get(&self, reference: &str) -> Option<&DynamicImage> {
        self.images.get(reference.trim())
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Resolves only the data URIs; URLs stay unresolved.
    pub fn from_data_uris<'a>(refs: impl IntoIterator<Item = &'a str>) -> Self {
        let mut set = ImageSet::default();
        for r in refs {
            let r = r.trim();
            if !is_data_uri(r) {
                continue;
            }
            match decode_data_uri(r).and_then(|b| decode_image(&b)) {
                Ok(img) => {
                    set.images.insert(r.to_string(), img);
                }
                Err(e) => tracing::warn!(error = %e, "image data URI could not be decoded"),
            }
        }
        set
    }
}

/// Every image the rendered document may show: the logo, then item images in order.
pub fn image_refs(quotation: &Quotation, settings: &Settings) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let logo = settings.logo_url.trim();
    if !logo.is_empty() {
        out.push(logo.to_string());
    }
    for item in quotation.items() {
        for r in &item.images {
            let r = r.trim();
            if !r.is_empty() && !out.iter().any(|x| x == r) {
                out.push(r.to_string());
            }
        }
    }
    out
}

/// Resolves data URIs inline and fetches http(s) URLs concurrently.
/// Failures are logged and left out of the set.
pub async fn resolve_images(client: &reqwest::Client, refs: &[String]) -> ImageSet {
    let mut set = ImageSet::from_data_uris(refs.iter().map(String::as_str));

    let urls: Vec<&str> = refs
        .iter()
        .map(|r| r.trim())
        .filter(|r| is_http_url(r))
        .collect();

    let fetched = join_all(urls.iter().map(|url| fetch_image(client, url))).await;
    for (url, res) in urls.into_iter().zip(fetched) {
        match res {
            Ok(img) => {
                set.images.insert(url.to_string(), img);
            }
            Err(e) => tracing::warn!(url, error = %e, "image fetch failed"),
        }
    }

    tracing::debug!(requested = refs.len(), resolved = set.len(), "images resolved");
    set
}

async fn fetch_image(client: &reqwest::Client, url: &str) -> Result<DynamicImage> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(QuotationError::Image(format!("HTTP {} for {}", response.status(), url)));
    }
    let bytes = response.bytes().await?;
    decode_image(&bytes)
}

fn is_data_uri(s: &str) -> bool {
    s.len() > 5 && s.as_bytes()[..5].eq_ignore_ascii_case(b"data:")
}

fn is_http_url(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Bytes of a `data:image/*;base64,...` URI.
pub fn decode_data_uri(s: &str) -> Result<Vec<u8>> {
    let s = s.trim();
    if !is_data_uri(s) {
        return Err(QuotationError::Image("not a data URI".to_string()));
    }
    let comma = s
        .find(',')
        .ok_or_else(|| QuotationError::Image("data URI has no payload".to_string()))?;
    let (meta, data) = s.split_at(comma);
    if !meta.to_ascii_lowercase().contains(";base64") {
        return Err(QuotationError::Image("only base64 data URIs are supported".to_string()));
    }
    base64::engine::general_purpose::STANDARD
        .decode(data[1..].trim())
        .map_err(|e| QuotationError::Image(e.to_string()))
}

fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    printpdf::image_crate::load_from_memory(bytes).map_err(|e| QuotationError::Image(e.to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use base64::Engine as _;
    use printpdf::image_crate::{GenericImageView, ImageFormat, RgbImage};
    use std::io::Cursor;

    pub(crate) fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 3, printpdf::image_crate::Rgb([200, 30, 30])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    pub(crate) fn png_data_uri() -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png_bytes())
        )
    }

    #[test]
    fn data_uri_roundtrip() {
        let uri = png_data_uri();
        let set = ImageSet::from_data_uris([uri.as_str(), "data:image/png;base64,!!!", "https://x.test/a.png"]);
        assert_eq!(set.len(), 1);
        let img = set.get(&uri).unwrap();
        assert_eq!((img.width(), img.height()), (4, 3));
    }

    #[test]
    fn data_uri_requires_base64() {
        assert!(decode_data_uri("data:text/plain,hello").is_err());
        assert!(decode_data_uri("https://x.test/a.png").is_err());
    }

    #[test]
    fn refs_are_deduplicated_with_logo_first() {
        let mut q = Quotation::new("QT-1");
        let t = q.add_title();
        let a = q.add_item(&t).unwrap();
        let b = q.add_item(&t).unwrap();
        q.set_item_images(&a, vec!["https://x.test/1.png".into(), " ".into()]).unwrap();
        q.set_item_images(&b, vec!["https://x.test/1.png".into(), "https://x.test/2.png".into()])
            .unwrap();
        let settings = Settings {
            logo_url: "https://x.test/logo.png".into(),
            ..Settings::default()
        };
        assert_eq!(
            image_refs(&q, &settings),
            vec!["https://x.test/logo.png", "https://x.test/1.png", "https://x.test/2.png"]
        );
    }

    #[tokio::test]
    async fn unreachable_urls_are_left_out() {
        let client = reqwest::Client::new();
        let refs = vec![png_data_uri(), "http://127.0.0.1:9/missing.png".to_string()];
        let set = resolve_images(&client, &refs).await;
        assert_eq!(set.len(), 1);
        assert!(set.get("http://127.0.0.1:9/missing.png").is_none());
    }

    #[tokio::test]
    async fn non_ascii_references_do_not_panic() {
        let refs = vec!["日本語.png".to_string(), "Größe.png".to_string(), "dätä:x".to_string()];
        assert!(ImageSet::from_data_uris(refs.iter().map(String::as_str)).is_empty());
        assert!(decode_data_uri("日本語.png").is_err());

        let set = resolve_images(&reqwest::Client::new(), &refs).await;
        assert!(set.is_empty());
    }
}

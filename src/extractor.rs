use crate::PreviewMetadata;
use scraper::{Html, Selector};

/// Extracts preview metadata from fetched page content. Extraction is
/// best-effort: anything missing falls back to a sentinel value rather
/// than an error, because previews are a soft-fail feature.
#[derive(Debug, Clone, Default)]
pub struct MetadataExtractor;

impl MetadataExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, html: &str) -> PreviewMetadata {
        let document = Html::parse_document(html);

        let title = self
            .extract_title(&document)
            .unwrap_or_else(|| "No Title".to_string());
        let image = self.extract_image(&document);
        let description = self.extract_description(&document).unwrap_or_default();

        PreviewMetadata {
            title,
            image,
            description,
        }
    }

    fn extract_title(&self, document: &Html) -> Option<String> {
        let og_title_selector = Selector::parse("meta[property='og:title']").ok()?;
        let title_selector = Selector::parse("title").ok()?;

        let og_title = document
            .select(&og_title_selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(|s| s.to_string());

        // No Open Graph title, fall back to the <title> element
        og_title
            .or_else(|| {
                document
                    .select(&title_selector)
                    .next()
                    .map(|el| el.text().collect::<String>())
            })
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn extract_description(&self, document: &Html) -> Option<String> {
        let og_desc_selector = Selector::parse("meta[property='og:description']").ok()?;
        let meta_desc_selector = Selector::parse("meta[name='description']").ok()?;

        document
            .select(&og_desc_selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .or_else(|| {
                document
                    .select(&meta_desc_selector)
                    .next()
                    .and_then(|el| el.value().attr("content"))
            })
            .map(|s| s.trim().to_string())
    }

    fn extract_image(&self, document: &Html) -> Option<String> {
        let og_image_selector =
            Selector::parse("meta[property='og:image'],meta[itemprop='image']").ok()?;

        document
            .select(&og_image_selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(|s| s.trim().to_string())
    }
}

use htmd::HtmlToMarkdown;
use scraper::Html;

/// HTML to Markdown with links and emphasis kept and no line wrapping.
#[derive(Clone, Debug)]
pub struct MarkdownRenderer {
    skip_tags: Vec<&'static str>,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self {
            skip_tags: vec!["script", "style", "head"],
        }
    }
}

impl MarkdownRenderer {
    pub fn render(&self, html: &str) -> String {
        if html.trim().is_empty() {
            return String::new();
        }

        let converter = HtmlToMarkdown::builder()
            .skip_tags(self.skip_tags.clone())
            .build();
        match converter.convert(html) {
            Ok(markdown) => markdown,
            Err(e) => {
                tracing::warn!(error = %e, "markdown conversion failed, using plain text");
                plain_text(html)
            }
        }
    }
}

fn plain_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: Vec<&str> = fragment
        .root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();
    text.join("\n")
}

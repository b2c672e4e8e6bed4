use crate::models::{DigestDocument, StoryRecord};

const TEXT_WIDTH: usize = 78;

pub struct DigestRenderer;

impl DigestRenderer {
    /// Full HTML email body with inline styles (mail clients drop `<style>` blocks).
    pub fn generate(doc: &DigestDocument) -> String {
        let mut html = String::new();
        let date = doc.display_date();

        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
        html.push_str("  <meta charset=\"UTF-8\">\n");
        html.push_str(
            "  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
        );
        html.push_str(&format!(
            "  <title>HackerNews Digest - {}</title>\n",
            Self::escape_html(&date)
        ));
        html.push_str("</head>\n");
        html.push_str("<body style=\"margin: 0; padding: 0; background-color: #f6f6ef; font-family: Verdana, Geneva, sans-serif;\">\n");
        html.push_str("<div style=\"max-width: 700px; margin: 0 auto; padding: 20px; background-color: #ffffff;\">\n");

        html.push_str("  <div style=\"background-color: #ff6600; padding: 12px 16px;\">\n");
        html.push_str("    <h1 style=\"margin: 0; font-size: 22px; color: #000000;\">HackerNews Digest</h1>\n");
        html.push_str(&format!(
            "    <div style=\"font-size: 13px; color: #222222;\">{}</div>\n",
            Self::escape_html(&date)
        ));
        html.push_str("  </div>\n");

        if doc.stories.is_empty() {
            html.push_str("  <p style=\"color: #828282;\">No stories today.</p>\n");
        }

        for (index, story) in doc.stories.iter().enumerate() {
            Self::push_story(&mut html, index + 1, story);
        }

        html.push_str("  <hr style=\"border: none; border-top: 1px solid #dddddd; margin: 30px 0 15px 0;\">\n");
        html.push_str("  <p style=\"font-size: 11px; color: #828282; text-align: center;\">\n");
        html.push_str("    You are receiving this because you subscribed to the HackerNews Digest.<br>\n");
        html.push_str(&format!(
            "    <a href=\"{}\" style=\"color: #828282;\">Unsubscribe</a>\n",
            doc.unsubscribe_url
        ));
        html.push_str("  </p>\n");

        html.push_str("</div>\n</body>\n</html>");
        html
    }

    fn push_story(html: &mut String, rank: usize, story: &StoryRecord) {
        html.push_str("  <div style=\"margin: 24px 0;\">\n");
        html.push_str(&format!(
            "    <h2 style=\"font-size: 17px; margin: 0 0 4px 0;\">{}. <a href=\"{}\" style=\"color: #000000; text-decoration: none;\">{}</a></h2>\n",
            rank,
            Self::escape_html(story.headline_url()),
            Self::escape_html(&story.title)
        ));
        html.push_str(&format!(
            "    <div style=\"font-size: 12px; color: #828282;\">{} points by {} | <a href=\"{}\" style=\"color: #828282;\">{} comments</a></div>\n",
            story.points,
            Self::escape_html(&story.author),
            Self::escape_html(&story.comments_url),
            story.comments_count
        ));

        Self::push_summary(html, "Article", story.post_summary.as_deref());
        Self::push_summary(html, "Discussion", story.comment_summary.as_deref());

        html.push_str("  </div>\n");
    }

    fn push_summary(html: &mut String, label: &str, summary: Option<&str>) {
        html.push_str(&format!(
            "    <h3 style=\"font-size: 13px; margin: 12px 0 4px 0; color: #ff6600;\">{}</h3>\n",
            label
        ));
        match summary {
            Some(text) => {
                for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
                    html.push_str(&format!(
                        "    <p style=\"font-size: 14px; line-height: 1.5; margin: 4px 0;\">{}</p>\n",
                        Self::escape_html(paragraph).replace('\n', "<br>")
                    ));
                }
            }
            None => {
                html.push_str("    <p style=\"font-size: 13px; color: #828282; font-style: italic; margin: 4px 0;\">Summary not available</p>\n");
            }
        }
    }

    /// Plain-text alternative for mail clients that do not render HTML.
    pub fn generate_text(html: &str) -> String {
        html2text::from_read(html.as_bytes(), TEXT_WIDTH)
    }

    pub fn escape_html(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&#39;")
    }
}

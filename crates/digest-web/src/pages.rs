use shared::{ArchiveEntry, DigestRenderer};

fn layout(title: &str, body: &str) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    html.push_str("  <meta charset=\"UTF-8\">\n");
    html.push_str("  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    html.push_str(&format!(
        "  <title>{}</title>\n",
        DigestRenderer::escape_html(title)
    ));
    html.push_str("</head>\n");
    html.push_str("<body style=\"margin: 0; background-color: #f6f6ef; font-family: Verdana, Geneva, sans-serif;\">\n");
    html.push_str("<div style=\"max-width: 700px; margin: 0 auto; padding: 20px; background-color: #ffffff;\">\n");
    html.push_str("  <div style=\"background-color: #ff6600; padding: 12px 16px;\">\n");
    html.push_str("    <h1 style=\"margin: 0; font-size: 22px;\"><a href=\"/\" style=\"color: #000000; text-decoration: none;\">HackerNews Digest</a></h1>\n");
    html.push_str("  </div>\n");
    html.push_str(body);
    html.push_str("</div>\n</body>\n</html>");
    html
}

fn archive_links(entries: &[ArchiveEntry]) -> String {
    if entries.is_empty() {
        return "  <p style=\"color: #828282;\">No digests archived yet.</p>\n".to_string();
    }

    let mut html = String::from("  <ul>\n");
    for entry in entries {
        html.push_str(&format!(
            "    <li><a href=\"/archive/{}\">{}</a></li>\n",
            DigestRenderer::escape_html(&entry.filename),
            DigestRenderer::escape_html(&entry.display_date())
        ));
    }
    html.push_str("  </ul>\n");
    html
}

/// Landing page: subscribe form plus the most recent digests.
pub fn index(recent: &[ArchiveEntry]) -> String {
    let mut body = String::new();
    body.push_str("  <p>The day's top Hacker News stories, summarized and delivered by email.</p>\n");
    body.push_str("  <form method=\"post\" action=\"/subscribe\">\n");
    body.push_str("    <input type=\"email\" name=\"email\" placeholder=\"you@example.com\" required>\n");
    body.push_str("    <button type=\"submit\">Subscribe</button>\n");
    body.push_str("  </form>\n");
    body.push_str("  <h2 style=\"font-size: 17px;\">Recent digests</h2>\n");
    body.push_str(&archive_links(recent));
    body.push_str("  <p><a href=\"/archive\">Full archive</a></p>\n");
    layout("HackerNews Digest", &body)
}

pub fn archive(entries: &[ArchiveEntry]) -> String {
    let mut body = String::from("  <h2 style=\"font-size: 17px;\">Archive</h2>\n");
    body.push_str(&archive_links(entries));
    layout("HackerNews Digest Archive", &body)
}

/// Result page for a subscribe attempt, successful or not.
pub fn message(title: &str, text: &str) -> String {
    let body = format!(
        "  <h2 style=\"font-size: 17px;\">{}</h2>\n  <p>{}</p>\n  <p><a href=\"/\">Back</a></p>\n",
        DigestRenderer::escape_html(title),
        DigestRenderer::escape_html(text)
    );
    layout(title, &body)
}

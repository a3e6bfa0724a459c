// src/format.rs
//! Turns a [`NewsItem`] into a WhatsApp text body of bounded length.
//!
//! Lengths are counted in `char`s. The url line always survives intact: the
//! summary is shortened first, then dropped, then the header is shortened.

use crate::news::NewsItem;

pub const TEST_PREFIX: &str = "🧪 TEST MESSAGE 🧪";
const SEP: &str = "\n\n";
const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Copy)]
pub struct MessageFormatter {
    max_chars: usize,
}

impl MessageFormatter {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn format(&self, item: &NewsItem) -> String {
        self.render(None, item)
    }

    /// Same layout with a banner line on top, used for the dashboard test message.
    pub fn format_test(&self, item: &NewsItem) -> String {
        self.render(Some(TEST_PREFIX), item)
    }

    fn render(&self, prefix: Option<&str>, item: &NewsItem) -> String {
        let published = item
            .published_at
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "unknown date".to_string());
        let mut header = format!(
            "🗞️ *{}*\n📍 {} | 🕒 {}",
            item.title, item.source, published
        );
        if let Some(p) = prefix {
            header = format!("{p}{SEP}{header}");
        }
        let footer = format!("🔗 {}", item.url);
        let summary = item.summary.trim();

        let sep_len = SEP.chars().count();
        let header_len = header.chars().count();
        let footer_len = footer.chars().count();

        if !summary.is_empty() {
            let full = header_len + summary.chars().count() + footer_len + 2 * sep_len;
            if full <= self.max_chars {
                return [header.as_str(), summary, footer.as_str()].join(SEP);
            }
            let room = self
                .max_chars
                .saturating_sub(header_len + footer_len + 2 * sep_len);
            if room > ELLIPSIS.len() {
                let short = truncate_chars(summary, room);
                return [header.as_str(), short.as_str(), footer.as_str()].join(SEP);
            }
        }

        if header_len + sep_len + footer_len <= self.max_chars {
            return [header.as_str(), footer.as_str()].join(SEP);
        }
        let room = self.max_chars.saturating_sub(footer_len + sep_len);
        if room > ELLIPSIS.len() {
            let short = truncate_chars(&header, room);
            return [short.as_str(), footer.as_str()].join(SEP);
        }
        // Nothing fits next to the url; the url is still never cut.
        footer
    }
}

/// At most `max` chars; overflow is replaced by a trailing `...`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(ELLIPSIS.len());
    let mut out: String = s.chars().take(keep).collect();
    out.truncate(out.trim_end().len());
    out.push_str(ELLIPSIS);
    out
}

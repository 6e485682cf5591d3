//! GitHub-flavoured markdown to Linear markdown, plus the text markers the
//! engine reads and writes on both sides.
//!
//! Markers:
//!
//! - `<sub>[TEAM-7](url)</sub>` backlink footer appended to mirrored GitHub issues
//! - `[TEAM-7] ` title prefix on mirrored GitHub issues
//! - `LinearCommentId:<id>:` embedded in GitHub comments mirrored from Linear
//! - `> Synced` footer on Linear cycles/projects created from milestones
//! - `on Linear` in GitHub comments that were themselves posted by the reverse sync

use std::sync::OnceLock;

use regex::Regex;

/// Footer that marks a resource as created by sync.
pub const SYNC_FOOTER: &str = "Synced";

/// Text present in GitHub comments mirrored from Linear.
const LINEAR_ECHO: &str = "on Linear";

/// Description marker that makes a milestone a Linear project instead of a cycle.
const PROJECT_MARKER: &str = "(Project)";

/// Above this many tilde runs the strikethrough rewrite is skipped.
const MAX_TILDE_RUNS: usize = 10;

fn html_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"))
}

fn img_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<img[^>]*?src\s*=\s*"https://([^"]*)"[^>]*>"#).expect("valid regex")
    })
}

fn img_src_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"<img[^>]*?src="([^"]+)""#).expect("valid regex"))
}

fn inline_image_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"!\[.*?\]\(.*?\)|<img[^>]*>").expect("valid regex"))
}

fn footer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<sub.*?</sub>\s*$").expect("valid regex"))
}

fn ticket_title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[\w{1,5}-\d{1,6}\]\s").expect("valid regex"))
}

fn comment_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"LinearCommentId:(.*?):").expect("valid regex"))
}

/// Who wrote a piece of text, for senders without a personal link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    pub login: String,
    pub profile_url: String,
}

impl Attribution {
    pub fn github_user(login: &str) -> Self {
        Attribution {
            login: login.to_string(),
            profile_url: format!("https://github.com/{login}"),
        }
    }
}

/// Converts a GitHub body for Linear.
///
/// Drops HTML comments, turns `<img>` tags into markdown images and widens
/// single-tilde strikethrough. With an attribution, the author is credited in
/// a leading quote line.
pub fn adapt(text: &str, attribution: Option<&Attribution>) -> String {
    let without_comments = html_comment_re().replace_all(text, "");
    let with_images = img_tag_re().replace_all(&without_comments, "![image](https://$1)");
    let adapted = widen_strikethrough(&with_images);

    match attribution {
        Some(author) => format!(
            ">[{}]({}) on GitHub:\n\n{}",
            author.login, author.profile_url, adapted
        ),
        None => adapted,
    }
}

/// Rewrites every `~` that is neither escaped nor followed by another `~` as `~~`.
///
/// Text with more than ten tilde runs is returned unchanged.
pub fn widen_strikethrough(text: &str) -> String {
    let runs = text
        .split(|c| c != '~')
        .filter(|segment| !segment.is_empty())
        .count();
    if runs > MAX_TILDE_RUNS {
        return text.to_string();
    }

    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        let escaped = i > 0 && chars[i - 1] == '\\';
        let doubled = chars.get(i + 1) == Some(&'~');
        if c == '~' && !escaped && !doubled {
            out.push_str("~~");
        } else {
            out.push(c);
        }
    }
    out
}

/// True if the body may contain images whose URLs need resolving.
pub fn has_inline_images(body: &str) -> bool {
    body.contains("![") || body.contains("<img")
}

/// `src` attributes of every `<img>` in rendered HTML, in document order.
pub fn extract_image_urls(html: &str) -> Vec<String> {
    img_src_re()
        .captures_iter(html)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Replaces each markdown image or `<img>` tag in `body` with `![image](url)`,
/// consuming `urls` in order. References beyond the last URL are left as is.
pub fn substitute_images(body: &str, urls: &[String]) -> String {
    let mut urls = urls.iter();
    inline_image_re()
        .replace_all(body, |caps: &regex::Captures<'_>| match urls.next() {
            Some(url) => format!("![image]({url})"),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// True for GitHub comments the reverse sync posted.
pub fn is_sync_echo(body: &str) -> bool {
    body.contains(LINEAR_ECHO)
}

/// The Linear comment ID embedded in a mirrored comment, if any.
pub fn comment_marker(body: &str) -> Option<&str> {
    comment_marker_re()
        .captures(body)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str())
        .filter(|id| !id.is_empty())
}

/// True if the title already starts with a ticket key such as `[TEAM-7] `.
pub fn looks_like_ticket_title(title: &str) -> bool {
    ticket_title_re().is_match(title)
}

/// `[TEAM-7] title`.
pub fn ticket_title(ticket: &str, title: &str) -> String {
    format!("[{ticket}] {title}")
}

/// Removes everything up to and including the first `<number>]`, and the
/// whitespace after it.
///
/// Titles without the prefix are returned unchanged.
pub fn strip_title_prefix(title: &str, linear_number: u64) -> String {
    let delimiter = format!("{linear_number}]");
    match title.split_once(&delimiter) {
        Some((_, rest)) => rest.trim_start().to_string(),
        None => title.to_string(),
    }
}

/// `<sub>[TEAM-7](url)</sub>`.
pub fn backlink_footer(ticket: &str, url: &str) -> String {
    format!("<sub>[{ticket}]({url})</sub>")
}

/// `body` followed by the backlink footer.
pub fn with_backlink(body: &str, ticket: &str, url: &str) -> String {
    format!("{body}\n\n{}", backlink_footer(ticket, url))
}

/// Splits a trailing `<sub>…</sub>` footer off a body.
///
/// Returns the trimmed description and the footer text, if present.
pub fn split_footer(body: &str) -> (String, Option<String>) {
    match footer_re().find(body) {
        Some(m) => (
            body[..m.start()].trim().to_string(),
            Some(m.as_str().to_string()),
        ),
        None => (body.trim().to_string(), None),
    }
}

/// True if the milestone should map to a Linear project.
pub fn is_project_milestone(description: &str) -> bool {
    description.contains(PROJECT_MARKER)
}

/// True if the milestone was itself created by the reverse sync.
pub fn milestone_caused_by_sync(description: &str) -> bool {
    description.contains(SYNC_FOOTER)
}

/// Description of a cycle/project created from a milestone.
pub fn milestone_description(description: &str) -> String {
    format!("{description}\n\n> {SYNC_FOOTER}")
}

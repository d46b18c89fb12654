//! Human-readable parse error reports

use ariadne::{Config, Label, Report, ReportKind, Source};
use prerender_nginx_core::ParseIssue;
use std::path::Path;

/// Render `issue` against the text of the file it came from
///
/// Issues without an offset (missing includes, unreadable files) fall back
/// to their plain `line N: message` form.
pub fn render_issue(path: &Path, source: &str, issue: &ParseIssue, color: bool) -> String {
    let Some(offset) = issue.offset else {
        return issue.to_string();
    };
    let name = path.display().to_string();
    // ariadne counts characters, issues count bytes
    let start = char_index(source, offset);
    let end = (start + 1).min(source.chars().count()).max(start);

    let report = Report::build(ReportKind::Error, (name.as_str(), start..end))
        .with_config(Config::default().with_color(color))
        .with_message(&issue.message)
        .with_label(Label::new((name.as_str(), start..end)).with_message("here"))
        .finish();

    let mut buf = Vec::new();
    match report.write((name.as_str(), Source::from(source.to_string())), &mut buf) {
        Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
        Err(_) => issue.to_string(),
    }
}

fn char_index(source: &str, byte_offset: usize) -> usize {
    source
        .char_indices()
        .take_while(|(i, _)| *i < byte_offset)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_points_at_file() {
        let issue = ParseIssue {
            line: Some(2),
            offset: Some(17),
            message: "Unexpected token at position 17".to_string(),
        };
        let text = render_issue(Path::new("/etc/nginx/nginx.conf"), "http {\n    listen 80\n}\n", &issue, false);
        assert!(text.contains("Unexpected token at position 17"));
        assert!(text.contains("/etc/nginx/nginx.conf"));
    }

    #[test]
    fn test_render_without_offset() {
        let issue = ParseIssue {
            line: None,
            offset: None,
            message: "include file not found: /x".to_string(),
        };
        assert_eq!(
            render_issue(Path::new("/a"), "", &issue, false),
            "include file not found: /x"
        );
    }

    #[test]
    fn test_char_index() {
        assert_eq!(char_index("héllo", 3), 2);
        assert_eq!(char_index("abc", 10), 3);
    }
}

//! HTML rendering for the table viewer.

use std::fmt::Write;

const STYLE: &str = r#"
    :root {
      --primary: #FFB84D;
      --bg: #006B5F;
      --text: #F8FAFC;
      --text-muted: #B4CCC9;
      --border: rgba(180, 204, 201, 0.1);
      --hover: #007D6F;
    }
    body { font-family: 'Inter', sans-serif; background: var(--bg); color: var(--text); margin: 20px; }
    .container { max-width: 1200px; margin: 0 auto; padding: 2rem; }
    h1 { font-size: 2.5rem; font-weight: 600; color: var(--primary); margin-bottom: 0.5rem; }
    table { border-collapse: collapse; width: 100%; margin-bottom: 30px; border: 1px solid var(--border); }
    th, td { border: 1px solid var(--border); padding: 12px; text-align: left; }
    th { background: rgba(255, 255, 255, 0.1); font-weight: 500; color: var(--primary); }
    tr:nth-child(even) { background: rgba(255, 255, 255, 0.05); }
    tr:hover { background: var(--hover); }
    ul { list-style: none; padding: 0; }
    li { margin: 10px 0; padding: 10px; border: 1px solid var(--border); border-radius: 8px; }
    a { color: var(--primary); text-decoration: none; }
    p { color: var(--text-muted); margin-bottom: 20px; }
    .nav { margin-bottom: 20px; }
"#;

/// Escape text for use in HTML element content and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Cell text for a nullable column; SQL NULL renders as `null`.
pub fn nullable(value: Option<String>) -> String {
    value.unwrap_or_else(|| "null".to_string())
}

fn page(title: &str, head_extra: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>{}</style>\n{}</head>\n<body>\n<div class=\"container\">\n{}</div>\n</body>\n</html>\n",
        escape(title),
        STYLE,
        head_extra,
        body
    )
}

/// Index page linking to each table.
pub fn render_index(tables: &[(&str, &str)]) -> String {
    let mut body = String::from("<h1>SQLite Database Viewer</h1>\n<h2>Tables</h2>\n<ul>\n");
    for (name, href) in tables {
        let _ = writeln!(
            body,
            "<li><a href=\"{}\">{}</a></li>",
            escape(href),
            escape(name)
        );
    }
    body.push_str("</ul>\n<p>Click on a table name to view its data.</p>\n");
    page("SQLite Database Viewer", "", &body)
}

/// A table page: newest rows first, optional meta refresh.
///
/// `refresh_seconds` of 0 disables the refresh.
pub fn render_table(
    table: &str,
    columns: &[&str],
    rows: &[Vec<String>],
    limit: usize,
    refresh_seconds: u64,
) -> String {
    let back = "<div class=\"nav\"><a href=\"/db-viewer\">&larr; Back to Tables</a></div>\n";
    let mut body = String::new();
    body.push_str(back);
    let _ = writeln!(body, "<h1>{} Table</h1>", escape(table));

    if refresh_seconds > 0 {
        let _ = writeln!(
            body,
            "<p>Showing latest {} records (auto-refreshes every {} seconds)</p>",
            limit, refresh_seconds
        );
    } else {
        let _ = writeln!(body, "<p>Showing latest {} records</p>", limit);
    }

    if rows.is_empty() {
        body.push_str("<p>No data found in this table.</p>\n");
    } else {
        body.push_str("<table>\n<tr>");
        for column in columns {
            let _ = write!(body, "<th>{}</th>", escape(column));
        }
        body.push_str("</tr>\n");
        for row in rows {
            body.push_str("<tr>");
            for cell in row {
                let _ = write!(body, "<td>{}</td>", escape(cell));
            }
            body.push_str("</tr>\n");
        }
        body.push_str("</table>\n");
    }
    body.push_str(back);

    let head_extra = if refresh_seconds > 0 {
        format!("<meta http-equiv=\"refresh\" content=\"{}\">\n", refresh_seconds)
    } else {
        String::new()
    };

    page(&format!("{} Table", table), &head_extra, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("<b>\"a\" & 'b'</b>"), "&lt;b&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/b&gt;");
        assert_eq!(escape("plain 21.5"), "plain 21.5");
    }

    #[test]
    fn test_nullable() {
        assert_eq!(nullable(None), "null");
        assert_eq!(nullable(Some("21.5".to_string())), "21.5");
        assert_eq!(nullable(Some("null".to_string())), "null");
    }

    #[test]
    fn test_render_empty_table() {
        let html = render_table("raw_data", &["id"], &[], 100, 30);
        assert!(html.contains("No data found in this table."));
        assert!(html.contains("<meta http-equiv=\"refresh\" content=\"30\">"));
        assert!(!html.contains("<table>"));
    }

    #[test]
    fn test_render_rows_escaped() {
        let rows = vec![vec!["1".to_string(), "<script>".to_string()]];
        let html = render_table("avg_data", &["id", "note"], &rows, 100, 0);
        assert!(html.contains("<th>id</th><th>note</th>"));
        assert!(html.contains("<td>&lt;script&gt;</td>"));
        assert!(!html.contains("http-equiv"));
    }
}

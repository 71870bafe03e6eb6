//! Splits a migration script into individually executable statements.
//!
//! The scanner understands exactly two pieces of SQL lexical structure:
//!
//! - `--` line comments, which are dropped up to (not including) the newline
//! - dollar-quoted literals (`$$ ... $$`, `$body$ ... $body$`), inside which
//!   semicolons and `--` are ordinary text
//!
//! Everything else, including single-quoted strings and block comments, is
//! passed through untouched. A `;` outside a dollar quote ends a statement.

/// Split `sql` into trimmed statements, in source order.
///
/// Each statement keeps its terminating semicolon. Trailing text without a
/// semicolon becomes a final statement. Whitespace-only fragments are
/// discarded.
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut open_tag: Option<&str> = None;
    let mut pos = 0;

    while let Some(ch) = sql[pos..].chars().next() {
        if open_tag.is_none() && sql[pos..].starts_with("--") {
            pos = match sql[pos..].find('\n') {
                Some(offset) => pos + offset,
                None => sql.len(),
            };
            continue;
        }

        if ch == '$' {
            if let Some(end) = dollar_marker_end(sql, pos) {
                let tag = &sql[pos + 1..end - 1];
                let toggles = match open_tag {
                    None => {
                        open_tag = Some(tag);
                        true
                    }
                    Some(open) if open == tag => {
                        open_tag = None;
                        true
                    }
                    Some(_) => false,
                };
                if toggles {
                    current.push_str(&sql[pos..end]);
                    pos = end;
                    continue;
                }
            }
        }

        if ch == ';' && open_tag.is_none() {
            current.push(';');
            flush(&mut current, &mut statements);
            pos += 1;
            continue;
        }

        current.push(ch);
        pos += ch.len_utf8();
    }

    flush(&mut current, &mut statements);

    log::debug!(
        "Split script into {} statement{}",
        statements.len(),
        if statements.len() == 1 { "" } else { "s" }
    );
    statements
}

/// If a `$<tag>$` marker starts at byte `start`, return the byte offset just
/// past its closing `$`.
///
/// Tags are zero or more alphabetic or underscore characters, so `$1` and a
/// lone `$` never form a marker.
fn dollar_marker_end(sql: &str, start: usize) -> Option<usize> {
    let after = &sql[start + 1..];
    let tag_len: usize = after
        .chars()
        .take_while(|c| c.is_alphabetic() || *c == '_')
        .map(char::len_utf8)
        .sum();
    after[tag_len..]
        .starts_with('$')
        .then_some(start + 1 + tag_len + 1)
}

fn flush(current: &mut String, statements: &mut Vec<String>) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
    current.clear();
}

#[cfg(test)]
#[path = "sql_split_test.rs"]
mod tests;

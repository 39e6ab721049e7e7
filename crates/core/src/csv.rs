//! RFC-4180-style CSV serialization for the teacher export.

use std::borrow::Cow;

/// Quote a field iff it contains a comma, a double quote, or a newline,
/// doubling any internal quotes.
fn escape(field: &str) -> Cow<'_, str> {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Serialize rows of ordered `(name, value)` fields into CSV text.
///
/// The header comes from the first row's field names in insertion order;
/// all rows are expected to share that field set. Absent values render as
/// empty strings. Rows are joined by `\n` with no trailing newline, and
/// zero rows produce an empty string with no header.
#[must_use]
pub fn to_csv<N: AsRef<str>>(rows: &[Vec<(N, Option<String>)>]) -> String {
    let Some(first) = rows.first() else {
        return String::new();
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    let header: Vec<String> = first
        .iter()
        .map(|(name, _)| escape(name.as_ref()).into_owned())
        .collect();
    lines.push(header.join(","));

    for row in rows {
        let fields: Vec<String> = row
            .iter()
            .map(|(_, value)| escape(value.as_deref().unwrap_or_default()).into_owned())
            .collect();
        lines.push(fields.join(","));
    }

    lines.join("\n")
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[(&str, Option<&str>)]) -> Vec<(String, Option<String>)> {
        fields
            .iter()
            .map(|(name, value)| ((*name).to_owned(), value.map(ToOwned::to_owned)))
            .collect()
    }

    #[test]
    fn empty_input_produces_empty_string() {
        let rows: Vec<Vec<(String, Option<String>)>> = Vec::new();
        assert_eq!(to_csv(&rows), "");
    }

    #[test]
    fn plain_fields_need_no_quoting() {
        let rows = vec![row(&[("a", Some("1")), ("b", Some("2"))])];
        assert_eq!(to_csv(&rows), "a,b\n1,2");
    }

    #[test]
    fn comma_forces_quoting() {
        let rows = vec![row(&[("a", Some("1,2")), ("b", Some("x"))])];
        assert_eq!(to_csv(&rows), "a,b\n\"1,2\",x");
    }

    #[test]
    fn internal_quotes_are_doubled() {
        let rows = vec![row(&[("a", Some("He said \"hi\"")), ("b", Some("3"))])];
        assert_eq!(to_csv(&rows), "a,b\n\"He said \"\"hi\"\"\",3");
    }

    #[test]
    fn absent_values_render_empty() {
        let rows = vec![row(&[("a", None), ("b", None)])];
        assert_eq!(to_csv(&rows), "a,b\n,");
    }

    #[test]
    fn newline_in_field_is_quoted() {
        let rows = vec![row(&[("a", Some("two\nlines")), ("b", Some("1"))])];
        assert_eq!(to_csv(&rows), "a,b\n\"two\nlines\",1");
    }

    #[test]
    fn no_trailing_newline_after_last_row() {
        let rows = vec![
            row(&[("a", Some("1"))]),
            row(&[("a", Some("2"))]),
        ];
        let text = to_csv(&rows);
        assert_eq!(text, "a\n1\n2");
        assert!(!text.ends_with('\n'));
    }
}

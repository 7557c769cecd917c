//! Reply text for factoid lookups.

use crate::store::Factoid;

/// Upper bound for a packed reply line, in characters.
pub const MAX_LINE_CHARS: usize = 400;

/// `value [author yyyy-mm-dd]`
pub fn entry(factoid: &Factoid) -> String {
    format!(
        "{} [{} {}]",
        factoid.value,
        factoid.author,
        factoid.timestamp.format("%Y-%m-%d")
    )
}

/// `key = value [author yyyy-mm-dd]`, used for random lookups.
pub fn random_line(factoid: &Factoid) -> String {
    format!("{} = {}", factoid.key, entry(factoid))
}

/// Pack every value of a key into as few lines as possible.
///
/// The running line starts as the bare key. An entry that would bring the
/// running line plus the entry to [`MAX_LINE_CHARS`] or more starts a new
/// line; otherwise it is joined with ` = ` (the first join) or ` || `.
/// Separators are not counted, and the first check measures the bare key,
/// so an oversized first entry leaves the key on a line of its own.
pub fn key_lines(factoids: &[Factoid]) -> Vec<String> {
    let Some(first) = factoids.first() else {
        return Vec::new();
    };

    let mut lines = Vec::new();
    let mut line = first.key.clone();
    let mut joined = false;

    for factoid in factoids {
        let entry = entry(factoid);
        if line.chars().count() + entry.chars().count() >= MAX_LINE_CHARS {
            lines.push(std::mem::replace(&mut line, entry));
        } else {
            line.push_str(if joined { " || " } else { " = " });
            line.push_str(&entry);
            joined = true;
        }
    }

    lines.push(line);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn factoid(key: &str, value: &str) -> Factoid {
        Factoid {
            id: 1,
            key: key.to_string(),
            value: value.to_string(),
            author: "alice".to_string(),
            channel: "#chan".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap(),
            locked: false,
        }
    }

    #[test]
    fn single_value() {
        let lines = key_lines(&[factoid("color", "blue")]);
        assert_eq!(lines, vec!["color = blue [alice 2024-01-01]"]);
    }

    #[test]
    fn several_values_share_a_line() {
        let lines = key_lines(&[
            factoid("color", "blue"),
            factoid("color", "red"),
            factoid("color", "green = not red"),
        ]);
        assert_eq!(
            lines,
            vec![
                "color = blue [alice 2024-01-01] || red [alice 2024-01-01] \
                 || green = not red [alice 2024-01-01]"
            ]
        );
    }

    #[test]
    fn long_values_split_across_lines() {
        let long = "x".repeat(150);
        let rows = vec![factoid("k", &long), factoid("k", &long), factoid("k", &long)];
        let lines = key_lines(&rows);

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("k = "));
        assert_eq!(lines[0].matches(" || ").count(), 1);
        assert_eq!(lines[1], entry(&rows[2]));
        for line in &lines {
            assert!(line.chars().count() <= MAX_LINE_CHARS);
        }
    }

    #[test]
    fn oversized_first_entry_leaves_key_alone() {
        let huge = "y".repeat(MAX_LINE_CHARS);
        let lines = key_lines(&[factoid("k", &huge), factoid("k", "small")]);
        assert_eq!(
            lines,
            vec![
                "k".to_string(),
                entry(&factoid("k", &huge)),
                "small [alice 2024-01-01]".to_string(),
            ]
        );
    }

    #[test]
    fn continuation_after_key_flush_joins_with_equals() {
        let key = "k".repeat(300);
        let value = "v".repeat(150);
        let lines = key_lines(&[factoid(&key, &value), factoid(&key, "w")]);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], key);
        assert_eq!(
            lines[1],
            format!("{value} [alice 2024-01-01] = w [alice 2024-01-01]")
        );
    }

    #[test]
    fn multibyte_values_count_characters() {
        let value = "ü".repeat(190);
        let lines = key_lines(&[factoid("k", &value), factoid("k", &value)]);
        // Counting bytes would flush the bare key first and give three lines.
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn random_line_has_key_prefix() {
        assert_eq!(
            random_line(&factoid("color", "blue")),
            "color = blue [alice 2024-01-01]"
        );
    }

    #[test]
    fn empty_input_renders_nothing() {
        assert!(key_lines(&[]).is_empty());
    }
}

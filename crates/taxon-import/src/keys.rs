//! In-batch natural key handling.

use std::collections::HashMap;

use tracing::warn;

/// Collapse rows sharing a natural key to their last occurrence.
///
/// The surviving row keeps the position of the first occurrence, so a file
/// that repeats a key behaves as if the earlier rows had been edited in
/// place. Each collapse is logged at WARN; it is not an error.
pub fn collapse_by_key<T>(
    entity: &'static str,
    rows: Vec<(usize, T)>,
    key: impl Fn(&T) -> String,
) -> Vec<(usize, T)> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    let mut kept: Vec<(usize, T)> = Vec::with_capacity(rows.len());
    for (line, row) in rows {
        let k = key(&row);
        match index.get(&k) {
            Some(&i) => {
                warn!(
                    subsystem = "import",
                    component = "keys",
                    entity,
                    key = %k,
                    first_line = kept[i].0,
                    line,
                    "Duplicate key in input; last occurrence wins"
                );
                kept[i] = (line, row);
            }
            None => {
                index.insert(k, kept.len());
                kept.push((line, row));
            }
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_occurrence_wins_in_first_position() {
        let rows = vec![(2, ("a", 1)), (3, ("b", 2)), (4, ("a", 3))];
        let collapsed = collapse_by_key("test", rows, |r| r.0.to_string());
        assert_eq!(collapsed, vec![(4, ("a", 3)), (3, ("b", 2))]);
    }

    #[test]
    fn test_distinct_keys_untouched() {
        let rows = vec![(2, "x"), (3, "y")];
        let collapsed = collapse_by_key("test", rows.clone(), |r| r.to_string());
        assert_eq!(collapsed, rows);
    }
}

//! Rebuild plain-text abstracts from OpenAlex inverted indexes
//!
//! OpenAlex ships abstracts as a word → positions map:
//! ```json
//! {"Despite": [0], "growing": [1], "interest": [2, 50], ...}
//! ```

use serde_json::{Map, Value};

/// Flatten to `(position, word)`, order by position, join with spaces.
///
/// Ties on a position keep map order; the result never depends on how the
/// map happens to iterate otherwise.
///
/// ```
/// use serde_json::json;
/// use paperdex_openalex::abstract_decode::decode_inverted_index;
///
/// let index = json!({"sat": [2], "the": [0], "cat": [1]});
/// assert_eq!(decode_inverted_index(index.as_object().unwrap()), "the cat sat");
/// ```
pub fn decode_inverted_index(index: &Map<String, Value>) -> String {
    let mut pairs: Vec<(u64, &str)> = index
        .iter()
        .filter_map(|(word, positions)| Some((word.as_str(), positions.as_array()?)))
        .flat_map(|(word, positions)| {
            positions
                .iter()
                .filter_map(Value::as_u64)
                .map(move |pos| (pos, word))
        })
        .collect();

    pairs.sort_by_key(|(pos, _)| *pos);
    pairs
        .into_iter()
        .map(|(_, word)| word)
        .collect::<Vec<_>>()
        .join(" ")
}

/// `None` for a missing, null, non-object or empty index.
pub fn decode_abstract(value: Option<&Value>) -> Option<String> {
    let text = decode_inverted_index(value?.as_object()?);
    if text.is_empty() { None } else { Some(text) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(v: Value) -> String {
        decode_inverted_index(v.as_object().unwrap())
    }

    #[test]
    fn the_cat_sat() {
        assert_eq!(decode(json!({"the":[0],"cat":[1],"sat":[2]})), "the cat sat");
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let a = decode(json!({"sat":[2],"cat":[1],"the":[0]}));
        let b = decode(json!({"cat":[1],"the":[0],"sat":[2]}));
        assert_eq!(a, "the cat sat");
        assert_eq!(a, b);
    }

    #[test]
    fn repeated_word() {
        assert_eq!(
            decode(json!({"the": [0, 2], "cat": [1], "mat": [3]})),
            "the cat the mat"
        );
    }

    #[test]
    fn position_gaps_are_closed() {
        assert_eq!(decode(json!({"a": [0], "b": [7]})), "a b");
    }

    #[test]
    fn non_numeric_positions_ignored() {
        assert_eq!(decode(json!({"a": [0], "b": ["x"], "c": 3})), "a");
    }

    #[test]
    fn empty_and_null() {
        assert_eq!(decode(json!({})), "");
        assert_eq!(decode_abstract(None), None);
        assert_eq!(decode_abstract(Some(&Value::Null)), None);
        assert_eq!(decode_abstract(Some(&json!({}))), None);
        assert_eq!(
            decode_abstract(Some(&json!({"Hello": [0], "world": [1]}))),
            Some("Hello world".to_string())
        );
    }
}

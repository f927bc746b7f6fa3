//! Reading-time estimate for block-structured posts.

use serde_json::Value;

const WORDS_PER_MINUTE: usize = 200;

/// Code reads slower than prose; each line counts as this many words.
const WORDS_PER_CODE_LINE: usize = 5;

fn words(value: Option<&Value>) -> usize {
    value
        .and_then(Value::as_str)
        .map_or(0, |text| text.split_whitespace().count())
}

fn block_words(block_type: &str, content: &Value) -> usize {
    match block_type {
        "heading" | "paragraph" | "quote" => words(content.get("text")),
        "callout" => words(content.get("title")) + words(content.get("content")),
        "list" => content
            .get("items")
            .and_then(Value::as_array)
            .map_or(0, |items| items.iter().map(|item| words(Some(item))).sum()),
        "code" => content
            .get("code")
            .and_then(Value::as_str)
            .filter(|code| !code.is_empty())
            .map_or(0, |code| code.split('\n').count() * WORDS_PER_CODE_LINE),
        _ => 0,
    }
}

/// Estimated minutes to read a post made of `(block_type, content)` pairs.
///
/// Never less than one minute.
pub fn estimate_read_time<'a, I>(blocks: I) -> i32
where
    I: IntoIterator<Item = (&'a str, &'a Value)>,
{
    let total: usize = blocks
        .into_iter()
        .map(|(block_type, content)| block_words(block_type, content))
        .sum();

    total.div_ceil(WORDS_PER_MINUTE).max(1) as i32
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_post_takes_a_minute() {
        assert_eq!(estimate_read_time(std::iter::empty::<(&str, &Value)>()), 1);
    }

    #[test]
    fn prose_rounds_up() {
        let paragraph = json!({ "text": "word ".repeat(201) });
        assert_eq!(estimate_read_time([("paragraph", &paragraph)]), 2);
    }

    #[test]
    fn mixed_blocks_are_summed() {
        let heading = json!({ "level": 2, "text": "Getting started" });
        let callout = json!({ "variant": "info", "title": "Note", "content": "three words here" });
        let list = json!({ "style": "unordered", "items": ["one two", "three"] });
        let code = json!({ "code": "fn main() {\n}\n", "language": "rust" });
        let image = json!({ "src": "https://example.com/a.png", "alt": "lots of alt words" });

        let blocks = [
            ("heading", &heading),
            ("callout", &callout),
            ("list", &list),
            ("code", &code),
            ("image", &image),
        ];
        // 2 + (1 + 3) + 3 + 3 lines * 5
        assert_eq!(blocks.iter().map(|(t, c)| block_words(t, c)).sum::<usize>(), 24);
        assert_eq!(estimate_read_time(blocks), 1);
    }

    #[test]
    fn long_code_listing() {
        let code = json!({ "code": vec!["let x = 1;"; 80].join("\n") });
        // 80 lines * 5 = 400 words
        assert_eq!(estimate_read_time([("code", &code)]), 2);
    }
}

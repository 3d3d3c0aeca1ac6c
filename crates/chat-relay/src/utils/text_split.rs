/// Split `text` into chunks of at most `limit` characters.
///
/// Splits after the last newline inside the window when there is one,
/// otherwise cuts hard at the limit. Never cuts inside a UTF-8 character,
/// and concatenating the chunks gives back the input.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        // byte offset just past the `limit`-th character
        let window_end = match remaining.char_indices().nth(limit) {
            Some((idx, _)) => idx,
            None => {
                chunks.push(remaining.to_string());
                break;
            }
        };

        let window = &remaining[..window_end];
        let split_at = match window.rfind('\n') {
            Some(idx) if idx > 0 => idx + 1,
            _ => window_end,
        };

        chunks.push(remaining[..split_at].to_string());
        remaining = &remaining[split_at..];
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_message_is_single_chunk() {
        assert_eq!(split_message("hello", 2000), vec!["hello".to_string()]);
    }

    #[test]
    fn test_empty_message_has_no_chunks() {
        assert!(split_message("", 2000).is_empty());
    }

    #[test]
    fn test_hard_split_at_limit() {
        let text = "a".repeat(4500);
        let chunks = split_message(&text, 2000);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 2000);
        assert_eq!(chunks[1].len(), 2000);
        assert_eq!(chunks[2].len(), 500);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_prefers_newline_boundary() {
        let text = format!("{}\n{}", "a".repeat(10), "b".repeat(10));
        let chunks = split_message(&text, 15);

        assert_eq!(chunks[0], format!("{}\n", "a".repeat(10)));
        assert_eq!(chunks[1], "b".repeat(10));
    }

    #[test]
    fn test_multibyte_chars_counted_as_chars() {
        let text = "é".repeat(5);
        let chunks = split_message(&text, 2);

        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 2);
        }
        assert_eq!(chunks.concat(), text);
    }
}

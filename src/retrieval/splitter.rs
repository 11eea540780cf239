//! Character-window text splitter with boundary preference.

/// Boundaries tried in order when looking for a place to cut.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Split `text` into chunks of at most `size` characters, each sharing up to
/// `overlap` characters with the previous one.
///
/// Cuts prefer paragraph breaks, then line breaks, then spaces, as long as
/// the cut keeps the chunk at least half full.
pub fn split_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let size = size.max(1);
    let overlap = overlap.min(size / 2);
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let hard_end = (start + size).min(chars.len());
        let end = if hard_end == chars.len() {
            hard_end
        } else {
            find_cut(&chars, start + size / 2, hard_end).unwrap_or(hard_end)
        };

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        if end == chars.len() {
            break;
        }

        let mut next = end.saturating_sub(overlap).max(start + 1);
        // Do not begin the next window in the middle of a word.
        if next < end && !chars[next - 1].is_whitespace() {
            if let Some(ws) = chars[next..end].iter().position(|c| c.is_whitespace()) {
                next += ws + 1;
            } else {
                next = end;
            }
        }
        start = next;
    }

    chunks
}

/// Latest separator boundary in `(min, max]`, best separator first.
fn find_cut(chars: &[char], min: usize, max: usize) -> Option<usize> {
    for sep in SEPARATORS {
        let sep: Vec<char> = sep.chars().collect();
        let mut pos = max;
        while pos >= min + sep.len() && pos >= sep.len() {
            if chars[pos - sep.len()..pos] == sep[..] {
                return Some(pos);
            }
            pos -= 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_text("  Leave policy.  ", 1000, 200), vec!["Leave policy."]);
        assert!(split_text("   ", 1000, 200).is_empty());
    }

    #[test]
    fn chunks_respect_size() {
        let text = "word ".repeat(1000);
        let chunks = split_text(&text, 100, 20);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
        assert!(chunks.iter().all(|c| c.split(' ').all(|w| w == "word")));
    }

    #[test]
    fn chunks_overlap() {
        let text: String = (0..200).map(|i| format!("w{} ", i)).collect();
        let chunks = split_text(&text, 60, 20);
        for pair in chunks.windows(2) {
            let last_word = pair[0].split_whitespace().last().unwrap();
            assert!(pair[1].contains(last_word), "{:?}", pair);
        }
    }

    #[test]
    fn prefers_paragraph_breaks() {
        let first = "a".repeat(70);
        let text = format!("{}\n\n{} {}", first, "b".repeat(20), "c".repeat(40));
        let chunks = split_text(&text, 100, 0);
        assert_eq!(chunks[0], first);
    }

    #[test]
    fn handles_multibyte_text() {
        let text = "é".repeat(250);
        let chunks = split_text(&text, 100, 10);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
        assert_eq!(chunks.concat().chars().count(), 250);
    }
}

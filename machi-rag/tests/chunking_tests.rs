//! Property tests for fixed-size chunking.

use machi_rag::{Chunker, RecursiveChunker, split_text};
use proptest::prelude::*;

/// Mixed ASCII and Japanese text, so byte and character offsets disagree.
fn arb_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![Just('a'), Just('b'), Just(' '), Just('\n'), Just('ご'), Just('み'), Just('。')],
        0..120,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

fn arb_window() -> impl Strategy<Value = (usize, usize)> {
    (1usize..24).prop_flat_map(|size| (Just(size), 0..size))
}

/// *For any* text and valid window parameters, fixed chunking covers the
/// text without gaps, and each chunk after the first starts with exactly
/// the last `overlap` characters of its predecessor.
mod prop_fixed_coverage {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunks_cover_text_with_exact_overlap(text in arb_text(), (size, overlap) in arb_window()) {
            let chunks = split_text(&text, size, overlap).unwrap();
            let chars: Vec<char> = text.chars().collect();

            if chars.is_empty() {
                prop_assert!(chunks.is_empty());
                return Ok(());
            }

            let mut rebuilt: Vec<char> = Vec::new();
            for (i, chunk) in chunks.iter().enumerate() {
                let chunk_chars: Vec<char> = chunk.text.chars().collect();
                prop_assert_eq!(chunk.index, i);
                prop_assert_eq!(chunk.start, i * (size - overlap));
                prop_assert!(!chunk_chars.is_empty());
                prop_assert!(chunk_chars.len() <= size);
                prop_assert_eq!(&chars[chunk.start..chunk.start + chunk_chars.len()], &chunk_chars[..]);

                if i == 0 {
                    rebuilt.extend(&chunk_chars);
                } else {
                    let previous: Vec<char> = chunks[i - 1].text.chars().collect();
                    prop_assert_eq!(&previous[previous.len() - overlap..], &chunk_chars[..overlap]);
                    rebuilt.extend(&chunk_chars[overlap..]);
                }
                if i + 1 < chunks.len() {
                    prop_assert_eq!(chunk_chars.len(), size);
                }
            }

            prop_assert_eq!(rebuilt, chars);
        }

        #[test]
        fn splitting_is_deterministic(text in arb_text(), (size, overlap) in arb_window()) {
            prop_assert_eq!(split_text(&text, size, overlap).unwrap(), split_text(&text, size, overlap).unwrap());
        }
    }
}

/// *For any* text, recursive chunking never exceeds the chunk size and,
/// without overlap, reproduces the text when its chunks are concatenated.
mod prop_recursive_bounds {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunks_fit_and_concatenate_back(text in arb_text(), size in 1usize..24) {
            let chunks = RecursiveChunker::new(size, 0).unwrap().split(&text);
            prop_assert!(chunks.iter().all(|c| c.char_len() <= size && !c.text.is_empty()));
            let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
            prop_assert_eq!(joined, text);
        }
    }
}

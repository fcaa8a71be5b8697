//! An inverted word index workload: every document maps to the set of words it contains and the
//! per-document indexes are merged into one index from word to document identifiers.

use std::collections::{BTreeMap, BTreeSet};

/// Maps each word to the identifiers of the documents containing it.
pub type WordIndex = BTreeMap<String, BTreeSet<u32>>;

/// Number of candidate words generated per document. Duplicates collapse, so documents usually
/// contain slightly fewer distinct words.
const WORDS_PER_DOCUMENT: u32 = 25;

/// Letters words are built from. A small alphabet makes many documents share words.
const ALPHABET: &[u8] = b"abcdefg";

/// Builds the index of a single synthetic document.
///
/// The words of a document are a deterministic function of its identifier, so the same document
/// always yields the same index.
#[must_use]
pub fn index_document(document: u32) -> WordIndex {
    (0..WORDS_PER_DOCUMENT)
        .map(|k| (word(document, k), BTreeSet::from([document])))
        .collect()
}

/// Merges two indexes, taking the union of the document sets of words present in both.
#[must_use]
pub fn merge_indexes(mut left: WordIndex, right: WordIndex) -> WordIndex {
    for (word, documents) in right {
        left.entry(word).or_default().extend(documents);
    }

    left
}

/// The index of `documents` built sequentially on the calling thread.
#[must_use]
pub fn reference_index(documents: impl IntoIterator<Item = u32>) -> WordIndex {
    documents
        .into_iter()
        .map(index_document)
        .fold(WordIndex::new(), merge_indexes)
}

fn word(document: u32, k: u32) -> String {
    let mut state = u64::from(document)
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(u64::from(k).wrapping_mul(0xBF58_476D_1CE4_E5B9));

    (0..3)
        .map(|_| {
            state ^= state >> 31;
            state = state.wrapping_mul(0x94D0_49BB_1331_11EB);

            let letters = ALPHABET.len() as u64;
            let index = usize::try_from(state % letters).expect("remainder is below alphabet size");

            char::from(*ALPHABET.get(index).expect("remainder is below alphabet size"))
        })
        .collect()
}

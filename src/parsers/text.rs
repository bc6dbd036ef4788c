use std::collections::HashSet;
use std::hash::Hash;

/// Minimum number of characters for a block of text to count as a paragraph
pub const MIN_PARAGRAPH_CHARS: usize = 20;

/// Collapses runs of whitespace (including newlines) into single spaces and trims.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Concatenates the text fragments of a node and cleans the result.
///
/// Fragments are joined as-is, so inline markup splitting a word or sitting
/// next to punctuation leaves the text intact.
pub fn clean_fragments<'a>(fragments: impl IntoIterator<Item = &'a str>) -> String {
    let joined: String = fragments.into_iter().collect();
    clean_text(&joined)
}

/// Whether cleaned text is long enough to be kept as a paragraph
pub fn is_substantial(text: &str) -> bool {
    text.chars().count() > MIN_PARAGRAPH_CHARS
}

/// Removes duplicates while keeping the first occurrence of each item in place
pub fn dedup_stable<T>(items: Vec<T>) -> Vec<T>
where
    T: Eq + Hash + Clone,
{
    dedup_stable_by_key(items, |item| item.clone())
}

/// Removes items whose key was already seen, keeping first occurrences in order
pub fn dedup_stable_by_key<T, K, F>(items: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::with_capacity(items.len());
    items.into_iter().filter(|item| seen.insert(key(item))).collect()
}

use std::collections::HashSet;

use once_cell::sync::Lazy;

/// Fixed English stop-word set (spec §4.5.1 / glossary), filtered before
/// stemming.
pub static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "been", "being", "but", "by", "can", "did",
        "do", "does", "doing", "for", "from", "had", "has", "have", "having", "he", "her",
        "here", "hers", "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is",
        "it", "its", "itself", "me", "my", "myself", "of", "on", "or", "our", "ours",
        "ourselves", "she", "so", "some", "such", "than", "that", "the", "their", "theirs",
        "them", "themselves", "then", "there", "these", "they", "this", "those", "through",
        "to", "too", "was", "we", "were", "what", "when", "where", "which", "while", "who",
        "whom", "why", "will", "with", "you", "your", "yours", "yourself", "yourselves",
    ]
    .into_iter()
    .collect()
});

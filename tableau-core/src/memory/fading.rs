//! Compressed → Faded.
//!
//! Fading is lossy: the gist keeps the shape of the summary and drops the
//! detail. Nothing here ever reads `faded` to rebuild a compressed entry.

use super::entry::{CompressedKind, CompressedMemory, FadedMemory};

const GIST_WORDS: usize = 6;

/// Blur a compressed summary into a faded gist.
#[must_use]
pub fn blur(memory: &CompressedMemory) -> FadedMemory {
    let gist = match &memory.kind {
        CompressedKind::SpecificMoment => {
            format!("something about {}", first_words(&memory.text, GIST_WORDS))
        }
        CompressedKind::GeneralImpression { about } => {
            format!("a vague feeling about {about}")
        }
        CompressedKind::Lesson => {
            format!("a half-remembered lesson: {}", first_words(&memory.text, GIST_WORDS))
        }
    };
    FadedMemory {
        id: memory.id,
        gist,
        originally: memory.created,
    }
}

fn first_words(text: &str, n: usize) -> String {
    let mut words = text.split_whitespace();
    let head: Vec<&str> = words.by_ref().take(n).collect();
    let mut out = head.join(" ");
    if words.next().is_some() {
        out.push_str("...");
    }
    out
}

/// Move every entry of `compressed` for which `should_fade` holds into `faded`,
/// then drop the oldest gists beyond `max_faded`. Returns how many faded.
pub fn fade_where(
    compressed: &mut Vec<CompressedMemory>,
    faded: &mut Vec<FadedMemory>,
    max_faded: usize,
    mut should_fade: impl FnMut(usize, &CompressedMemory) -> bool,
) -> usize {
    let mut kept = Vec::with_capacity(compressed.len());
    let mut moved = 0;
    for (idx, memory) in compressed.drain(..).enumerate() {
        if should_fade(idx, &memory) {
            faded.push(blur(&memory));
            moved += 1;
        } else {
            kept.push(memory);
        }
    }
    *compressed = kept;
    if faded.len() > max_faded {
        let overflow = faded.len() - max_faded;
        faded.drain(..overflow);
    }
    moved
}

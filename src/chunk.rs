//! Page-aware text chunking.
//!
//! Splits one page's text into overlapping word windows of roughly
//! `target_tokens` words each. Window ends prefer sentence boundaries:
//! before cutting, the last third of the window is scanned backward for a
//! terminator, and the cut moves there when it lies past the window's
//! midpoint. Consecutive windows overlap by `overlap_tokens` words.

/// A chunk fragment produced from one page of a source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub page: u32,
}

/// Split a page's text into overlapping word windows.
///
/// The overlap is clamped to a third of the window so every step makes
/// progress; the next window starts at `max(end - overlap, start + 1)`,
/// which terminates even when the configured overlap exceeds the window.
/// Empty or whitespace-only text yields no fragments.
pub fn chunk_page(
    text: &str,
    page: u32,
    target_tokens: usize,
    overlap_tokens: usize,
) -> Vec<Fragment> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let size = target_tokens.max(1);
    let overlap = overlap_tokens.min(size / 3);
    let n = words.len();

    let mut fragments = Vec::new();
    let mut start = 0usize;

    while start < n {
        let mut end = (start + size).min(n);

        if end < n {
            if let Some(cut) = sentence_cut(&words, start, end, size) {
                end = cut;
            }
        }

        let window = words[start..end].join(" ");
        if !window.is_empty() {
            fragments.push(Fragment { text: window, page });
        }

        if end >= n {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }

    fragments
}

/// Scan backward over the last third of the window for a word ending in a
/// sentence terminator. The cut is only taken when it lands past the
/// window's midpoint, so short sentences never shrink a window below half
/// its target.
fn sentence_cut(words: &[&str], start: usize, end: usize, size: usize) -> Option<usize> {
    let floor = end.saturating_sub(size / 3).max(start);
    let mut j = end;
    while j > floor {
        j -= 1;
        if words[j].ends_with('.') || words[j].ends_with('!') || words[j].ends_with('?') {
            let cut = j + 1;
            if cut > start + size / 2 {
                return Some(cut);
            }
            return None;
        }
    }
    None
}

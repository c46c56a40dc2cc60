//! Character-budgeted text splitting shared by the speech, translation and
//! index-building adapters. Budgets count `char`s, not bytes, so Gurmukhi
//! text is measured the same way the remote services measure it.

/// Split `text` into trimmed pieces of at most `max_chars` characters,
/// cutting right after a break character where possible. A run without any
/// break longer than the budget is cut hard.
pub fn pack(text: &str, max_chars: usize, is_break: impl Fn(char) -> bool) -> Vec<String> {
    pack_verbatim(text, max_chars, is_break)
        .into_iter()
        .filter_map(|piece| {
            let trimmed = piece.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect()
}

/// Same cuts as [`pack`], but pieces keep their surrounding whitespace so
/// that concatenating them reproduces `text` exactly.
pub fn pack_verbatim(
    text: &str,
    max_chars: usize,
    is_break: impl Fn(char) -> bool,
) -> Vec<String> {
    let max = max_chars.max(1);
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for segment in segments(text, &is_break) {
        let seg_len = segment.chars().count();
        if current_len + seg_len <= max {
            current.push_str(segment);
            current_len += seg_len;
            continue;
        }

        flush(&mut pieces, &mut current);
        current_len = 0;

        if seg_len <= max {
            current.push_str(segment);
            current_len = seg_len;
        } else {
            let chars: Vec<char> = segment.chars().collect();
            for window in chars.chunks(max) {
                pieces.push(window.iter().collect());
            }
        }
    }
    flush(&mut pieces, &mut current);

    pieces
}

/// Word windows of roughly `size` characters where consecutive windows
/// share up to `overlap` characters of trailing words.
pub fn split_passages(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let size = size.max(1);
    let mut passages = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let mut end = start;
        let mut len = 0;
        while end < words.len() {
            let add = words[end].chars().count() + usize::from(end > start);
            if len + add > size && end > start {
                break;
            }
            len += add;
            end += 1;
        }

        passages.push(words[start..end].join(" "));
        if end >= words.len() {
            break;
        }

        let mut back = end;
        let mut carried = 0;
        while back > start + 1 {
            let add = words[back - 1].chars().count() + 1;
            if carried + add > overlap {
                break;
            }
            carried += add;
            back -= 1;
        }
        start = back;
    }

    passages
}

/// Whitespace and sentence punctuation, including the danda used in Gurmukhi.
pub fn is_speech_break(c: char) -> bool {
    c.is_whitespace() || matches!(c, '.' | ',' | '!' | '?' | ';' | ':' | '।' | '॥')
}

fn segments<'a>(text: &'a str, is_break: &impl Fn(char) -> bool) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut from = 0;
    for (idx, c) in text.char_indices() {
        if is_break(c) {
            let to = idx + c.len_utf8();
            out.push(&text[from..to]);
            from = to;
        }
    }
    if from < text.len() {
        out.push(&text[from..]);
    }
    out
}

fn flush(pieces: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        pieces.push(std::mem::take(current));
    }
}

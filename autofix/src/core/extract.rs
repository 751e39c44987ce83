//! Locate a JSON object inside free-form model output.
//!
//! Suggestion backends reply with prose, fenced code blocks, or bare JSON. The
//! scanner below finds the first balanced `{...}` run, ignoring braces inside
//! JSON string literals once an object has opened.

/// Return the first balanced `{...}` run in `text`.
///
/// The body of the first fenced code block is searched first when it holds an
/// object; otherwise the whole text is scanned. An opening brace that never
/// closes is skipped and scanning resumes at the next one.
pub fn first_balanced_object(text: &str) -> Option<&str> {
    if let Some(body) = first_fence_body(text)
        && let Some(object) = scan(body)
    {
        return Some(object);
    }
    scan(text)
}

fn scan(text: &str) -> Option<&str> {
    let mut from = 0;
    while let Some(offset) = text[from..].find('{') {
        let start = from + offset;
        if let Some(end) = balanced_end(&text[start..]) {
            return Some(&text[start..start + end]);
        }
        from = start + 1;
    }
    None
}

/// Byte length of the balanced object starting at `text[0] == '{'`.
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Body of the first ```` ``` ```` fence, skipping an optional language tag.
fn first_fence_body(text: &str) -> Option<&str> {
    const FENCE: &str = "```";
    let open = text.find(FENCE)?;
    let rest = &text[open + FENCE.len()..];
    let body_start = rest.find('\n').map_or(0, |nl| nl + 1);
    let body = &rest[body_start..];
    let close = body.find(FENCE).unwrap_or(body.len());
    Some(&body[..close])
}

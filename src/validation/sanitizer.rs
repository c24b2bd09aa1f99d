// Removal of formatting artifacts that completion models wrap around query text.

/// Sentinel tokens some models leak into their completions
const SENTINELS: [&str; 2] = ["<s> ", "</s>"];

/// Opening fences that carry a language tag. Stripped as a unit so the tag
/// does not survive as a stray word at the start of the query.
const TAGGED_FENCES: [&str; 3] = ["```sql", "```SQL", "```postgresql"];

/// Strip sentinel tokens and code-fence markers from generated query text.
///
/// Plain literal removal: sentinels first, then tagged fences, then every
/// remaining backtick. Repeats until nothing changes, so the output contains
/// no sentinel and no backtick and sanitizing twice is the same as once.
/// Everything else passes through, including invalid or multi-statement text.
pub fn sanitize(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let mut next = current.clone();
        for sentinel in SENTINELS {
            next = next.replace(sentinel, "");
        }
        for fence in TAGGED_FENCES {
            next = next.replace(fence, "");
        }
        next = next.replace('`', "");
        let next = next.trim().to_string();

        if next == current {
            return next;
        }
        current = next;
    }
}

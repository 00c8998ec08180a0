//! Output Formatter, pure half: tail selection, HTML escaping, chunking for a
//! size-limited reply channel, and the bounded set of live-view message ids.
//!
//! Sending and deleting messages happens in the runtime; nothing here does IO.

/// Escaped body limit per message: 4096 minus the `<pre></pre>` wrapper.
pub const MAX_CHUNK_CHARS: usize = 4085;

/// Live-view tracking capacity. Ids beyond it are not tracked.
pub const MAX_TRACKED_MESSAGES: usize = 16;

pub const DEFAULT_VISIBLE_LINES: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Keep only the tail that fits in one message.
    #[default]
    Truncate,
    /// Emit as many messages as needed, preferring line boundaries.
    Split,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputOptions {
    pub visible_lines: usize,
    pub mode: OutputMode,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            visible_lines: DEFAULT_VISIBLE_LINES,
            mode: OutputMode::Truncate,
        }
    }
}

/// Format captured (already trimmed) text into `<pre>` chunks, oldest first.
/// Always returns at least one chunk.
pub fn format_chunks(text: &str, options: &OutputOptions) -> Vec<String> {
    let escaped = html_escape(keep_last_lines(text, options.visible_lines));
    let bodies = match options.mode {
        OutputMode::Truncate => vec![truncate_front(&escaped, MAX_CHUNK_CHARS)],
        OutputMode::Split => split_bodies(&escaped, MAX_CHUNK_CHARS),
    };
    bodies
        .into_iter()
        .map(|body| format!("<pre>{body}</pre>"))
        .collect()
}

/// Last `n` lines of `text`. A trailing line terminator does not open a new line.
pub fn keep_last_lines(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    let scan_end = text.strip_suffix('\n').map_or(text.len(), str::len);
    let mut seen = 0;
    for (i, b) in text.as_bytes()[..scan_end].iter().enumerate().rev() {
        if *b == b'\n' {
            seen += 1;
            if seen == n {
                return &text[i + 1..];
            }
        }
    }
    text
}

pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

fn byte_offset(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map_or(s.len(), |(i, _)| i)
}

/// If `pos` falls inside an entity, return the entity's `(start, end)`.
fn entity_around(s: &str, pos: usize) -> Option<(usize, usize)> {
    let amp = s[..pos].rfind('&')?;
    let end = amp + s[amp..].find(';')? + 1;
    (end > pos).then_some((amp, end))
}

fn truncate_front(escaped: &str, limit: usize) -> String {
    let total = escaped.chars().count();
    if total <= limit {
        return escaped.to_string();
    }
    let mut start = byte_offset(escaped, total - limit);
    if let Some((_, end)) = entity_around(escaped, start) {
        start = end;
    }
    if let Some(nl) = escaped[start..].find('\n') {
        let after = start + nl + 1;
        if after < escaped.len() {
            start = after;
        }
    }
    escaped[start..].to_string()
}

fn split_bodies(escaped: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = escaped;
    loop {
        let cut = byte_offset(rest, limit);
        if cut == rest.len() {
            chunks.push(rest.to_string());
            return chunks;
        }
        if let Some(nl) = rest[..cut].rfind('\n') {
            chunks.push(rest[..nl].to_string());
            rest = &rest[nl + 1..];
            continue;
        }
        let end = match entity_around(rest, cut) {
            Some((0, entity_end)) => entity_end,
            Some((entity_start, _)) => entity_start,
            None => cut,
        };
        chunks.push(rest[..end].to_string());
        rest = &rest[end..];
    }
}

/// Ids of the reply messages forming the current live view, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedMessages {
    ids: Vec<i64>,
}

impl TrackedMessages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sent message id. Returns false once the cap is reached.
    pub fn push(&mut self, id: i64) -> bool {
        if self.ids.len() >= MAX_TRACKED_MESSAGES {
            tracing::debug!(id, "live-view tracking full; message will not be deleted");
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Take every tracked id, most recently sent first, leaving the set empty.
    pub fn drain_newest_first(&mut self) -> Vec<i64> {
        let mut ids = std::mem::take(&mut self.ids);
        ids.reverse();
        ids
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

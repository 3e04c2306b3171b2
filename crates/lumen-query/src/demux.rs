//! Splits a generation stream into a growing answer and a trailing
//! citation list.
//!
//! Partial answers are published per token. Any tail of the accumulated
//! text that could still turn into the `SOURCES:` marker is held back, so a
//! published partial is always a prefix of every later one. Once the marker
//! is complete the session mutes and ignores the rest of the stream. The
//! final split is re-derived from the complete generation text.

use lumen_core::config::RenderMode;
use lumen_core::types::Generation;

use crate::prompt::SOURCES_MARKER;

/// Answer text and citations of a finished query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalAnswer {
    pub answer: String,
    pub sources: Vec<String>,
    pub rendered: String,
}

/// Per-query accumulator. Reusable after [`StreamSession::finish`] or
/// [`StreamSession::reset`].
#[derive(Debug, Clone)]
pub struct StreamSession {
    tokens: Vec<String>,
    muted: bool,
    published: usize,
    render: RenderMode,
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new(RenderMode::Plain)
    }
}

impl StreamSession {
    #[must_use]
    pub fn new(render: RenderMode) -> Self {
        Self { tokens: Vec::new(), muted: false, published: 0, render }
    }

    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Feed one fragment. Returns the rendered partial answer when the
    /// visible text grew.
    pub fn on_token(&mut self, token: &str) -> Option<String> {
        if self.muted {
            return None;
        }
        self.tokens.push(token.to_string());
        let text = self.tokens.concat();

        let visible = if let Some(pos) = text.find(SOURCES_MARKER) {
            self.muted = true;
            let answer = text[..pos].to_string();
            self.tokens = vec![answer.clone()];
            answer
        } else {
            let held = held_back(&text);
            text[..text.len() - held].to_string()
        };

        if visible.len() > self.published {
            self.published = visible.len();
            Some(render_text(&visible, self.render))
        } else {
            None
        }
    }

    /// Split the complete generation and reset the session.
    pub fn finish(&mut self, generation: &Generation) -> FinalAnswer {
        self.reset();
        let (answer, sources) = split_sources(&generation.text);
        let rendered = render_answer(&answer, &sources, self.render);
        FinalAnswer { answer, sources, rendered }
    }

    pub fn reset(&mut self) {
        self.tokens.clear();
        self.muted = false;
        self.published = 0;
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of the marker.
fn held_back(text: &str) -> usize {
    (1..SOURCES_MARKER.len())
        .rev()
        .find(|&k| text.ends_with(&SOURCES_MARKER[..k]))
        .unwrap_or(0)
}

/// First `SOURCES:` followed by whitespace (or end of text) splits answer
/// from citations. Without one, everything is answer.
#[must_use]
pub fn split_sources(text: &str) -> (String, Vec<String>) {
    let marker_at = text.match_indices(SOURCES_MARKER).map(|(i, _)| i).find(|&i| {
        text[i + SOURCES_MARKER.len()..]
            .chars()
            .next()
            .filter(|c| !c.is_whitespace())
            .is_none()
    });
    let Some(pos) = marker_at else {
        return (text.to_string(), Vec::new());
    };

    let answer = text[..pos].trim().to_string();
    let mut sources: Vec<String> = Vec::new();
    for source in text[pos + SOURCES_MARKER.len()..].split(',') {
        let source = source.trim();
        if !source.is_empty() && !sources.iter().any(|s| s == source) {
            sources.push(source.to_string());
        }
    }
    (answer, sources)
}

#[must_use]
pub fn render_text(text: &str, mode: RenderMode) -> String {
    match mode {
        RenderMode::Plain => text.replace("\r\n", "\n"),
        RenderMode::Html => escape_html(text).replace("\r\n", "\n").replace('\n', "<br>"),
    }
}

#[must_use]
pub fn render_answer(answer: &str, sources: &[String], mode: RenderMode) -> String {
    let mut out = render_text(answer, mode);
    if sources.is_empty() {
        return out;
    }
    match mode {
        RenderMode::Plain => {
            out.push_str("\n\nSources:");
            for source in sources {
                out.push_str("\n- ");
                out.push_str(source);
            }
        }
        RenderMode::Html => {
            out.push_str("<br><br><b>Sources:</b>");
            for source in sources {
                let escaped = escape_html(source);
                out.push_str(&format!("<br><a href=\"file://{escaped}\">{escaped}</a>"));
            }
        }
    }
    out
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

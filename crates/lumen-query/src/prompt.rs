use lumen_core::types::RetrievedChunk;

/// Literal that separates the answer from its citation list.
pub const SOURCES_MARKER: &str = "SOURCES:";

const INSTRUCTIONS: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.
End your answer with a single line listing the source paths you used, separated by commas, exactly like:
SOURCES: /path/to/first.txt, /path/to/second.pdf";

/// Retrieval-augmented prompt: instructions, numbered context excerpts
/// tagged with their source path, then the question.
#[must_use]
pub fn build_prompt(question: &str, context: &[RetrievedChunk]) -> String {
    let mut prompt = String::from(INSTRUCTIONS);
    prompt.push_str("\n\nContext:\n");
    for (i, chunk) in context.iter().enumerate() {
        prompt.push_str(&format!("[{}] source: {}\n{}\n\n", i + 1, chunk.source_path, chunk.text.trim()));
    }
    prompt.push_str(&format!("Question: {}\nHelpful answer:", question.trim()));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_cites_every_source_and_asks_for_marker() {
        let context = vec![
            RetrievedChunk { source_path: "/d/a.txt".into(), text: "alpha\n".into(), score: 0.9 },
            RetrievedChunk { source_path: "/d/b.pdf".into(), text: "beta".into(), score: 0.5 },
        ];
        let prompt = build_prompt(" what is alpha? ", &context);
        assert!(prompt.contains("[1] source: /d/a.txt\nalpha\n"));
        assert!(prompt.contains("[2] source: /d/b.pdf\nbeta"));
        assert!(prompt.contains(SOURCES_MARKER));
        assert!(prompt.ends_with("Question: what is alpha?\nHelpful answer:"));
    }
}

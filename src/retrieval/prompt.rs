use std::fmt;

use crate::index::SearchResult;

/// Ranked chunk texts joined into one block of prompt context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalContext(String);

impl RetrievalContext {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RetrievalContext {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Join chunk texts with newlines in ranked order. Duplicates are kept.
#[inline]
pub fn assemble(results: &[SearchResult]) -> RetrievalContext {
    let texts: Vec<&str> = results.iter().map(|r| r.chunk.text.as_str()).collect();
    RetrievalContext(texts.join("\n"))
}

/// Context and question, ready to be rendered into a generation prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptEnvelope {
    pub context: RetrievalContext,
    pub question: String,
}

impl PromptEnvelope {
    #[inline]
    pub fn new(context: RetrievalContext, question: impl Into<String>) -> Self {
        Self {
            context,
            question: question.into(),
        }
    }

    #[inline]
    pub fn render(&self) -> String {
        format!(
            "Answer the question based on the following context:\n{}\n\nQuestion: {}\nAnswer:",
            self.context, self.question
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::Chunk;

    fn result(text: &str, distance: f32) -> SearchResult {
        SearchResult {
            chunk: Chunk {
                text: text.to_string(),
                source_index: 0,
                overlap: 0,
            },
            distance,
        }
    }

    #[test]
    fn renders_prompt_template() {
        let context = assemble(&[result("A", 0.1), result("B", 0.2)]);
        let prompt = PromptEnvelope::new(context, "Q?").render();

        assert_eq!(
            prompt,
            "Answer the question based on the following context:\nA\nB\n\nQuestion: Q?\nAnswer:"
        );
    }

    #[test]
    fn duplicates_are_kept() {
        let context = assemble(&[result("A", 0.0), result("A", 0.0)]);
        assert_eq!(context.as_str(), "A\nA");
    }

    #[test]
    fn empty_results_give_empty_context() {
        let context = assemble(&[]);
        assert_eq!(context, RetrievalContext::default());
        assert_eq!(
            PromptEnvelope::new(context, "Q?").render(),
            "Answer the question based on the following context:\n\n\nQuestion: Q?\nAnswer:"
        );
    }
}

// Generation module
// Turns a rendered prompt into an answer, remotely via Ollama or with a local model

pub mod local;
pub mod ollama;

#[cfg(feature = "local-llm")]
pub use local::CandleModel;
pub use local::{CausalModel, LocalGenerator, SamplingConfig};
pub use ollama::OllamaGenerator;

use tracing::debug;

use crate::Result;
use crate::embeddings::Embedder;
use crate::retrieval::{PromptEnvelope, Retriever, assemble};

/// Produces a completion for a prompt. Single-shot and blocking.
pub trait Generator {
    fn generate(&mut self, prompt: &str) -> Result<String>;
}

impl<G: Generator + ?Sized> Generator for &mut G {
    #[inline]
    fn generate(&mut self, prompt: &str) -> Result<String> {
        (**self).generate(prompt)
    }
}

impl<G: Generator + ?Sized> Generator for Box<G> {
    #[inline]
    fn generate(&mut self, prompt: &str) -> Result<String> {
        (**self).generate(prompt)
    }
}

/// Build the prompt for `question` from the chunks `retriever` finds
#[inline]
pub fn build_prompt<E: Embedder>(question: &str, retriever: &Retriever<'_, E>) -> Result<String> {
    let results = retriever.retrieve(question)?;
    let prompt = PromptEnvelope::new(assemble(&results), question).render();
    debug!("Prompt built from {} chunks", results.len());
    Ok(prompt)
}

/// Retrieve context for `question` and generate an answer from it
#[inline]
pub fn answer<E, G>(question: &str, retriever: &Retriever<'_, E>, generator: &mut G) -> Result<String>
where
    E: Embedder,
    G: Generator + ?Sized,
{
    let prompt = build_prompt(question, retriever)?;
    generator.generate(&prompt)
}

//! Answer synthesis: abstain policy, optional evidence compression, and
//! citation-aware prompting against the text-generation provider.

use std::time::Duration;

use tracing::warn;

use crate::config::Config;
use crate::error::Result;
use crate::generation::{Generator, SamplingParams};
use crate::models::{Answer, Hit, QueryOutcome};
use crate::search::HybridEngine;

/// Fixed answer returned when retrieval produced no usable evidence.
pub const INSUFFICIENT_EVIDENCE: &str =
    "I don't know: the indexed documents do not contain enough evidence to answer that.";

const SYSTEM_PROMPT: &str = "You are a helpful research assistant. Use ONLY the provided context \
to answer. If the answer is not in the context, say you don't know. Be concise and cite sources \
like [filename], or [filename p.X] when a page number is given.";

const COMPRESS_SYSTEM_PROMPT: &str = "You compress retrieved passages into dense evidence \
bullets. Keep every fact needed to answer the question and preserve the inline citation markers \
exactly as given. Output only the bullets.";

/// Citation marker for a passage: `[filename p.X]` with a page, else
/// `[filename]`.
pub fn citation_marker(hit: &Hit) -> String {
    match hit.page {
        Some(page) => format!("[{} p.{}]", hit.source, page),
        None => format!("[{}]", hit.source),
    }
}

fn context_block(passages: &[Hit]) -> String {
    passages
        .iter()
        .map(|p| format!("{}\n{}", citation_marker(p), p.text))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

fn user_prompt(question: &str, passages: &[Hit]) -> String {
    format!(
        "Question: {question}\n\nContext:\n{}\n\nInstructions: Answer using only the context \
above and cite sources like [filename].",
        context_block(passages)
    )
}

/// Synthesize an answer from retrieved hits.
///
/// Abstains, without any provider call, when there are no hits or the
/// best hit scores below the configured minimum. `sources` always reflects
/// the original hits, even when compression replaced the passages used for
/// generation.
pub fn generate_answer(
    config: &Config,
    generator: &dyn Generator,
    question: &str,
    hits: Vec<Hit>,
) -> Result<Answer> {
    let best = hits
        .iter()
        .map(|h| h.score)
        .fold(f32::NEG_INFINITY, f32::max);

    if hits.is_empty() || best < config.retrieval.min_score {
        return Ok(Answer {
            answer: INSUFFICIENT_EVIDENCE.to_string(),
            sources: Vec::new(),
            passages: hits,
        });
    }

    let mut sources: Vec<String> = hits.iter().map(|h| h.source.clone()).collect();
    sources.sort();
    sources.dedup();

    let passages = if config.generation.compress_context {
        match compress_passages(config, generator, question, &hits, best) {
            Ok(compressed) => vec![compressed],
            Err(err) => {
                warn!(error = %err, "evidence compression failed; using raw passages");
                hits
            }
        }
    } else {
        hits
    };

    let params = SamplingParams {
        temperature: config.generation.temperature,
        top_p: config.generation.top_p,
        max_tokens: config.generation.max_tokens,
        timeout: Duration::from_secs(config.generation.timeout_secs),
    };
    let text = generator.generate(SYSTEM_PROMPT, &user_prompt(question, &passages), &params)?;

    Ok(Answer {
        answer: text,
        sources,
        passages,
    })
}

/// One auxiliary generation call that folds all passages into a single
/// synthetic passage of evidence bullets, citation markers intact.
fn compress_passages(
    config: &Config,
    generator: &dyn Generator,
    question: &str,
    hits: &[Hit],
    best_score: f32,
) -> Result<Hit> {
    let user = format!(
        "Question: {question}\n\nPassages:\n{}",
        context_block(hits)
    );
    let params = SamplingParams {
        temperature: config.generation.temperature,
        top_p: config.generation.top_p,
        max_tokens: config.generation.max_tokens,
        timeout: Duration::from_secs(config.generation.compress_timeout_secs),
    };
    let text = generator.generate(COMPRESS_SYSTEM_PROMPT, &user, &params)?;

    Ok(Hit {
        text,
        source: "compressed".to_string(),
        page: None,
        chunk_id: "compressed".to_string(),
        score: best_score,
    })
}

/// Full query pipeline: retrieve, then synthesize, producing the result
/// shape the serving layer returns.
pub fn run_query(
    config: &Config,
    engine: &HybridEngine<'_>,
    generator: &dyn Generator,
    question: &str,
    top_k: Option<usize>,
) -> Result<QueryOutcome> {
    let k = top_k.unwrap_or(config.retrieval.top_k);
    let hits = engine.search(question, k)?;
    let retrieved = hits.len();

    let answer = generate_answer(config, generator, question, hits)?;

    Ok(QueryOutcome {
        answer: answer.answer,
        sources: answer.sources,
        passages: answer.passages,
        retrieved,
    })
}

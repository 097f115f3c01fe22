//! YES/NO constraint verification via generative-model logprobs.
//!
//! A single prompt asks the model whether the retrieved passages endorse the
//! constraint as a general rule, answering with exactly one token. The
//! emitted token is checked first; if it is neither YES nor NO the ranked
//! alternatives are scanned. A token absent from both places keeps the
//! sentinel logit; that reads as probability zero, i.e. maximal uncertainty,
//! and is not an error.

use crate::error::WeightError;
use crate::model::{Completion, CompletionModel};

use super::retrieve::RetrievedChunk;

/// Logit assigned to a token the model never surfaced. `exp(SENTINEL_LOGIT)`
/// underflows to a probability that is treated as exactly zero.
pub const SENTINEL_LOGIT: f64 = -100.0;

/// Outcome of one verification call for one soft constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationResult {
    pub logit_yes: f64,
    pub logit_no: f64,
    pub prob_yes: f64,
    pub prob_no: f64,
    /// The token the model actually emitted, trimmed.
    pub generated_token: String,
    /// How many chunks the document split into.
    pub chunks_total: usize,
    /// How many retrieved chunks went into the prompt.
    pub chunks_used: usize,
}

/// Build the verification prompt from the retrieved chunks and the
/// constraint statement.
pub fn build_prompt(retrieved: &[RetrievedChunk], constraint: &str) -> String {
    let passages: Vec<&str> = retrieved.iter().map(|r| r.chunk.text.as_str()).collect();
    format!(
        "You are a verifier that will answer with exactly one token: \"YES\" or \"NO\". \
         Do not produce any other text.\n\
         \n\
         [TEXT]\n\
         {}\n\
         \n\
         [CONSTRAINT]\n\
         {}\n\
         \n\
         [QUESTION]\n\
         Does the text endorse this constraint as a general, necessary rule? \
         Answer \"YES\" or \"NO\" with no other words.",
        passages.join("\n\n"),
        constraint
    )
}

fn normalize(token: &str) -> String {
    token.trim().to_ascii_uppercase()
}

/// Pull YES/NO logits out of a completion: the emitted token first, then the
/// ranked alternatives; first hit wins. Missing tokens keep [`SENTINEL_LOGIT`].
pub fn extract_yes_no(completion: &Completion) -> (f64, f64) {
    let mut logit_yes = SENTINEL_LOGIT;
    let mut logit_no = SENTINEL_LOGIT;

    match normalize(&completion.token).as_str() {
        "YES" => logit_yes = completion.logprob,
        "NO" => logit_no = completion.logprob,
        _ => {}
    }

    for alt in &completion.alternatives {
        match normalize(&alt.token).as_str() {
            "YES" if logit_yes == SENTINEL_LOGIT => logit_yes = alt.logprob,
            "NO" if logit_no == SENTINEL_LOGIT => logit_no = alt.logprob,
            _ => {}
        }
    }

    (logit_yes, logit_no)
}

fn logit_to_prob(logit: f64) -> f64 {
    if logit > SENTINEL_LOGIT { logit.exp() } else { 0.0 }
}

/// Run one verification call and derive the YES/NO probabilities.
pub fn verify<C: CompletionModel>(
    model: &C,
    retrieved: &[RetrievedChunk],
    constraint: &str,
    chunks_total: usize,
) -> Result<VerificationResult, WeightError> {
    let prompt = build_prompt(retrieved, constraint);
    let completion = model.complete(&prompt)?;

    let (logit_yes, logit_no) = extract_yes_no(&completion);

    Ok(VerificationResult {
        logit_yes,
        logit_no,
        prob_yes: logit_to_prob(logit_yes),
        prob_no: logit_to_prob(logit_no),
        generated_token: completion.token.trim().to_string(),
        chunks_total,
        chunks_used: retrieved.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelError, TokenLogprob};
    use crate::weights::chunk::Chunk;

    fn completion(token: &str, logprob: f64, alts: &[(&str, f64)]) -> Completion {
        Completion {
            token: token.into(),
            logprob,
            alternatives: alts
                .iter()
                .map(|(t, lp)| TokenLogprob {
                    token: (*t).to_string(),
                    logprob: *lp,
                })
                .collect(),
        }
    }

    #[test]
    fn emitted_token_wins() {
        let c = completion("YES", -0.1, &[("NO", -2.5)]);
        let (yes, no) = extract_yes_no(&c);
        assert_eq!(yes, -0.1);
        assert_eq!(no, -2.5);
    }

    #[test]
    fn emitted_token_is_normalized() {
        let c = completion(" yes\n", -0.2, &[]);
        let (yes, no) = extract_yes_no(&c);
        assert_eq!(yes, -0.2);
        assert_eq!(no, SENTINEL_LOGIT);
    }

    #[test]
    fn alternatives_fill_missing_tokens() {
        // Model emitted something else entirely; YES/NO only in alternatives.
        let c = completion("Sure", -0.5, &[("YES", -1.0), ("NO", -2.0)]);
        let (yes, no) = extract_yes_no(&c);
        assert_eq!(yes, -1.0);
        assert_eq!(no, -2.0);
    }

    #[test]
    fn first_alternative_hit_wins() {
        let c = completion("Sure", -0.5, &[("YES", -1.0), ("YES", -4.0)]);
        let (yes, _) = extract_yes_no(&c);
        assert_eq!(yes, -1.0);
    }

    #[test]
    fn missing_tokens_keep_sentinel_and_zero_probability() {
        let c = completion("Maybe", -0.5, &[("Perhaps", -1.0)]);
        let (yes, no) = extract_yes_no(&c);
        assert_eq!(yes, SENTINEL_LOGIT);
        assert_eq!(no, SENTINEL_LOGIT);
        assert_eq!(logit_to_prob(yes), 0.0);
        assert_eq!(logit_to_prob(no), 0.0);
    }

    #[test]
    fn prompt_contains_sections_and_texts() {
        let retrieved = vec![RetrievedChunk {
            chunk: Chunk {
                text: "goggles required in the lab".into(),
                start: 0,
                end: 27,
            },
            similarity: 0.9,
        }];
        let prompt = build_prompt(&retrieved, "employees wear goggles");
        assert!(prompt.contains("[TEXT]"));
        assert!(prompt.contains("[CONSTRAINT]"));
        assert!(prompt.contains("[QUESTION]"));
        assert!(prompt.contains("goggles required in the lab"));
        assert!(prompt.contains("employees wear goggles"));
    }

    struct FixedModel(Completion);

    impl CompletionModel for FixedModel {
        fn complete(&self, _prompt: &str) -> Result<Completion, ModelError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn verify_converts_logits_to_probabilities() {
        let model = FixedModel(completion("YES", -0.105360516, &[("NO", -2.3025851)]));
        let result = verify(&model, &[], "rule", 7).unwrap();
        assert!((result.prob_yes - 0.9).abs() < 1e-6);
        assert!((result.prob_no - 0.1).abs() < 1e-6);
        assert_eq!(result.generated_token, "YES");
        assert_eq!(result.chunks_total, 7);
        assert_eq!(result.chunks_used, 0);
    }

    struct TimeoutModel;

    impl CompletionModel for TimeoutModel {
        fn complete(&self, _prompt: &str) -> Result<Completion, ModelError> {
            Err(ModelError::Timeout { timeout_secs: 30 })
        }
    }

    #[test]
    fn timeout_propagates_typed() {
        let result = verify(&TimeoutModel, &[], "rule", 1);
        assert!(matches!(
            result,
            Err(WeightError::Model(ModelError::Timeout { .. }))
        ));
    }
}

// src/triage/dedup.rs
// Near-duplicate detection for candidate questions. The model is told not to
// repeat itself; this enforces it in code.

use similar::TextDiff;
use tracing::debug;

/// Normalized character-level similarity ratio in [0, 1].
pub fn similarity(a: &str, b: &str) -> f32 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    TextDiff::from_chars(a.as_str(), b.as_str()).ratio()
}

/// Filters planner candidates against everything already asked or pending.
/// Threshold and minimum length come from config; tuned heuristics, not
/// contracts.
#[derive(Debug, Clone)]
pub struct QuestionFilter {
    pub threshold: f32,
    pub min_chars: usize,
}

impl QuestionFilter {
    pub fn new(threshold: f32, min_chars: usize) -> Self {
        Self {
            threshold,
            min_chars,
        }
    }

    fn is_repeat(&self, candidate: &str, existing: &str) -> bool {
        similarity(candidate, existing) > self.threshold
    }

    /// Accept candidates that are long enough and not near-duplicates of any
    /// forbidden entry (asked questions, assistant turns), any pending
    /// checklist item, or an earlier accepted candidate.
    pub fn filter(
        &self,
        candidates: Vec<String>,
        forbidden: &[String],
        pending: &[String],
    ) -> Vec<String> {
        let mut accepted: Vec<String> = Vec::new();

        'candidates: for candidate in candidates {
            let candidate = candidate.trim().to_string();
            if candidate.len() < self.min_chars {
                continue;
            }

            for existing in forbidden
                .iter()
                .chain(pending.iter())
                .chain(accepted.iter())
            {
                if self.is_repeat(&candidate, existing) {
                    debug!("Deduped candidate '{}' against '{}'", candidate, existing);
                    continue 'candidates;
                }
            }

            accepted.push(candidate);
        }

        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> QuestionFilter {
        QuestionFilter::new(0.6, 5)
    }

    #[test]
    fn similarity_is_symmetric_enough() {
        let a = "Do you have neck stiffness?";
        let b = "Do you have any neck stiffness?";
        assert!(similarity(a, b) > 0.9);
        assert!(similarity(a, "Any recent travel abroad?") < 0.6);
    }

    #[test]
    fn rejects_paraphrased_repeat() {
        let forbidden = vec!["Do you have neck stiffness?".to_string()];
        let accepted = filter().filter(
            vec!["Is your neck feeling stiff? Do you have stiffness?".to_string()],
            &forbidden,
            &[],
        );
        // Paraphrase shares most of its characters with the forbidden entry.
        assert!(accepted.is_empty() || similarity(&accepted[0], &forbidden[0]) <= 0.6);
    }

    #[test]
    fn rejects_exact_repeat_and_pending() {
        let forbidden = vec!["Any convulsions?".to_string()];
        let pending = vec!["How long has the fever lasted?".to_string()];
        let accepted = filter().filter(
            vec![
                "Any convulsions?".to_string(),
                "How long has the fever lasted?".to_string(),
                "Do you have a skin rash anywhere?".to_string(),
            ],
            &forbidden,
            &pending,
        );
        assert_eq!(accepted, vec!["Do you have a skin rash anywhere?"]);
    }

    #[test]
    fn rejects_short_and_empty() {
        let accepted = filter().filter(
            vec!["".to_string(), "ok?".to_string()],
            &[],
            &[],
        );
        assert!(accepted.is_empty());
    }

    #[test]
    fn dedupes_within_batch() {
        let accepted = filter().filter(
            vec![
                "Do you have a skin rash?".to_string(),
                "Do you have any skin rash?".to_string(),
            ],
            &[],
            &[],
        );
        assert_eq!(accepted.len(), 1);
    }
}

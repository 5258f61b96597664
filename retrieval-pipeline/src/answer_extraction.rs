use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use common::{
    error::AppError,
    storage::{db::SurrealDbClient, types::chunk::ChunkSpan, types::content_item::ContentType},
    utils::embedding::EmbeddingProvider,
};

use crate::{
    hybrid,
    llm::LlmClient,
    scoring::ScoredCandidate,
};

pub const DEFAULT_ANSWER_LIMIT: usize = 5;
/// Answers at or below this confidence are noise, not answers.
const MIN_CONFIDENCE: f32 = 0.1;

/// One extracted answer with source attribution.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerResult {
    pub answer: String,
    pub confidence: f32,
    pub has_answer: bool,
    pub chunk_id: String,
    pub source_chunk: String,
    pub source_title: String,
    pub content_type: ContentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_num: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QaSearchResults {
    pub query: String,
    pub answers: Vec<AnswerResult>,
    pub strategy: &'static str,
    pub total: usize,
}

/// Extracts answers from candidate chunks through the pluggable LLM
/// capability.
pub struct AnswerExtractor {
    llm: Arc<dyn LlmClient>,
}

impl AnswerExtractor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Runs extraction for one candidate and attaches source attribution
    /// from its metadata.
    pub async fn extract_answer(
        &self,
        query: &str,
        candidate: &ScoredCandidate,
    ) -> Result<AnswerResult, AppError> {
        let response = self
            .llm
            .extract_answer(query, &candidate.chunk.chunk_text)
            .await?;

        let (page_num, start_time, end_time, speaker) = match &candidate.chunk.chunk_span {
            ChunkSpan::Document { page, .. } => (Some(*page), None, None, None),
            ChunkSpan::Audio {
                start_time_s,
                end_time_s,
                speaker_id,
            } => (None, Some(*start_time_s), Some(*end_time_s), speaker_id.clone()),
            ChunkSpan::Web { .. } => (None, None, None, None),
        };

        Ok(AnswerResult {
            answer: response.answer,
            confidence: response.confidence,
            has_answer: response.has_answer,
            chunk_id: candidate.chunk.id.clone(),
            source_chunk: candidate.chunk.chunk_text.clone(),
            source_title: candidate.title.clone(),
            content_type: candidate.content_type,
            page_num,
            start_time,
            end_time,
            speaker,
        })
    }

    /// Extracts answers for every candidate, dropping no-answer verdicts
    /// and per-candidate failures. Fails only when every candidate failed.
    pub async fn extract_answers(
        &self,
        query: &str,
        candidates: &[ScoredCandidate],
    ) -> Result<Vec<AnswerResult>, AppError> {
        let mut answers = Vec::new();
        let mut failures = 0usize;

        for candidate in candidates {
            match self.extract_answer(query, candidate).await {
                Ok(result) => {
                    if result.has_answer && result.confidence > MIN_CONFIDENCE {
                        answers.push(result);
                    }
                }
                Err(err) => {
                    failures += 1;
                    warn!(
                        chunk_id = %candidate.chunk.id,
                        %err,
                        "answer extraction failed for candidate; dropping"
                    );
                }
            }
        }

        if !candidates.is_empty() && failures == candidates.len() {
            return Err(AppError::Llm(
                "answer extraction failed for every candidate".into(),
            ));
        }

        Ok(answers)
    }
}

/// Stable sort by confidence, highest first.
pub fn rank_answers_by_confidence(mut answers: Vec<AnswerResult>) -> Vec<AnswerResult> {
    answers.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });
    answers
}

/// Two-stage QA search: hybrid retrieval over `3 * limit` candidates, then
/// per-candidate answer extraction ranked by the model's confidence. An
/// empty answer list is a normal result, not an error.
pub async fn qa_search(
    db: &SurrealDbClient,
    embedder: &EmbeddingProvider,
    extractor: &AnswerExtractor,
    user_id: &str,
    query: &str,
    limit: usize,
) -> Result<QaSearchResults, AppError> {
    let limit = if limit == 0 { DEFAULT_ANSWER_LIMIT } else { limit };
    let candidate_limit = limit * 3;

    let candidates =
        hybrid::collect_candidates(db, embedder, user_id, query, candidate_limit).await?;
    info!(candidates = candidates.len(), "running answer extraction");

    let answers = extractor.extract_answers(query, &candidates).await?;
    let mut ranked = rank_answers_by_confidence(answers);
    ranked.truncate(limit);

    Ok(QaSearchResults {
        query: query.to_string(),
        total: ranked.len(),
        answers: ranked,
        strategy: "qa-hybrid",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmResponse;
    use crate::scoring::RetrievalChannel;
    use async_trait::async_trait;
    use common::storage::types::chunk::Chunk;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted LLM: answers keyed by chunk substring, errors on demand.
    struct ScriptedLlm {
        responses: HashMap<&'static str, LlmResponse>,
        fail_on: Vec<&'static str>,
        calls: Mutex<usize>,
    }

    impl ScriptedLlm {
        fn new() -> Self {
            Self {
                responses: HashMap::new(),
                fail_on: Vec::new(),
                calls: Mutex::new(0),
            }
        }

        fn with_response(mut self, marker: &'static str, response: LlmResponse) -> Self {
            self.responses.insert(marker, response);
            self
        }

        fn failing_on(mut self, marker: &'static str) -> Self {
            self.fail_on.push(marker);
            self
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn extract_answer(&self, _query: &str, chunk: &str) -> Result<LlmResponse, AppError> {
            *self.calls.lock().unwrap() += 1;

            if self.fail_on.iter().any(|marker| chunk.contains(marker)) {
                return Err(AppError::Llm("provider unavailable".into()));
            }

            for (marker, response) in &self.responses {
                if chunk.contains(marker) {
                    return Ok(response.clone());
                }
            }

            Ok(LlmResponse {
                answer: String::new(),
                confidence: 0.0,
                has_answer: false,
                reasoning: "nothing relevant".into(),
            })
        }
    }

    fn verdict(answer: &str, confidence: f32, has_answer: bool) -> LlmResponse {
        LlmResponse {
            answer: answer.to_string(),
            confidence,
            has_answer,
            reasoning: "scripted".into(),
        }
    }

    fn candidate(id: &str, text: &str, span: ChunkSpan) -> ScoredCandidate {
        let mut chunk = Chunk::new(
            "content-1".to_string(),
            text.to_string(),
            0,
            text.split_whitespace().count() as u32,
            span,
            "user".to_string(),
        );
        chunk.id = id.to_string();
        ScoredCandidate {
            chunk,
            title: "source-title".to_string(),
            content_type: ContentType::Document,
            base: 0.8,
            source: RetrievalChannel::Vector,
            dual_channel: false,
            score: 0.8,
        }
    }

    fn doc_candidate(id: &str, text: &str) -> ScoredCandidate {
        candidate(
            id,
            text,
            ChunkSpan::Document {
                page: 3,
                start_char: 0,
                end_char: text.chars().count() as u64,
            },
        )
    }

    #[tokio::test]
    async fn attribution_carries_page_for_document_spans() {
        let llm = ScriptedLlm::new()
            .with_response("Paris", verdict("Paris", 0.9, true));
        let extractor = AnswerExtractor::new(Arc::new(llm));

        let candidate = doc_candidate("c1", "Paris is the capital of France.");
        let answer = extractor
            .extract_answer("capital?", &candidate)
            .await
            .expect("extract");

        assert_eq!(answer.answer, "Paris");
        assert_eq!(answer.chunk_id, "c1");
        assert_eq!(answer.source_chunk, "Paris is the capital of France.");
        assert_eq!(answer.source_title, "source-title");
        assert_eq!(answer.content_type, ContentType::Document);
        assert_eq!(answer.page_num, Some(3));
        assert!(answer.start_time.is_none());
        assert!(answer.speaker.is_none());
    }

    #[tokio::test]
    async fn attribution_carries_times_for_audio_spans() {
        let llm = ScriptedLlm::new()
            .with_response("transcript", verdict("from the meeting", 0.8, true));
        let extractor = AnswerExtractor::new(Arc::new(llm));

        let mut candidate = candidate(
            "c2",
            "transcript of the meeting about budgets",
            ChunkSpan::Audio {
                start_time_s: 12.5,
                end_time_s: 48.0,
                speaker_id: Some("spk_2".into()),
            },
        );
        candidate.content_type = ContentType::Audio;

        let answer = extractor
            .extract_answer("budget?", &candidate)
            .await
            .expect("extract");

        assert_eq!(answer.page_num, None);
        assert_eq!(answer.start_time, Some(12.5));
        assert_eq!(answer.end_time, Some(48.0));
        assert_eq!(answer.speaker.as_deref(), Some("spk_2"));
    }

    #[tokio::test]
    async fn low_confidence_and_no_answer_verdicts_are_dropped() {
        let llm = ScriptedLlm::new()
            .with_response("strong", verdict("a solid answer", 0.9, true))
            .with_response("borderline", verdict("barely", 0.1, true))
            .with_response("denied", verdict("", 0.9, false));
        let extractor = AnswerExtractor::new(Arc::new(llm));

        let candidates = vec![
            doc_candidate("c1", "strong evidence lives here"),
            doc_candidate("c2", "borderline mention of the topic"),
            doc_candidate("c3", "denied content with no answer"),
        ];

        let answers = extractor
            .extract_answers("q", &candidates)
            .await
            .expect("extract");

        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].chunk_id, "c1");
    }

    #[tokio::test]
    async fn per_candidate_failures_are_dropped_silently() {
        let llm = ScriptedLlm::new()
            .with_response("works", verdict("the answer", 0.7, true))
            .failing_on("broken");
        let extractor = AnswerExtractor::new(Arc::new(llm));

        let candidates = vec![
            doc_candidate("c1", "broken chunk the provider chokes on"),
            doc_candidate("c2", "works fine for extraction"),
        ];

        let answers = extractor
            .extract_answers("q", &candidates)
            .await
            .expect("extract");

        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].chunk_id, "c2");
    }

    #[tokio::test]
    async fn all_failures_surface_as_llm_failure() {
        let llm = ScriptedLlm::new().failing_on("chunk");
        let extractor = AnswerExtractor::new(Arc::new(llm));

        let candidates = vec![
            doc_candidate("c1", "chunk one"),
            doc_candidate("c2", "chunk two"),
        ];

        let err = extractor.extract_answers("q", &candidates).await.unwrap_err();
        assert_eq!(err.machine_tag(), "LLMFailure");
    }

    #[tokio::test]
    async fn empty_candidate_list_is_a_normal_empty_result() {
        let llm = ScriptedLlm::new();
        let extractor = AnswerExtractor::new(Arc::new(llm));

        let answers = extractor.extract_answers("q", &[]).await.expect("extract");
        assert!(answers.is_empty());
    }

    #[test]
    fn ranking_is_stable_and_descending() {
        let mut first = AnswerResult {
            answer: "first".into(),
            confidence: 0.5,
            has_answer: true,
            chunk_id: "a".into(),
            source_chunk: String::new(),
            source_title: String::new(),
            content_type: ContentType::Document,
            page_num: None,
            start_time: None,
            end_time: None,
            speaker: None,
        };
        let mut second = first.clone();
        second.answer = "second".into();
        second.chunk_id = "b".into();
        let mut strong = first.clone();
        strong.answer = "strong".into();
        strong.chunk_id = "c".into();
        strong.confidence = 0.9;

        first.confidence = 0.5;
        second.confidence = 0.5;

        let ranked = rank_answers_by_confidence(vec![first, second, strong]);

        assert_eq!(ranked[0].chunk_id, "c");
        // Equal confidence keeps insertion order (stable sort).
        assert_eq!(ranked[1].chunk_id, "a");
        assert_eq!(ranked[2].chunk_id, "b");
    }
}

use std::cmp::Ordering;

use common::storage::types::chunk::Chunk;
use common::storage::types::content_item::ContentType;

/// Score multiplier for chunks surfaced by both retrieval channels.
pub const DUAL_CHANNEL_BOOST: f32 = 1.2;

/// Closed stopword set used for the context-relevance weight.
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were", "be", "been", "have", "has", "had", "will", "would", "could", "should",
    "this", "that", "these", "those", "it", "its", "i", "you", "he", "she", "we", "they", "them",
    "their",
];

/// Which channel produced a candidate first. Vector hits take precedence
/// when a chunk shows up in both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalChannel {
    Vector,
    Fulltext,
}

impl RetrievalChannel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Fulltext => "fulltext",
        }
    }
}

/// A channel hit before fusion: the chunk, its source attribution and the
/// channel's normalized base score (vector: cosine similarity, lexical:
/// BM25 rank as-is).
#[derive(Debug, Clone)]
pub struct CandidateSeed {
    pub chunk: Chunk,
    pub title: String,
    pub content_type: ContentType,
    pub base: f32,
}

/// A fused candidate carrying the advanced relevance score.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub chunk: Chunk,
    pub title: String,
    pub content_type: ContentType,
    pub base: f32,
    pub source: RetrievalChannel,
    pub dual_channel: bool,
    pub score: f32,
}

/// Content-type weighting: denser, more intentional sources rank higher.
pub const fn content_type_weight(content_type: ContentType) -> f32 {
    match content_type {
        ContentType::Document => 1.0,
        ContentType::Email => 0.9,
        ContentType::Webpage => 0.8,
        ContentType::Audio => 0.7,
        ContentType::Video => 0.6,
        ContentType::Image => 0.5,
    }
}

/// Information density by chunk length in characters. Short chunks (like
/// brief transcript mentions) are penalized.
pub fn density_weight(chunk_text: &str) -> f32 {
    let length = chunk_text.chars().count();
    if length < 100 {
        0.5
    } else if length < 300 {
        0.7
    } else if length < 500 {
        0.9
    } else {
        1.0
    }
}

/// Share of meaningful words, scaled into [0.7, 1.0]. Meaningful means
/// longer than two characters after trimming punctuation, and not in the
/// stopword set.
pub fn context_weight(chunk_text: &str) -> f32 {
    let words: Vec<&str> = chunk_text.split_whitespace().collect();
    if words.is_empty() {
        return 0.5;
    }

    let meaningful = words
        .iter()
        .filter(|word| {
            let cleaned = word
                .trim_matches(|c: char| ".,!?;:()[]{}\"'".contains(c))
                .to_lowercase();
            cleaned.chars().count() > 2 && !STOPWORDS.contains(&cleaned.as_str())
        })
        .count();

    let ratio = meaningful as f32 / words.len() as f32;
    0.3f32.mul_add(ratio, 0.7)
}

/// Typical authority/reliability of a source kind.
pub const fn authority_weight(content_type: ContentType) -> f32 {
    match content_type {
        ContentType::Document => 1.0,
        ContentType::Email => 0.9,
        ContentType::Audio => 0.8,
        ContentType::Webpage => 0.7,
        ContentType::Video | ContentType::Image => 0.8,
    }
}

/// How quickly a source kind loses relevance over time.
pub const fn temporal_weight(content_type: ContentType) -> f32 {
    match content_type {
        ContentType::Document => 1.0,
        ContentType::Email => 0.95,
        ContentType::Webpage => 0.9,
        ContentType::Audio | ContentType::Video => 0.85,
        ContentType::Image => 0.95,
    }
}

/// Multi-factor relevance: the channel base score shaped by content type,
/// information density, context quality, authority and temporal decay.
pub fn advanced_relevance(base: f32, content_type: ContentType, chunk_text: &str) -> f32 {
    base * content_type_weight(content_type)
        * density_weight(chunk_text)
        * context_weight(chunk_text)
        * authority_weight(content_type)
        * temporal_weight(content_type)
}

/// Combines both channels into one deduplicated, descending-ranked list.
///
/// Pure function of its inputs: running it twice over the same seeds
/// yields the same ordering. Ties break on descending base score, then
/// ascending chunk id.
pub fn fuse_candidates(
    vector_seeds: Vec<CandidateSeed>,
    fulltext_seeds: Vec<CandidateSeed>,
) -> Vec<ScoredCandidate> {
    let mut fused: Vec<ScoredCandidate> = Vec::new();

    for seed in vector_seeds {
        if fused.iter().any(|c| c.chunk.id == seed.chunk.id) {
            continue;
        }
        let score = advanced_relevance(seed.base, seed.content_type, &seed.chunk.chunk_text);
        fused.push(ScoredCandidate {
            chunk: seed.chunk,
            title: seed.title,
            content_type: seed.content_type,
            base: seed.base,
            source: RetrievalChannel::Vector,
            dual_channel: false,
            score,
        });
    }

    for seed in fulltext_seeds {
        if let Some(existing) = fused.iter_mut().find(|c| c.chunk.id == seed.chunk.id) {
            // Appearing in both channels is a strong signal.
            existing.score *= DUAL_CHANNEL_BOOST;
            existing.dual_channel = true;
        } else {
            let score = advanced_relevance(seed.base, seed.content_type, &seed.chunk.chunk_text);
            fused.push(ScoredCandidate {
                chunk: seed.chunk,
                title: seed.title,
                content_type: seed.content_type,
                base: seed.base,
                source: RetrievalChannel::Fulltext,
                dual_channel: false,
                score,
            });
        }
    }

    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.base.partial_cmp(&a.base).unwrap_or(Ordering::Equal))
            .then_with(|| a.chunk.id.cmp(&b.chunk.id))
    });

    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::types::chunk::ChunkSpan;

    fn chunk_with_text(id: &str, text: &str) -> Chunk {
        let mut chunk = Chunk::new(
            "content-1".to_string(),
            text.to_string(),
            0,
            text.split_whitespace().count() as u32,
            ChunkSpan::Document {
                page: 1,
                start_char: 0,
                end_char: text.chars().count() as u64,
            },
            "user".to_string(),
        );
        chunk.id = id.to_string();
        chunk
    }

    fn seed(id: &str, text: &str, content_type: ContentType, base: f32) -> CandidateSeed {
        CandidateSeed {
            chunk: chunk_with_text(id, text),
            title: "title".to_string(),
            content_type,
            base,
        }
    }

    #[test]
    fn density_weight_follows_length_bands() {
        assert_eq!(density_weight(&"x".repeat(99)), 0.5);
        assert_eq!(density_weight(&"x".repeat(100)), 0.7);
        assert_eq!(density_weight(&"x".repeat(299)), 0.7);
        assert_eq!(density_weight(&"x".repeat(300)), 0.9);
        assert_eq!(density_weight(&"x".repeat(499)), 0.9);
        assert_eq!(density_weight(&"x".repeat(500)), 1.0);
    }

    #[test]
    fn context_weight_rewards_meaningful_words() {
        let noisy = context_weight("the a an and or but in on at to");
        assert!((noisy - 0.7).abs() < 1e-6, "all stopwords floor at 0.7");

        let dense = context_weight("quarterly budget ceiling projections finance");
        assert!((dense - 1.0).abs() < 1e-6, "all meaningful words reach 1.0");

        assert_eq!(context_weight(""), 0.5);
    }

    #[test]
    fn context_weight_trims_punctuation_before_lookup() {
        // "The," trims to a stopword; "budget." trims to a meaningful word.
        let weight = context_weight("The, budget.");
        assert!((weight - (0.7 + 0.3 * 0.5)).abs() < 1e-6);
    }

    #[test]
    fn advanced_relevance_is_the_product_of_weights() {
        let text = "meaningful budget figures ".repeat(30);
        let expected = 0.9
            * content_type_weight(ContentType::Audio)
            * density_weight(&text)
            * context_weight(&text)
            * authority_weight(ContentType::Audio)
            * temporal_weight(ContentType::Audio);
        let actual = advanced_relevance(0.9, ContentType::Audio, &text);
        assert!((actual - expected).abs() < 1e-6);
    }

    #[test]
    fn dual_channel_candidates_get_boosted() {
        let text = "quarterly budget ceiling discussion covering the figures in detail ";
        let vector = vec![seed("shared", &text.repeat(8), ContentType::Document, 0.8)];
        let fulltext = vec![
            seed("shared", &text.repeat(8), ContentType::Document, 0.6),
            seed("lexical-only", &text.repeat(8), ContentType::Document, 0.6),
        ];

        let fused = fuse_candidates(vector, fulltext);

        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].chunk.id, "shared");
        assert!(fused[0].dual_channel);
        assert_eq!(fused[0].source, RetrievalChannel::Vector);

        let single = advanced_relevance(0.8, ContentType::Document, &text.repeat(8));
        assert!((fused[0].score - single * DUAL_CHANNEL_BOOST).abs() < 1e-6);
    }

    #[test]
    fn fusion_is_idempotent() {
        let make_seeds = || {
            (
                vec![
                    seed("a", &"alpha beta gamma ".repeat(20), ContentType::Document, 0.9),
                    seed("b", &"delta epsilon zeta ".repeat(20), ContentType::Webpage, 0.7),
                ],
                vec![
                    seed("b", &"delta epsilon zeta ".repeat(20), ContentType::Webpage, 0.5),
                    seed("c", &"eta theta iota ".repeat(20), ContentType::Document, 0.4),
                ],
            )
        };

        let (v1, f1) = make_seeds();
        let (v2, f2) = make_seeds();

        let first: Vec<String> = fuse_candidates(v1, f1)
            .into_iter()
            .map(|c| c.chunk.id)
            .collect();
        let second: Vec<String> = fuse_candidates(v2, f2)
            .into_iter()
            .map(|c| c.chunk.id)
            .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn document_answer_is_not_outranked_by_verbose_audio() {
        // A terse document chunk and a verbose transcript chunk carrying
        // the same fact with the same channel base score.
        let document_text = "Paris is the capital of France, as the geography \
                             handbook states plainly in its opening chapter summary."
            .to_string();
        let audio_text = "so um we were talking and someone mentioned that Paris \
                          is the capital of France and then the conversation moved on "
            .repeat(10);

        let fused = fuse_candidates(
            vec![
                seed("doc", &document_text, ContentType::Document, 0.8),
                seed("audio", &audio_text, ContentType::Audio, 0.8),
            ],
            Vec::new(),
        );

        assert_eq!(fused[0].chunk.id, "doc");
        assert!(fused[0].score > fused[1].score);
    }

    #[test]
    fn ties_break_on_base_then_chunk_id() {
        // Identical text and type so the advanced score matches; the base
        // tiebreak then the id ordering decide.
        let text = "identical candidate text for deterministic ordering ".repeat(12);
        let fused = fuse_candidates(
            Vec::new(),
            vec![
                seed("b", &text, ContentType::Document, 0.5),
                seed("a", &text, ContentType::Document, 0.5),
            ],
        );

        assert_eq!(fused[0].chunk.id, "a");
        assert_eq!(fused[1].chunk.id, "b");
    }
}

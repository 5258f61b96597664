use std::collections::HashMap;

use serde::Serialize;
use surrealdb::sql::Thing;
use tracing::debug;

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{
            chunk::{Chunk, ChunkSearchResult, ChunkSpan},
            content_item::{ContentItem, ContentType},
            StoredObject,
        },
    },
    utils::embedding::EmbeddingProvider,
};

use crate::scoring::{self, CandidateSeed, ScoredCandidate};

/// One hybrid search hit as returned over the wire.
#[derive(Debug, Serialize)]
pub struct SearchResultEntry {
    pub chunk_id: String,
    pub text: String,
    pub content_title: String,
    pub content_type: ContentType,
    pub chunk_span: ChunkSpan,
    pub relevance: f32,
    pub source: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub results: Vec<SearchResultEntry>,
    pub strategy: &'static str,
    pub total: usize,
}

/// Two-channel retrieval: top `take` by cosine similarity and top `take`
/// by BM25 rank, fused into one deduplicated candidate list ordered by the
/// advanced relevance score.
pub async fn collect_candidates(
    db: &SurrealDbClient,
    embedder: &EmbeddingProvider,
    user_id: &str,
    query: &str,
    take: usize,
) -> Result<Vec<ScoredCandidate>, AppError> {
    let query_embedding = embedder.embed(query).await?;

    let vector_hits = Chunk::vector_search(
        take,
        query_embedding,
        embedder.model_tag(),
        db,
        user_id,
    )
    .await?;
    let fulltext_hits = Chunk::fts_search(take, query, db, user_id).await?;

    debug!(
        vector = vector_hits.len(),
        fulltext = fulltext_hits.len(),
        "collected channel hits"
    );

    let items = hydrate_content_items(db, user_id, &vector_hits, &fulltext_hits).await?;

    let vector_seeds = seeds_from_hits(vector_hits, &items);
    let fulltext_seeds = seeds_from_hits(fulltext_hits, &items);

    let mut fused = scoring::fuse_candidates(vector_seeds, fulltext_seeds);
    fused.truncate(take);
    Ok(fused)
}

/// Hybrid search surface: fused candidates rendered as wire results.
pub async fn search(
    db: &SurrealDbClient,
    embedder: &EmbeddingProvider,
    user_id: &str,
    query: &str,
    limit: usize,
) -> Result<SearchResults, AppError> {
    let candidates = collect_candidates(db, embedder, user_id, query, limit).await?;

    let results: Vec<SearchResultEntry> = candidates
        .into_iter()
        .map(|candidate| SearchResultEntry {
            chunk_id: candidate.chunk.id.clone(),
            text: candidate.chunk.chunk_text,
            content_title: candidate.title,
            content_type: candidate.content_type,
            chunk_span: candidate.chunk.chunk_span,
            relevance: candidate.score,
            source: candidate.source.as_str(),
        })
        .collect();

    Ok(SearchResults {
        strategy: "hybrid",
        total: results.len(),
        results,
    })
}

/// Batch-fetches the content items owning the hit chunks, scoped to the
/// requesting user. Hits whose owner is missing are dropped later.
async fn hydrate_content_items(
    db: &SurrealDbClient,
    user_id: &str,
    vector_hits: &[ChunkSearchResult],
    fulltext_hits: &[ChunkSearchResult],
) -> Result<HashMap<String, ContentItem>, AppError> {
    let mut ids: Vec<String> = vector_hits
        .iter()
        .chain(fulltext_hits.iter())
        .map(|hit| hit.chunk.content_item_id.clone())
        .collect();
    ids.sort();
    ids.dedup();

    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let things: Vec<Thing> = ids
        .iter()
        .map(|id| Thing::from((ContentItem::table_name(), id.as_str())))
        .collect();

    let mut response = db
        .query("SELECT * FROM type::table($table) WHERE id IN $things AND user_id = $user_id")
        .bind(("table", ContentItem::table_name()))
        .bind(("things", things))
        .bind(("user_id", user_id.to_owned()))
        .await?;

    let items: Vec<ContentItem> = response.take(0)?;

    Ok(items
        .into_iter()
        .map(|item| (item.id.clone(), item))
        .collect())
}

fn seeds_from_hits(
    hits: Vec<ChunkSearchResult>,
    items: &HashMap<String, ContentItem>,
) -> Vec<CandidateSeed> {
    hits.into_iter()
        .filter_map(|hit| {
            let item = items.get(&hit.chunk.content_item_id)?;
            Some(CandidateSeed {
                chunk: hit.chunk,
                title: item.title.clone(),
                content_type: item.content_type,
                base: hit.score,
            })
        })
        .collect()
}

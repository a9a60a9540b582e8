use context_core::{
    allocate, AssembledContext, Budget, Chunk, ChunkUse, EmbedderId, EmbeddingMatrix, Error,
    IndexArtifact, Result, Tier,
};
use context_embed::{CancellationListener, EmbeddingGateway};
use context_index::bm25::{Bm25Index, Bm25Params};
use context_index::{chunker, trimmer, vector};

use crate::config::EngineConfig;

/// Documents at or below this size run chunking/ranking/search inline;
/// above it they run inside `tokio::task::spawn_blocking` so a slow pass
/// doesn't stall the async runtime's worker threads (spec §5: "offload to
/// a worker pool if they exceed ~50 ms").
const OFFLOAD_TOKEN_THRESHOLD: u32 = context_core::types::defaults::TIER2_MAX_TOKENS;

/// Same offload threshold, expressed in chunk count for call sites that
/// only have the already-chunked text on hand (roughly one chunk per
/// `CHUNK_TARGET_TOKENS`, so this tracks `OFFLOAD_TOKEN_THRESHOLD`).
const OFFLOAD_CHUNK_COUNT_THRESHOLD: usize =
    (OFFLOAD_TOKEN_THRESHOLD / context_core::types::defaults::CHUNK_TARGET_TOKENS) as usize;

/// Runs `f` inline when `large` is false, otherwise on the blocking thread
/// pool. `f`'s panics surface as `Error::WorkerPanicked` rather than
/// poisoning the caller.
async fn maybe_offload<F, T>(large: bool, f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    if large {
        tokio::task::spawn_blocking(f)
            .await
            .map_err(|e| Error::WorkerPanicked(e.to_string()))
    } else {
        Ok(f())
    }
}

/// Builds the per-document index artifact (chunks, BM25 statistics, and a
/// best-effort embedding matrix) together with the durable `Chunk` rows for
/// the metadata store, so the canonical text is only chunked once.
/// Embedder failures never abort this — they degrade a tier-4 document to
/// BM25-only at query time (spec §7).
pub async fn build_index(
    doc_id: context_core::DocumentId,
    text: &str,
    config: &EngineConfig,
    gateway: &EmbeddingGateway,
    cancel: &mut CancellationListener,
) -> Result<(IndexArtifact, Vec<Chunk>)> {
    let chunker_config = config.chunker_config();
    let token_count = context_tokenize::count(text);
    let large = token_count > OFFLOAD_TOKEN_THRESHOLD;

    let text_owned = text.to_string();
    let spans = maybe_offload(large, move || chunker::chunk(&text_owned, &chunker_config)).await?;
    let chunk_texts: Vec<String> = spans.iter().map(|s| s.text.clone()).collect();
    let chunks = chunks_for_document(doc_id, &spans);

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let artifact = index_chunk_texts(doc_id, chunk_texts, gateway, cancel).await?;
    Ok((artifact, chunks))
}

/// Rebuilds an index artifact for a document whose chunks are already
/// durable in the metadata store, without re-chunking the canonical text
/// (spec §4.11: a cache miss rebuilds "from chunks, which are durable in
/// the metadata store"). `chunks` need not already be sorted by index.
pub async fn rebuild_index_from_chunks(
    doc_id: context_core::DocumentId,
    chunks: &[Chunk],
    gateway: &EmbeddingGateway,
    cancel: &mut CancellationListener,
) -> Result<IndexArtifact> {
    let mut ordered: Vec<&Chunk> = chunks.iter().collect();
    ordered.sort_by_key(|c| c.index);
    let chunk_texts: Vec<String> = ordered.into_iter().map(|c| c.text.clone()).collect();
    index_chunk_texts(doc_id, chunk_texts, gateway, cancel).await
}

/// Shared tail of `build_index`/`rebuild_index_from_chunks`: BM25
/// statistics plus a best-effort embedding matrix over already-chunked
/// text.
async fn index_chunk_texts(
    doc_id: context_core::DocumentId,
    chunk_texts: Vec<String>,
    gateway: &EmbeddingGateway,
    cancel: &mut CancellationListener,
) -> Result<IndexArtifact> {
    let large = chunk_texts.len() > OFFLOAD_CHUNK_COUNT_THRESHOLD;

    let chunk_texts_for_bm25 = chunk_texts.clone();
    let bm25 = maybe_offload(large, move || {
        Bm25Index::build(&chunk_texts_for_bm25, Bm25Params::default())
            .stats()
            .clone()
    })
    .await?;

    let embeddings = match gateway.embed(&chunk_texts, cancel).await {
        Ok((vectors, embedder)) if !vectors.is_empty() => {
            let dimension = embedder.dimension();
            let data: Vec<f32> = vectors.into_iter().flatten().collect();
            Some(EmbeddingMatrix {
                embedder,
                dimension,
                chunk_count: chunk_texts.len(),
                data,
            })
        }
        Ok(_) => None,
        Err(Error::Cancelled) => return Err(Error::Cancelled),
        Err(e) => {
            tracing::warn!(error = %e, "embedding failed at build time, degrading to BM25-only");
            None
        }
    };

    Ok(IndexArtifact {
        doc_id,
        chunk_texts,
        bm25,
        embeddings,
    })
}

/// Tier 1: emit canonical text verbatim (spec §4.10). Uses the Budget
/// Allocator to bound output even here, in the rare case a small context
/// window makes a tier-1 document exceed its own document allocation.
pub fn assemble_tier1(text: &str, budget: &Budget) -> AssembledContext {
    let requested = context_tokenize::count(text);
    let allocation = allocate(budget, requested);

    let (text, token_count, notes) = if allocation.truncated {
        let sliced = context_tokenize::slice(text, allocation.granted);
        (
            sliced,
            allocation.granted,
            "Full document injected directly; truncated to fit the document allocation."
                .to_string(),
        )
    } else {
        (text.to_string(), requested, "Full document injected directly.".to_string())
    };

    AssembledContext {
        text,
        token_count,
        chunks_used: Vec::new(),
        strategy_notes: notes,
        budget: *budget,
        tier: Tier::One,
    }
}

/// Tier 2: trim, then inject directly; if the trimmed text still exceeds
/// the document allocation, degrade to tier-3 behavior over the trimmed
/// text (spec §4.10).
pub async fn assemble_tier2(
    text: &str,
    query: &str,
    budget: &Budget,
    top_k: usize,
    tier1_threshold: u32,
    chunker_config: &context_index::ChunkerConfig,
) -> Result<AssembledContext> {
    let trimmed = trimmer::trim(text, &trimmer::TrimmerConfig::default());
    let trimmed_tokens = context_tokenize::count(&trimmed);

    if trimmed_tokens <= tier1_threshold || trimmed_tokens <= budget.document {
        let mut ctx = assemble_tier1(&trimmed, budget);
        ctx.tier = Tier::Two;
        ctx.strategy_notes = "Boilerplate trimmed, then injected directly.".to_string();
        return Ok(ctx);
    }

    let mut ctx = assemble_ephemeral_tier3(&trimmed, query, budget, top_k, chunker_config).await?;
    ctx.tier = Tier::Two;
    ctx.strategy_notes = format!(
        "Trimmed text ({trimmed_tokens} tokens) still exceeds the document allocation; fell back to chunked ranking. {}",
        ctx.strategy_notes
    );
    Ok(ctx)
}

/// Builds a transient (uncached) chunk set over already-trimmed text and
/// applies tier-3 ranking. Tier-2 documents never persist chunks (spec
/// §3), so this index exists only for the current query.
async fn assemble_ephemeral_tier3(
    trimmed: &str,
    query: &str,
    budget: &Budget,
    top_k: usize,
    chunker_config: &context_index::ChunkerConfig,
) -> Result<AssembledContext> {
    let token_count = context_tokenize::count(trimmed);
    let large = token_count > OFFLOAD_TOKEN_THRESHOLD;

    let trimmed_owned = trimmed.to_string();
    let chunker_config = *chunker_config;
    let spans =
        maybe_offload(large, move || chunker::chunk(&trimmed_owned, &chunker_config)).await?;
    let chunk_texts: Vec<String> = spans.iter().map(|s| s.text.clone()).collect();

    let chunk_texts_for_bm25 = chunk_texts.clone();
    let query_owned = query.to_string();
    let ranked = maybe_offload(large, move || {
        Bm25Index::build(&chunk_texts_for_bm25, Bm25Params::default()).rank(&query_owned)
    })
    .await?;

    let (chunks_used, text) = greedy_fill(&ranked, &chunk_texts, budget.document, top_k);
    let token_count = context_tokenize::count(&text);

    Ok(AssembledContext {
        text,
        token_count,
        chunks_used,
        strategy_notes: "Ranked chunks by lexical relevance.".to_string(),
        budget: *budget,
        tier: Tier::Three,
    })
}

/// Tier 3: rank persisted chunks by BM25 and greedily fill the document
/// allocation (spec §4.10).
pub async fn assemble_tier3(
    query: &str,
    budget: &Budget,
    artifact: &IndexArtifact,
    top_k: usize,
) -> Result<AssembledContext> {
    let large = artifact.chunk_texts.len() > OFFLOAD_CHUNK_COUNT_THRESHOLD;
    let bm25_stats = artifact.bm25.clone();
    let query_owned = query.to_string();
    let ranked = maybe_offload(large, move || {
        Bm25Index::from_stats(bm25_stats, Bm25Params::default()).rank(&query_owned)
    })
    .await?;
    let (chunks_used, text) = greedy_fill(&ranked, &artifact.chunk_texts, budget.document, top_k);
    let token_count = context_tokenize::count(&text);

    Ok(AssembledContext {
        text,
        token_count,
        chunks_used,
        strategy_notes: "Ranked chunks by lexical relevance.".to_string(),
        budget: *budget,
        tier: Tier::Three,
    })
}

/// Tier 4: embed the query with the same embedder recorded in the
/// artifact, shortlist by cosine similarity, then greedily fill among that
/// shortlist using tier-3's fill rule. Falls back to BM25-only if
/// embeddings are unavailable for this document or the recorded embedder
/// cannot be reached at query time (spec §4.10, §9).
pub async fn assemble_tier4(
    query: &str,
    budget: &Budget,
    artifact: &IndexArtifact,
    top_k: usize,
    gateway: &EmbeddingGateway,
    cancel: &mut CancellationListener,
) -> Result<AssembledContext> {
    let Some(matrix) = &artifact.embeddings else {
        let mut ctx = assemble_tier3(query, budget, artifact, top_k).await?;
        ctx.tier = Tier::Four;
        ctx.strategy_notes = format!(
            "Embeddings unavailable for this document; fell back to BM25. {}",
            ctx.strategy_notes
        );
        return Ok(ctx);
    };

    let query_vector = match gateway
        .embed_with(matrix.embedder, &[query.to_string()], cancel)
        .await
    {
        Ok(vectors) => vectors.into_iter().next(),
        Err(Error::Cancelled) => return Err(Error::Cancelled),
        Err(e) => {
            tracing::warn!(error = %e, "recorded embedder unavailable at query time");
            None
        }
    };

    let Some(query_vector) = query_vector else {
        let mut ctx = assemble_tier3(query, budget, artifact, top_k).await?;
        ctx.tier = Tier::Four;
        ctx.strategy_notes = format!(
            "Recorded embedder unavailable at query time; fell back to BM25. {}",
            ctx.strategy_notes
        );
        return Ok(ctx);
    };

    let large = matrix.chunk_count > OFFLOAD_CHUNK_COUNT_THRESHOLD;
    let index = vector::VectorIndex::new(matrix.clone());
    let shortlist_k = top_k.saturating_mul(3);
    let shortlist =
        maybe_offload(large, move || index.search(&query_vector, shortlist_k)).await??;

    let (chunks_used, text) = greedy_fill(&shortlist, &artifact.chunk_texts, budget.document, top_k);
    let token_count = context_tokenize::count(&text);

    let embedder_label = match matrix.embedder {
        EmbedderId::Primary => "primary",
        EmbedderId::Fallback => "fallback",
    };
    Ok(AssembledContext {
        text,
        token_count,
        chunks_used,
        strategy_notes: format!("Retrieved by embedding similarity (embedder: {embedder_label})."),
        budget: *budget,
        tier: Tier::Four,
    })
}

/// Shared greedy-fill rule for tiers 3 and 4: accept ranked candidates in
/// descending-score order while they fit the remaining budget, up to
/// `top_k`; assemble the accepted set in ascending chunk-index (reading)
/// order (spec §4.10).
fn greedy_fill(
    ranked: &[(u32, f64)],
    chunk_texts: &[String],
    budget_tokens: u32,
    top_k: usize,
) -> (Vec<ChunkUse>, String) {
    let mut accepted: Vec<(u32, f64, u32)> = Vec::new();
    let mut running = 0u32;

    for &(idx, score) in ranked {
        if accepted.len() >= top_k {
            break;
        }
        let Some(chunk_text) = chunk_texts.get(idx as usize) else {
            continue;
        };
        let tokens = context_tokenize::count(chunk_text);
        if running.saturating_add(tokens) > budget_tokens {
            continue;
        }
        running += tokens;
        accepted.push((idx, score, tokens));
    }

    accepted.sort_by_key(|(idx, _, _)| *idx);

    let text = accepted
        .iter()
        .map(|(idx, _, _)| chunk_texts[*idx as usize].as_str())
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    let chunks_used = accepted
        .into_iter()
        .map(|(index, score, tokens)| ChunkUse {
            index,
            tokens,
            score,
        })
        .collect();

    (chunks_used, text)
}

/// Materializes a `Chunk` list (for persistence) from chunker output.
pub fn chunks_for_document(
    doc_id: context_core::DocumentId,
    spans: &[chunker::ChunkSpan],
) -> Vec<Chunk> {
    spans
        .iter()
        .enumerate()
        .map(|(i, s)| Chunk {
            doc_id,
            index: i as u32,
            token_count: s.token_count,
            text: s.text.clone(),
            section: None,
        })
        .collect()
}

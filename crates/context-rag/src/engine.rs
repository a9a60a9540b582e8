use std::sync::Arc;

use chrono::Utc;
use context_core::{
    AssembledContext, Budget, Chunk, Document, DocumentId, DocumentStatus, Error, FormatAttributes,
    Result, Tier, TierInfo,
};
use context_embed::{CancellationListener, EmbeddingGateway};
use context_store::{IndexCache, MetadataStore};
use tracing::instrument;

use crate::assembler;
use crate::config::EngineConfig;
use crate::single_flight::SingleFlight;

/// Upload-response shape (spec §6): everything the caller needs to know
/// about a document immediately after ingestion, and again on lookup.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DocumentSummary {
    pub doc_id: DocumentId,
    pub filename: String,
    pub file_size: u64,
    pub mime_type: Option<String>,
    pub token_count: u32,
    pub tier: TierInfo,
    pub budget: Budget,
    pub page_count: Option<u32>,
    pub row_count: Option<u32>,
    pub created_at: chrono::DateTime<Utc>,
}

impl DocumentSummary {
    fn from_document(doc: &Document, budget: Budget) -> Self {
        DocumentSummary {
            doc_id: doc.id,
            filename: doc.filename.clone(),
            file_size: doc.byte_size,
            mime_type: doc.mime_type.clone(),
            token_count: doc.token_count,
            tier: doc.tier.info(),
            budget,
            page_count: doc.attributes.page_count,
            row_count: doc.attributes.row_count,
            created_at: doc.created_at,
        }
    }
}

/// Query-response shape (spec §6).
#[derive(Debug, Clone, serde::Serialize)]
pub struct QueryResult {
    pub doc_id: DocumentId,
    pub query: String,
    pub tier: u8,
    pub assembled_context: String,
    pub token_count: u32,
    pub chunks_used: Vec<context_core::ChunkUse>,
    pub strategy_notes: String,
    pub budget: Budget,
}

impl From<(DocumentId, String, AssembledContext)> for QueryResult {
    fn from((doc_id, query, ctx): (DocumentId, String, AssembledContext)) -> Self {
        QueryResult {
            doc_id,
            query,
            tier: ctx.tier as u8,
            assembled_context: ctx.text,
            token_count: ctx.token_count,
            chunks_used: ctx.chunks_used,
            strategy_notes: ctx.strategy_notes,
            budget: ctx.budget,
        }
    }
}

/// Top-level facade wiring loader, tokenizer, index, embedding gateway and
/// store together (spec §2). Every public method corresponds to one HTTP
/// route named in spec §6.
pub struct DocumentEngine {
    config: EngineConfig,
    store: Arc<dyn MetadataStore>,
    cache: Arc<dyn IndexCache>,
    gateway: Arc<EmbeddingGateway>,
    single_flight: Arc<SingleFlight>,
}

impl DocumentEngine {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn MetadataStore>,
        cache: Arc<dyn IndexCache>,
        gateway: Arc<EmbeddingGateway>,
    ) -> Self {
        DocumentEngine {
            config,
            store,
            cache,
            gateway,
            single_flight: Arc::new(SingleFlight::new()),
        }
    }

    /// Drives a document through `uploading → loaded → tokenized →
    /// classified → (indexed |) → ready`, persisting a placeholder record
    /// up front so a failure at any pre-`ready` step leaves a `failed`
    /// record behind instead of vanishing silently (spec.md §4.12).
    #[instrument(skip(self, bytes, cancel), fields(filename = %filename))]
    pub async fn upload(
        &self,
        filename: &str,
        mime: Option<&str>,
        bytes: &[u8],
        cancel: &mut CancellationListener,
    ) -> Result<DocumentSummary> {
        let doc_id = DocumentId::new();
        let mut document = Document {
            id: doc_id,
            filename: filename.to_string(),
            byte_size: bytes.len() as u64,
            mime_type: mime.map(|s| s.to_string()),
            token_count: 0,
            tier: Tier::One,
            attributes: FormatAttributes::default(),
            status: DocumentStatus::Uploading,
            created_at: Utc::now(),
        };
        self.store
            .put_document(document.clone(), String::new(), Vec::new())
            .await?;

        match self.ingest(&mut document, mime, filename, bytes, cancel).await {
            Ok((text, chunks)) => {
                document.status = DocumentStatus::Ready;
                self.store
                    .put_document(document.clone(), text, chunks)
                    .await?;
                tracing::info!(
                    doc_id = %doc_id,
                    tier = ?document.tier,
                    token_count = document.token_count,
                    "document ready"
                );
                Ok(DocumentSummary::from_document(&document, self.config.budget()))
            }
            Err(Error::Cancelled) => {
                // A withdrawn request owes the caller no record at all.
                let _ = self.store.delete_document(doc_id).await;
                Err(Error::Cancelled)
            }
            Err(e) => {
                document.status = DocumentStatus::Failed(e.to_string());
                let _ = self
                    .store
                    .put_document(document.clone(), String::new(), Vec::new())
                    .await;
                Err(e)
            }
        }
    }

    /// Runs decode → tokenize → classify → (index), advancing
    /// `document.status` at each step. Returns the canonical text and, for
    /// tier ≥ 3 documents, their persisted chunks.
    async fn ingest(
        &self,
        document: &mut Document,
        mime: Option<&str>,
        filename: &str,
        bytes: &[u8],
        cancel: &mut CancellationListener,
    ) -> Result<(String, Vec<Chunk>)> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let loaded = context_loader::load_upload(
            mime,
            filename,
            bytes,
            self.config.max_file_size_bytes(),
        )?;
        document.attributes = loaded.attributes;
        document.status = DocumentStatus::Loaded;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        document.token_count = context_tokenize::count(&loaded.text);
        document.status = DocumentStatus::Tokenized;

        let (tau1, tau2, tau3) = self.config.tier_thresholds();
        document.tier = Tier::classify(document.token_count, tau1, tau2, tau3);
        document.status = DocumentStatus::Classified;

        let chunks = if document.tier >= Tier::Three {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let (artifact, chunks) = assembler::build_index(
                document.id,
                &loaded.text,
                &self.config,
                &self.gateway,
                cancel,
            )
            .await?;
            self.cache.put(document.id, artifact).await;
            document.status = DocumentStatus::Indexed;
            chunks
        } else {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            Vec::new()
        };

        Ok((loaded.text, chunks))
    }

    pub async fn get_document(&self, id: DocumentId) -> Result<DocumentSummary> {
        let doc = self
            .store
            .get_document(id)
            .await?
            .ok_or(Error::DocumentNotFound(id))?;
        Ok(DocumentSummary::from_document(&doc, self.config.budget()))
    }

    pub async fn list_documents(&self, limit: usize) -> Result<Vec<DocumentSummary>> {
        let docs = self.store.list_documents(limit).await?;
        let budget = self.config.budget();
        Ok(docs
            .iter()
            .map(|d| DocumentSummary::from_document(d, budget))
            .collect())
    }

    #[instrument(skip(self, cancel), fields(doc_id = %doc_id))]
    pub async fn query(
        &self,
        doc_id: DocumentId,
        query: &str,
        top_k: Option<usize>,
        cancel: &mut CancellationListener,
    ) -> Result<QueryResult> {
        if query.trim().is_empty() {
            return Err(Error::EmptyQuery);
        }

        let document = self
            .store
            .get_document(doc_id)
            .await?
            .ok_or(Error::DocumentNotFound(doc_id))?;

        if !document.status.is_queryable() {
            return Err(Error::DocumentNotReady {
                id: doc_id,
                status: format!("{:?}", document.status),
            });
        }

        let top_k = top_k.unwrap_or(self.config.rag_top_k);
        let budget = self.config.budget();

        let ctx = match document.tier {
            Tier::One => assembler::assemble_tier1(
                &self
                    .store
                    .get_text(doc_id)
                    .await?
                    .ok_or(Error::DocumentNotFound(doc_id))?,
                &budget,
            ),
            Tier::Two => {
                assembler::assemble_tier2(
                    &self
                        .store
                        .get_text(doc_id)
                        .await?
                        .ok_or(Error::DocumentNotFound(doc_id))?,
                    query,
                    &budget,
                    top_k,
                    self.config.tier1_max_tokens,
                    &self.config.chunker_config(),
                )
                .await?
            }
            Tier::Three | Tier::Four => {
                let artifact = self.artifact_for(&document, cancel).await?;
                if document.tier == Tier::Three {
                    assembler::assemble_tier3(query, &budget, &artifact, top_k).await?
                } else {
                    assembler::assemble_tier4(
                        query,
                        &budget,
                        &artifact,
                        top_k,
                        &self.gateway,
                        cancel,
                    )
                    .await?
                }
            }
        };

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        Ok(QueryResult::from((doc_id, query.to_string(), ctx)))
    }

    /// Loads the cached artifact or rebuilds it once via the single-flight
    /// coordinator (spec §4.10, §9 — property 9). A rebuild reuses the
    /// document's durable chunks from the metadata store rather than
    /// re-chunking the canonical text (spec §4.11).
    async fn artifact_for(
        &self,
        document: &Document,
        cancel: &mut CancellationListener,
    ) -> Result<context_core::IndexArtifact> {
        if let Some(artifact) = self.cache.get(document.id).await {
            return Ok(artifact);
        }

        let gateway = self.gateway.clone();
        let doc_id = document.id;
        let persisted_chunks = self.store.get_chunks(doc_id).await?;
        let mut cancel_for_build = cancel.clone();

        let artifact = if !persisted_chunks.is_empty() {
            self.single_flight
                .get_or_build(doc_id, || async move {
                    assembler::rebuild_index_from_chunks(
                        doc_id,
                        &persisted_chunks,
                        &gateway,
                        &mut cancel_for_build,
                    )
                    .await
                })
                .await?
        } else {
            // No durable chunks (only arises for a document whose upload
            // pipeline never reached tier >= 3); fall back to a full build
            // from the canonical text.
            let config = self.config.clone();
            let text = self
                .store
                .get_text(doc_id)
                .await?
                .ok_or(Error::DocumentNotFound(doc_id))?;
            self.single_flight
                .get_or_build(doc_id, || async move {
                    let (artifact, _chunks) = assembler::build_index(
                        doc_id,
                        &text,
                        &config,
                        &gateway,
                        &mut cancel_for_build,
                    )
                    .await?;
                    Ok(artifact)
                })
                .await?
        };

        self.cache.put(doc_id, (*artifact).clone()).await;
        Ok((*artifact).clone())
    }

    pub async fn health(&self) -> serde_json::Value {
        serde_json::json!({ "status": "ok" })
    }

    /// Deletion cascades: document row, chunks, cached artifact (spec §3).
    pub async fn delete_document(&self, id: DocumentId) -> Result<()> {
        self.store.delete_document(id).await?;
        self.cache.invalidate(id).await;
        Ok(())
    }
}

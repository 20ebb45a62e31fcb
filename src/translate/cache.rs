//! Lookup-else-populate cache of post translations.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use super::{
    materially_differs, source_hash, KeyedLocks, TranslatedText, TranslationEngine, VERBATIM_LANG,
};
use crate::db::{self, Database, Post, Translation};

/// Translation cache keyed by (post, language).
///
/// Reads return a cached row when its `source_hash` still matches the post's
/// current text. Otherwise the engine is called once per key per process and
/// a usable result is upserted. Engine failures degrade to the source text;
/// only database errors are returned.
#[derive(Clone)]
pub struct TranslationCache {
    db: Database,
    engine: Arc<dyn TranslationEngine>,
    locks: Arc<KeyedLocks>,
    source_lang: String,
}

impl TranslationCache {
    #[must_use]
    pub fn new(db: Database, engine: Arc<dyn TranslationEngine>, source_lang: &str) -> Self {
        Self {
            db,
            engine,
            locks: Arc::new(KeyedLocks::new()),
            source_lang: source_lang.to_string(),
        }
    }

    #[must_use]
    pub fn source_lang(&self) -> &str {
        &self.source_lang
    }

    /// Text to show for `post` in `lang`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the database fails.
    pub async fn resolve(&self, post: &Post, lang: &str) -> Result<TranslatedText> {
        if self.is_verbatim(post, lang) {
            return Ok(TranslatedText::untranslated(&post.text_src, &self.source_lang));
        }

        let hash = source_hash(&post.text_src);
        if let Some(hit) = self.fresh_entry(post.id, lang, &hash).await? {
            return Ok(hit);
        }

        let _guard = self.locks.lock(&cache_key(post.id, lang)).await;

        // Another request may have filled the entry while we waited.
        if let Some(hit) = self.fresh_entry(post.id, lang, &hash).await? {
            debug!(post_id = post.id, lang, "Translation filled by concurrent request");
            return Ok(hit);
        }

        match self.call_engine(post, lang, &hash).await? {
            Some(entry) => Ok(TranslatedText {
                text: entry.text_tr,
                lang_out: entry.lang,
                provider: entry.provider,
            }),
            None => Ok(TranslatedText::untranslated(&post.text_src, &self.source_lang)),
        }
    }

    /// Call the engine regardless of what is cached and store a usable result.
    ///
    /// Returns `None` when the engine fell back or `lang` is served verbatim.
    ///
    /// # Errors
    ///
    /// Returns an error only if the database fails.
    pub async fn retranslate(&self, post: &Post, lang: &str) -> Result<Option<Translation>> {
        if self.is_verbatim(post, lang) {
            return Ok(None);
        }

        let _guard = self.locks.lock(&cache_key(post.id, lang)).await;
        let entry = self
            .call_engine(post, lang, &source_hash(&post.text_src))
            .await?;
        if entry.is_some() {
            info!(post_id = post.id, lang, "Translation regenerated");
        }
        Ok(entry)
    }

    /// English and the configured source language are never sent to the engine.
    fn is_verbatim(&self, post: &Post, lang: &str) -> bool {
        lang == VERBATIM_LANG || lang == self.source_lang || post.text_src.trim().is_empty()
    }

    async fn fresh_entry(
        &self,
        post_id: i64,
        lang: &str,
        hash: &str,
    ) -> Result<Option<TranslatedText>> {
        let Some(row) = db::get_translation(self.db.pool(), post_id, lang).await? else {
            return Ok(None);
        };

        // Rows without a hash predate staleness tracking and are trusted.
        if row.source_hash.as_deref().is_some_and(|h| h != hash) {
            debug!(post_id, lang, "Cached translation is stale");
            return Ok(None);
        }

        Ok(Some(TranslatedText {
            text: row.text_tr,
            lang_out: row.lang,
            provider: row.provider,
        }))
    }

    async fn call_engine(
        &self,
        post: &Post,
        lang: &str,
        hash: &str,
    ) -> Result<Option<Translation>> {
        let translated = match self.engine.translate(&post.text_src, lang).await {
            Ok(Some(t)) if materially_differs(&post.text_src, &t) => t,
            Ok(_) => {
                debug!(post_id = post.id, lang, "Engine returned no usable translation");
                return Ok(None);
            }
            Err(e) => {
                warn!(
                    post_id = post.id,
                    lang,
                    error = %e,
                    "Translation failed, serving source text"
                );
                return Ok(None);
            }
        };

        let entry = db::upsert_translation(
            self.db.pool(),
            post.id,
            lang,
            &translated,
            &self.engine.provider_tag(),
            hash,
        )
        .await?;

        Ok(Some(entry))
    }
}

fn cache_key(post_id: i64, lang: &str) -> String {
    format!("{post_id}:{lang}")
}

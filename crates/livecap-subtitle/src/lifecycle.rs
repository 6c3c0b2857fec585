//! Subtitle lifecycle: the ordered history of committed segments, the
//! transient preview, and translation reconciliation.
//!
//! Translation dispatches are the only concurrent work in the system.
//! Each one is an independent task; completions arrive in arbitrary order
//! on a channel and are reconciled strictly by segment id, never by
//! position.

use std::sync::Arc;

use livecap_foundation::SharedClock;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::types::{
    SegmentId, SubtitleSegment, TRANSLATION_FAILED, TRANSLATION_PENDING,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslateError {
    #[error("Translation service unavailable: {0}")]
    Unavailable(String),

    #[error("Translation rejected: {0}")]
    Rejected(String),
}

/// External translation engine boundary. Fails independently per call.
#[async_trait::async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String, TranslateError>;
}

/// Identity translator: leaves the text as-is. The default when no real
/// translation engine is configured.
pub struct PassthroughTranslator;

#[async_trait::async_trait]
impl Translator for PassthroughTranslator {
    async fn translate(&self, text: &str) -> Result<String, TranslateError> {
        Ok(text.to_string())
    }
}

/// A resolved translation dispatch, keyed by segment identity.
#[derive(Debug, Clone)]
pub struct TranslationUpdate {
    pub id: SegmentId,
    pub result: Result<String, TranslateError>,
}

pub struct SubtitleLifecycle {
    clock: SharedClock,
    translator: Arc<dyn Translator>,
    update_tx: mpsc::Sender<TranslationUpdate>,
    history: Vec<SubtitleSegment>,
    preview: Option<SubtitleSegment>,
    next_id: SegmentId,
    translation_failures: u64,
}

impl SubtitleLifecycle {
    /// `update_tx` feeds completed dispatches back to the orchestration
    /// loop, which calls `apply_translation` on its own thread.
    pub fn new(
        translator: Arc<dyn Translator>,
        clock: SharedClock,
        update_tx: mpsc::Sender<TranslationUpdate>,
    ) -> Self {
        Self {
            clock,
            translator,
            update_tx,
            history: Vec::new(),
            preview: None,
            next_id: 1,
            translation_failures: 0,
        }
    }

    /// Append a committed segment and dispatch its translation. History is
    /// append-only and chronological; the dispatch runs concurrently and
    /// does not block anything here.
    pub fn commit(&mut self, text: String) -> SegmentId {
        let id = self.next_id;
        self.next_id += 1;

        self.history.push(SubtitleSegment {
            id,
            original_text: text.clone(),
            translated_text: TRANSLATION_PENDING.to_string(),
            timestamp: self.clock.now(),
            is_final: true,
        });
        debug!(target: "subtitle", id, text = %text, "segment committed");

        let translator = Arc::clone(&self.translator);
        let tx = self.update_tx.clone();
        tokio::spawn(async move {
            let result = translator.translate(&text).await;
            // Receiver gone means the session is tearing down; the result
            // is discarded, not an error.
            let _ = tx.send(TranslationUpdate { id, result }).await;
        });

        id
    }

    /// Replace the transient preview. Never enters history.
    pub fn set_preview(&mut self, text: &str) {
        if text.is_empty() {
            self.preview = None;
        } else {
            self.preview = Some(SubtitleSegment {
                id: 0, // reserved: the preview has no stable identity
                original_text: text.to_string(),
                translated_text: String::new(),
                timestamp: self.clock.now(),
                is_final: false,
            });
        }
    }

    /// Reconcile a completed dispatch by id. Failures become a visible
    /// placeholder so no entry is ever left unresolved.
    pub fn apply_translation(&mut self, update: TranslationUpdate) {
        let Some(segment) = self.history.iter_mut().find(|s| s.id == update.id) else {
            warn!(target: "subtitle", id = update.id, "translation for unknown segment dropped");
            return;
        };
        match update.result {
            Ok(translated) => {
                debug!(target: "subtitle", id = update.id, "translation resolved");
                segment.translated_text = translated;
            }
            Err(e) => {
                warn!(target: "subtitle", id = update.id, error = %e, "translation failed");
                segment.translated_text = TRANSLATION_FAILED.to_string();
                self.translation_failures += 1;
            }
        }
    }

    pub fn history(&self) -> &[SubtitleSegment] {
        &self.history
    }

    /// Consume the lifecycle and take the committed history, e.g. for the
    /// end-of-session summary.
    pub fn into_history(self) -> Vec<SubtitleSegment> {
        self.history
    }

    pub fn preview(&self) -> Option<&SubtitleSegment> {
        self.preview.as_ref()
    }

    pub fn translation_failures(&self) -> u64 {
        self.translation_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livecap_foundation::real_clock;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Test translator with per-text latency and failure control.
    struct FakeTranslator {
        delays: HashMap<String, Duration>,
        fail: Vec<String>,
    }

    #[async_trait::async_trait]
    impl Translator for FakeTranslator {
        async fn translate(&self, text: &str) -> Result<String, TranslateError> {
            if let Some(delay) = self.delays.get(text) {
                tokio::time::sleep(*delay).await;
            }
            if self.fail.iter().any(|t| t == text) {
                return Err(TranslateError::Unavailable("down".into()));
            }
            Ok(format!("<{}>", text))
        }
    }

    fn lifecycle(
        translator: FakeTranslator,
    ) -> (SubtitleLifecycle, mpsc::Receiver<TranslationUpdate>) {
        let (tx, rx) = mpsc::channel(16);
        (
            SubtitleLifecycle::new(Arc::new(translator), real_clock(), tx),
            rx,
        )
    }

    #[tokio::test]
    async fn out_of_order_completions_reconcile_by_id() {
        // B resolves before A; history must still show both in commit
        // order with the right translations.
        let mut delays = HashMap::new();
        delays.insert("A".to_string(), Duration::from_millis(80));
        delays.insert("B".to_string(), Duration::from_millis(5));
        let (mut lc, mut rx) = lifecycle(FakeTranslator {
            delays,
            fail: vec![],
        });

        let id_a = lc.commit("A".into());
        let id_b = lc.commit("B".into());
        assert!(id_a < id_b);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.id, id_b, "B should resolve first");
        lc.apply_translation(first);
        lc.apply_translation(second);

        let history = lc.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].original_text, "A");
        assert_eq!(history[0].translated_text, "<A>");
        assert_eq!(history[1].original_text, "B");
        assert_eq!(history[1].translated_text, "<B>");
    }

    #[tokio::test]
    async fn failed_translation_gets_visible_placeholder() {
        let (mut lc, mut rx) = lifecycle(FakeTranslator {
            delays: HashMap::new(),
            fail: vec!["broken".to_string()],
        });

        lc.commit("broken".into());
        let update = rx.recv().await.unwrap();
        lc.apply_translation(update);

        assert_eq!(lc.history()[0].translated_text, TRANSLATION_FAILED);
        assert_eq!(lc.translation_failures(), 1);
    }

    #[tokio::test]
    async fn preview_is_transient_and_never_in_history() {
        let (mut lc, _rx) = lifecycle(FakeTranslator {
            delays: HashMap::new(),
            fail: vec![],
        });

        lc.set_preview("typing...");
        assert_eq!(lc.preview().unwrap().original_text, "typing...");
        assert!(!lc.preview().unwrap().is_final);
        assert!(lc.history().is_empty());

        lc.set_preview("");
        assert!(lc.preview().is_none());
    }

    #[tokio::test]
    async fn segments_keep_pending_placeholder_until_resolution() {
        let mut delays = HashMap::new();
        delays.insert("slow".to_string(), Duration::from_millis(200));
        let (mut lc, mut rx) = lifecycle(FakeTranslator {
            delays,
            fail: vec![],
        });

        lc.commit("slow".into());
        assert_eq!(lc.history()[0].translated_text, TRANSLATION_PENDING);

        let update = rx.recv().await.unwrap();
        lc.apply_translation(update);
        assert_eq!(lc.history()[0].translated_text, "<slow>");
    }

    #[tokio::test]
    async fn unknown_id_is_dropped_silently() {
        let (mut lc, _rx) = lifecycle(FakeTranslator {
            delays: HashMap::new(),
            fail: vec![],
        });
        lc.apply_translation(TranslationUpdate {
            id: 999,
            result: Ok("ghost".into()),
        });
        assert!(lc.history().is_empty());
    }
}

//! Session orchestration.
//!
//! Everything stateful (transport polling, reassembly, segmentation,
//! subtitle history) runs on this single task, driven by two independent
//! interval timers: a fast transport poll and a slower segmentation tick.
//! Translation dispatches are the only concurrent work; their completions
//! come back through a channel and are applied here.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use livecap_audio::{DebugWavSink, SampleReassembler, TransportReader};
use livecap_foundation::{real_clock, SessionError};
use livecap_stt::{StreamingStt, TranscriptionEvent};
use livecap_subtitle::{
    EngineUpdate, SegmentationEngine, SegmenterConfig, SubtitleLifecycle, SubtitleSegment,
    TranslationUpdate, Translator,
};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub transport_dir: PathBuf,
    /// Transport poll cadence.
    pub poll_interval: Duration,
    /// Segmentation tick cadence.
    pub tick_interval: Duration,
    pub segmenter: SegmenterConfig,
    /// Capture everything delivered to the speech engine.
    pub debug_wav: Option<PathBuf>,
    /// End the session on our own once the producer clears the marker.
    pub exit_when_inactive: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transport_dir: PathBuf::from("livecap-session"),
            poll_interval: Duration::from_millis(100),
            tick_interval: Duration::from_millis(200),
            segmenter: SegmenterConfig::default(),
            debug_wav: None,
            exit_when_inactive: true,
        }
    }
}

/// End-of-session report.
#[derive(Debug)]
pub struct SessionSummary {
    pub history: Vec<SubtitleSegment>,
    pub samples_forwarded: u64,
    pub transcript_updates: u64,
    pub translation_failures: u64,
}

enum PollOutcome {
    Continue,
    SessionEnded,
}

pub struct SessionRunner {
    cfg: SessionConfig,
    stt: Box<dyn StreamingStt>,
    engine: SegmentationEngine,
    lifecycle: SubtitleLifecycle,
    translation_rx: mpsc::Receiver<TranslationUpdate>,
    reader: TransportReader,
    reassembler: SampleReassembler,
    wav: Option<DebugWavSink>,
    seen_active: bool,
    samples_forwarded: u64,
    transcript_updates: u64,
}

impl SessionRunner {
    pub fn new(
        cfg: SessionConfig,
        stt: Box<dyn StreamingStt>,
        translator: Arc<dyn Translator>,
    ) -> Result<Self, SessionError> {
        if cfg.segmenter.max_segment_chars == 0 {
            return Err(SessionError::Config(
                "max segment length must be at least 1 character".into(),
            ));
        }
        let clock = real_clock();
        let (translation_tx, translation_rx) = mpsc::channel(64);
        let wav = match &cfg.debug_wav {
            Some(path) => Some(DebugWavSink::create(path)?),
            None => None,
        };
        let reader = TransportReader::new(&cfg.transport_dir);
        let engine = SegmentationEngine::new(cfg.segmenter.clone(), clock.clone());
        let lifecycle = SubtitleLifecycle::new(translator, clock, translation_tx);

        Ok(Self {
            cfg,
            stt,
            engine,
            lifecycle,
            translation_rx,
            reader,
            reassembler: SampleReassembler::new(),
            wav,
            seen_active: false,
            samples_forwarded: 0,
            transcript_updates: 0,
        })
    }

    /// Drive the session until the producer stops, a shutdown is
    /// requested, or the speech engine fails.
    pub async fn run(
        mut self,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<SessionSummary, SessionError> {
        let mut poll = tokio::time::interval(self.cfg.poll_interval);
        let mut tick = tokio::time::interval(self.cfg.tick_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            target: "session",
            dir = %self.cfg.transport_dir.display(),
            "session loop started"
        );

        let fatal = loop {
            tokio::select! {
                _ = poll.tick() => {
                    match self.poll_transport().await {
                        Ok(PollOutcome::Continue) => {}
                        Ok(PollOutcome::SessionEnded) => break None,
                        Err(e) if e.is_fatal() => break Some(e),
                        Err(e) => {
                            warn!(target: "session", error = %e, "recoverable poll failure, retrying");
                        }
                    }
                }
                _ = tick.tick() => {
                    let update = self.engine.on_tick();
                    self.apply_engine_update(update);
                }
                Some(update) = self.translation_rx.recv() => {
                    self.lifecycle.apply_translation(update);
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!(target: "session", "shutdown requested");
                        break None;
                    }
                }
            }
        };

        self.teardown(fatal).await
    }

    /// One transport poll: read the delta, reassemble whole samples, feed
    /// the engine. Errors are classified by the caller via `is_fatal`; a
    /// transport read failure is retried on the next tick.
    async fn poll_transport(&mut self) -> Result<PollOutcome, SessionError> {
        let active = self.reader.session_active();
        if active {
            self.seen_active = true;
        }
        // Reading starts only once the producer has asserted the marker.
        if !self.seen_active {
            return Ok(PollOutcome::Continue);
        }

        if let Some(bytes) = self.reader.poll()? {
            let samples = self.reassembler.push(&bytes);
            if !samples.is_empty() {
                self.forward_samples(samples).await?;
            }
        }

        if self.cfg.exit_when_inactive && self.seen_active && !active {
            info!(target: "session", "producer cleared session marker");
            return Ok(PollOutcome::SessionEnded);
        }
        Ok(PollOutcome::Continue)
    }

    async fn forward_samples(&mut self, samples: Vec<i16>) -> Result<(), SessionError> {
        if let Some(wav) = self.wav.as_mut() {
            if let Err(e) = wav.write_samples(&samples) {
                warn!(target: "session", error = %e, "debug WAV sink failed, disabling");
                self.wav = None;
            }
        }
        self.samples_forwarded += samples.len() as u64;

        // Speech engine failure is session-fatal, unlike audio failures.
        let events = self
            .stt
            .accept_audio(&samples)
            .await
            .map_err(|e| SessionError::SpeechEngine(e.to_string()))?;
        for event in events {
            self.handle_transcription(event)?;
        }
        Ok(())
    }

    fn handle_transcription(&mut self, event: TranscriptionEvent) -> Result<(), SessionError> {
        match event {
            TranscriptionEvent::Partial { text } => {
                self.transcript_updates += 1;
                let update = self.engine.on_transcript(&text, false);
                self.apply_engine_update(update);
                Ok(())
            }
            TranscriptionEvent::Final { text } => {
                self.transcript_updates += 1;
                let update = self.engine.on_transcript(&text, true);
                self.apply_engine_update(update);
                Ok(())
            }
            TranscriptionEvent::Error { code, message } => Err(SessionError::SpeechEngine(
                format!("{}: {}", code, message),
            )),
        }
    }

    fn apply_engine_update(&mut self, update: EngineUpdate) {
        for text in update.commits {
            self.lifecycle.commit(text);
        }
        self.lifecycle.set_preview(&update.preview);
    }

    /// Teardown order: flush remaining uncommitted text, then stop (the
    /// timers died with the loop), then give already-completed translation
    /// dispatches a bounded chance to land. Later completions are
    /// discarded with the channel, not cancelled.
    async fn teardown(
        mut self,
        fatal: Option<SessionError>,
    ) -> Result<SessionSummary, SessionError> {
        if fatal.is_none() {
            match self.stt.finalize().await {
                Ok(events) => {
                    for event in events {
                        if let Err(e) = self.handle_transcription(event) {
                            warn!(target: "session", error = %e, "engine error during finalize");
                        }
                    }
                }
                Err(e) => warn!(target: "session", error = %e, "speech engine finalize failed"),
            }
        }

        let update = self.engine.flush();
        self.apply_engine_update(update);

        let drain_deadline = tokio::time::Instant::now() + Duration::from_millis(250);
        while let Ok(Some(update)) =
            tokio::time::timeout_at(drain_deadline, self.translation_rx.recv()).await
        {
            self.lifecycle.apply_translation(update);
        }

        if let Some(wav) = self.wav.take() {
            if let Err(e) = wav.finalize() {
                warn!(target: "session", error = %e, "failed to finalize debug WAV");
            }
        }

        let summary = SessionSummary {
            samples_forwarded: self.samples_forwarded,
            transcript_updates: self.transcript_updates,
            translation_failures: self.lifecycle.translation_failures(),
            history: self.lifecycle.into_history(),
        };

        info!(
            target: "session",
            samples = summary.samples_forwarded,
            updates = summary.transcript_updates,
            segments = summary.history.len(),
            failed_translations = summary.translation_failures,
            "session finished"
        );

        match fatal {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }
}

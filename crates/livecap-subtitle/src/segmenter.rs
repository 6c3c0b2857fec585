//! Live transcript segmentation.
//!
//! A continuous classifier over an append-only transcript string. Run once
//! per transcript update and once per scheduler tick, it applies ordered
//! commit rules until none fires, then exposes the remaining uncommitted
//! suffix as the live preview. There is no lookahead beyond the current
//! partial transcript: given the same update/tick sequence, the same
//! segmentation comes out.

use std::time::{Duration, Instant};

use livecap_foundation::SharedClock;
use tracing::{debug, trace};

/// Sentence-final punctuation: commit immediately.
fn is_strong_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | ';' | '\n' | '。' | '！' | '？' | '；' | '．')
}

/// Clause punctuation: recognizers frequently revise these shortly after
/// emitting them, so they only commit after a debounce or above a minimum
/// cut length.
fn is_weak_terminator(c: char) -> bool {
    matches!(c, ',' | ':' | '，' | '：' | '、')
}

fn is_cut_boundary(c: char) -> bool {
    is_strong_terminator(c) || is_weak_terminator(c) || c.is_whitespace()
}

/// Collapse internal whitespace/newlines to single spaces and trim.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// Weak cut below this many chars is debounced instead of committed.
    pub min_weak_commit_chars: usize,
    /// How long a pending weak cut must survive unrevised before committing.
    pub weak_debounce: Duration,
    /// Hard ceiling on uncommitted length; rule 4 always cuts at or before it.
    pub max_segment_chars: usize,
    /// Identical-uncommitted observations needed for the stability rule.
    pub stability_min_repeats: u32,
    /// Minimum uncommitted length for the stability rule.
    pub stability_min_chars: usize,
    /// Quiet period after which trailing text commits.
    pub silence_timeout: Duration,
    /// Minimum uncommitted length for the silence rule.
    pub silence_min_chars: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_weak_commit_chars: 10,
            weak_debounce: Duration::from_millis(800),
            max_segment_chars: 100,
            stability_min_repeats: 3,
            stability_min_chars: 8,
            silence_timeout: Duration::from_secs(2),
            silence_min_chars: 2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingWeakCut {
    /// Absolute char offset (into the full transcript) the cut ends at.
    end: usize,
    since: Instant,
}

/// What one engine run produced: zero or more commits plus the new preview.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineUpdate {
    pub commits: Vec<String>,
    pub preview: String,
}

pub struct SegmentationEngine {
    cfg: SegmenterConfig,
    clock: SharedClock,
    /// Chars of the recognizer's current full text for the live pass.
    full_text: Vec<char>,
    /// Chars already finalized; always <= full_text.len() when rules run.
    committed: usize,
    last_change_at: Instant,
    /// Uncommitted suffix as of the previous observation.
    last_uncommitted: String,
    /// Consecutive transcript observations with identical uncommitted text.
    stable_repeats: u32,
    pending_weak: Option<PendingWeakCut>,
    /// Normalized text of the most recent real commit, for stutter
    /// suppression.
    last_committed_norm: String,
    commit_count: u64,
}

impl SegmentationEngine {
    pub fn new(cfg: SegmenterConfig, clock: SharedClock) -> Self {
        let now = clock.now();
        Self {
            cfg,
            clock,
            full_text: Vec::new(),
            committed: 0,
            last_change_at: now,
            last_uncommitted: String::new(),
            stable_repeats: 0,
            pending_weak: None,
            last_committed_norm: String::new(),
            commit_count: 0,
        }
    }

    /// Start of a recognition session: forget everything, including the
    /// repeat-suppression reference.
    pub fn reset(&mut self) {
        self.full_text.clear();
        self.committed = 0;
        self.last_change_at = self.clock.now();
        self.last_uncommitted.clear();
        self.stable_repeats = 0;
        self.pending_weak = None;
        self.last_committed_norm.clear();
    }

    pub fn committed_chars(&self) -> usize {
        self.committed
    }

    pub fn commit_count(&self) -> u64 {
        self.commit_count
    }

    /// Feed one recognizer update (partial or final).
    pub fn on_transcript(&mut self, text: &str, is_final: bool) -> EngineUpdate {
        let now = self.clock.now();
        let chars: Vec<char> = text.chars().collect();
        if chars != self.full_text {
            self.last_change_at = now;
        }
        self.full_text = chars;
        // The reported text is authoritative: a shrink/restart invalidates
        // the committed prefix.
        if self.committed > self.full_text.len() {
            debug!(target: "segmenter", "transcript shrank below committed prefix, resetting cursor");
            self.committed = 0;
            self.pending_weak = None;
        }
        self.observe();

        let mut commits = Vec::new();
        if is_final {
            self.run_rules(now, false, &mut commits);
            self.flush_remaining(&mut commits);
            // Next partial starts a fresh utterance text; only the
            // repeat-suppression reference survives.
            self.full_text.clear();
            self.committed = 0;
            self.pending_weak = None;
            self.stable_repeats = 0;
            self.last_uncommitted.clear();
            return EngineUpdate {
                commits,
                preview: String::new(),
            };
        }

        self.run_rules(now, false, &mut commits);
        EngineUpdate {
            commits,
            preview: self.preview_text(),
        }
    }

    /// Scheduler tick: time-driven rules (pending weak resolution,
    /// stability, silence) get their chance to fire.
    pub fn on_tick(&mut self) -> EngineUpdate {
        let now = self.clock.now();
        let mut commits = Vec::new();
        self.run_rules(now, true, &mut commits);
        EngineUpdate {
            commits,
            preview: self.preview_text(),
        }
    }

    /// Session stop: commit the entire remaining uncommitted suffix
    /// unconditionally and clear the preview.
    pub fn flush(&mut self) -> EngineUpdate {
        let mut commits = Vec::new();
        self.flush_remaining(&mut commits);
        self.full_text.clear();
        self.committed = 0;
        self.pending_weak = None;
        self.stable_repeats = 0;
        self.last_uncommitted.clear();
        EngineUpdate {
            commits,
            preview: String::new(),
        }
    }

    fn uncommitted(&self) -> &[char] {
        &self.full_text[self.committed.min(self.full_text.len())..]
    }

    fn preview_text(&self) -> String {
        normalize_text(&self.uncommitted().iter().collect::<String>())
    }

    /// Count consecutive observations with byte-identical uncommitted
    /// text. Only transcript updates observe: a recognizer that re-emits
    /// the same partial is confirming it, while one that went quiet is
    /// covered by the silence rule instead.
    fn observe(&mut self) {
        let current: String = self.uncommitted().iter().collect();
        if current == self.last_uncommitted {
            self.stable_repeats = self.stable_repeats.saturating_add(1);
        } else {
            self.stable_repeats = 1;
            self.last_uncommitted = current;
        }
    }

    /// Apply the ordered commit rules until none fires. Each fired rule
    /// re-enters the loop, so one update can produce several commits.
    fn run_rules(&mut self, now: Instant, is_tick: bool, commits: &mut Vec<String>) {
        loop {
            if self.committed > self.full_text.len() {
                self.committed = 0;
            }
            let un: Vec<char> = self.uncommitted().to_vec();
            if un.is_empty() {
                self.revalidate_pending();
                return;
            }

            // 1. Strong terminator: commit through the last one.
            if let Some(idx) = un.iter().rposition(|&c| is_strong_terminator(c)) {
                self.commit_span(idx + 1, commits);
                continue;
            }

            // 2. Weak terminator: long cuts commit now, short ones are
            // recorded as a debounced candidate.
            if let Some(idx) = un.iter().rposition(|&c| is_weak_terminator(c)) {
                let cut = idx + 1;
                if cut >= self.cfg.min_weak_commit_chars {
                    self.commit_span(cut, commits);
                    continue;
                }
                let end = self.committed + cut;
                match self.pending_weak {
                    Some(p) if p.end == end => {} // keep the original timestamp
                    _ => {
                        trace!(target: "segmenter", end, "weak cut pending");
                        self.pending_weak = Some(PendingWeakCut { end, since: now });
                    }
                }
            }

            // 3. Pending weak resolution.
            if let Some(p) = self.pending_weak {
                if p.end <= self.committed || p.end > self.full_text.len() {
                    self.pending_weak = None;
                } else if now.duration_since(p.since) >= self.cfg.weak_debounce {
                    self.pending_weak = None;
                    self.commit_span(p.end - self.committed, commits);
                    continue;
                }
            }

            // 4. Max-length fallback: never let a segment grow unboundedly.
            // The cut must always advance the cursor, or a degenerate
            // ceiling of 0 would loop here forever.
            if un.len() >= self.cfg.max_segment_chars {
                let cut = best_cut_at_or_before(&un, self.cfg.max_segment_chars).max(1);
                self.commit_span(cut, commits);
                continue;
            }

            // 5. Stability: the recognizer has stopped revising this span.
            if is_tick
                && self.stable_repeats >= self.cfg.stability_min_repeats
                && un.len() >= self.cfg.stability_min_chars
            {
                self.commit_span(un.len(), commits);
                continue;
            }

            // 6. Silence: trailing speech with no punctuation and no
            // further revision.
            if is_tick
                && now.duration_since(self.last_change_at) >= self.cfg.silence_timeout
                && un.len() >= self.cfg.silence_min_chars
            {
                self.commit_span(un.len(), commits);
                continue;
            }

            return;
        }
    }

    fn flush_remaining(&mut self, commits: &mut Vec<String>) {
        let len = self.uncommitted().len();
        if len > 0 {
            self.commit_span(len, commits);
        }
    }

    /// Finalize `span` uncommitted chars. Degenerate candidates (empty
    /// after normalization, or a repeat of the previous commit) advance the
    /// cursor without producing a segment.
    fn commit_span(&mut self, span: usize, commits: &mut Vec<String>) {
        let raw: String = self.uncommitted()[..span].iter().collect();
        self.committed += span;
        self.revalidate_pending();
        self.stable_repeats = 0;
        self.last_uncommitted = self.uncommitted().iter().collect();

        let normalized = normalize_text(&raw);
        if normalized.is_empty() || normalized == self.last_committed_norm {
            trace!(target: "segmenter", span, "absorbed degenerate commit candidate");
            return;
        }
        debug!(target: "segmenter", text = %normalized, committed = self.committed, "commit");
        self.last_committed_norm = normalized.clone();
        self.commit_count += 1;
        commits.push(normalized);
    }

    /// A pending candidate survives only while its offset is still ahead
    /// of the committed cursor and inside the transcript.
    fn revalidate_pending(&mut self) {
        if let Some(p) = self.pending_weak {
            if p.end <= self.committed || p.end > self.full_text.len() {
                self.pending_weak = None;
            }
        }
    }
}

/// Best cut point at or before the ceiling: the nearest preceding
/// word/clause boundary, or exactly the ceiling when there is none.
fn best_cut_at_or_before(un: &[char], ceiling: usize) -> usize {
    let limit = ceiling.min(un.len());
    match un[..limit].iter().rposition(|&c| is_cut_boundary(c)) {
        Some(idx) => idx + 1,
        None => limit,
    }
}

//! Name filtering over the message log.
//!
//! A [`NameFilter`] is rebuilt wholesale from the operator's filter string
//! on every change; the previous filter (and any walk applying it) is
//! simply discarded, which is what keeps in-flight state trivially valid.
//! [`FilterTask`] applies a filter over a log snapshot in bounded chunks so
//! a multi-thousand-entry pass never stalls the thread driving it.

use crate::pretty::PrettyMessage;
use crate::template::TemplateCodec;
use log::debug;
use msgtap_common::RawEntry;
use std::collections::VecDeque;
use tokio_util::sync::CancellationToken;

/// Entries classified per [`FilterTask::tick`].
pub const FILTER_CHUNK: usize = 256;

/// Positive/negative token filter over decoded message names.
///
/// Tokens are whitespace-separated; a leading `!` marks a negative token.
/// Empty tokens from stray whitespace are discarded, so a double space
/// cannot widen the positive list, and a whitespace-only filter string
/// still means "match everything".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NameFilter {
    positive: Vec<String>,
    negative: Vec<String>,
}

impl NameFilter {
    pub fn parse(text: &str) -> Self {
        let mut filter = NameFilter::default();
        for raw in text.split(char::is_whitespace) {
            let token = raw.trim().to_lowercase();
            if let Some(negated) = token.strip_prefix('!') {
                if !negated.is_empty() {
                    filter.negative.push(negated.to_string());
                }
            } else if !token.is_empty() {
                filter.positive.push(token);
            }
        }
        filter
    }

    /// A name matches iff the positive list is empty or contains it, and
    /// the negative list does not. Negative wins.
    pub fn matches(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        if self.negative.iter().any(|token| *token == name) {
            return false;
        }
        self.positive.is_empty() || self.positive.iter().any(|token| *token == name)
    }
}

/// Walk progress, reported after every chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FilterProgress {
    pub processed: usize,
    pub total: usize,
    pub matched: usize,
}

/// A resumable, cancelable filter pass over a log snapshot.
///
/// Live entries arriving while the walk is busy go through [`offer`] and
/// are queued, not applied, so the display list never mutates out of
/// order; they are flushed in arrival order when the walk ends. After
/// that, [`offer`] classifies immediately (normal live filtering).
///
/// [`offer`]: FilterTask::offer
pub struct FilterTask {
    filter: NameFilter,
    snapshot: Vec<RawEntry>,
    cursor: usize,
    processed: usize,
    matched: Vec<PrettyMessage>,
    pending: VecDeque<RawEntry>,
    cancel: CancellationToken,
    finished: bool,
    listen_port: u16,
}

impl FilterTask {
    pub fn new(filter: NameFilter, snapshot: Vec<RawEntry>, listen_port: u16) -> Self {
        Self {
            filter,
            snapshot,
            cursor: 0,
            processed: 0,
            matched: Vec::new(),
            pending: VecDeque::new(),
            cancel: CancellationToken::new(),
            finished: false,
            listen_port,
        }
    }

    /// Processes up to [`FILTER_CHUNK`] entries. Returns true once the
    /// task is finished (walk complete, or cancelled).
    pub fn tick(&mut self, codec: &mut dyn TemplateCodec) -> bool {
        if self.finished {
            return true;
        }
        if self.cancel.is_cancelled() {
            // abandoned: unvisited entries are never classified
            self.pending.clear();
            self.finished = true;
            return true;
        }

        let end = (self.cursor + FILTER_CHUNK).min(self.snapshot.len());
        while self.cursor < end {
            let entry = self.snapshot[self.cursor].clone();
            self.classify(&entry, codec);
            self.cursor += 1;
        }
        debug!(
            "filter pass: {}/{} scanned, {} matched",
            self.cursor,
            self.snapshot.len(),
            self.matched.len()
        );

        if self.cursor == self.snapshot.len() {
            // flush traffic that arrived during the walk, in arrival order
            while let Some(entry) = self.pending.pop_front() {
                self.classify(&entry, codec);
            }
            self.finished = true;
        }
        self.finished
    }

    /// Hands the task a live entry. Queued while the walk is busy,
    /// classified immediately once it is done.
    pub fn offer(&mut self, entry: RawEntry, codec: &mut dyn TemplateCodec) {
        if self.finished {
            self.classify(&entry, codec);
        } else {
            self.pending.push_back(entry);
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn progress(&self) -> FilterProgress {
        FilterProgress {
            processed: self.processed,
            total: self.snapshot.len(),
            matched: self.matched.len(),
        }
    }

    pub fn matches(&self) -> &[PrettyMessage] {
        &self.matched
    }

    pub fn into_matches(self) -> Vec<PrettyMessage> {
        self.matched
    }

    fn classify(&mut self, entry: &RawEntry, codec: &mut dyn TemplateCodec) {
        let pretty = PrettyMessage::decode(entry, codec, self.listen_port);
        self.processed += 1;
        if self.filter.matches(&pretty.name) {
            self.matched.push(pretty);
        }
    }
}

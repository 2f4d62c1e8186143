/// Batched, debounced translation cache.
///
/// `translate` answers synchronously from the cache and queues misses. Each
/// target language has a lane that moves `Idle -> Queued -> Flushing`: the
/// queue is flushed as one generation request after a quiet period, results
/// are persisted, and subscribers are told to re-read. At most one request
/// per language is in flight.
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::time::{Instant, sleep_until, timeout};
use tracing::{debug, error, info, warn};

use super::store::{CacheBlob, CacheStore};
use super::{FlushOutcome, Language, content_hash, translation_instruction};
use crate::generator::{GenerationError, TextGenerator};

// ── Settings ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationSettings {
    /// Language UI strings are authored in; never translated.
    pub source_language: Language,
    /// Quiet period before a queued batch is sent.
    pub debounce: Duration,
    /// Upper bound on a single batch request.
    pub request_timeout: Duration,
    /// Failed attempts tolerated per string before it is dropped.
    pub max_retries: u32,
    /// Base delay before retrying a failed batch, doubled per attempt.
    pub retry_backoff: Duration,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            source_language: Language::English,
            debounce: Duration::from_millis(800),
            request_timeout: Duration::from_secs(20),
            max_retries: 3,
            retry_backoff: Duration::from_secs(2),
        }
    }
}

impl TranslationSettings {
    fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(5);
        self.retry_backoff.saturating_mul(factor)
    }
}

// ── Lane state ───────────────────────────────────────────────────────

/// Scheduling state of one target language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPhase {
    Idle,
    Queued { deadline: Instant },
    Flushing,
}

#[derive(Debug, Clone)]
struct Pending {
    hash: String,
    text: String,
    attempts: u32,
}

#[derive(Debug)]
struct Lane {
    queue: Vec<Pending>,
    queued: HashSet<String>,
    in_flight: HashSet<String>,
    phase: FlushPhase,
    last_outcome: Option<FlushOutcome>,
    retry_delay: Option<Duration>,
    /// Set while the queued deadline is a retry backoff.
    retrying: bool,
}

impl Default for Lane {
    fn default() -> Self {
        Self {
            queue: Vec::new(),
            queued: HashSet::new(),
            in_flight: HashSet::new(),
            phase: FlushPhase::Idle,
            last_outcome: None,
            retry_delay: None,
            retrying: false,
        }
    }
}

impl Lane {
    /// Queue `text` unless it is already queued or in flight.
    fn enqueue(&mut self, hash: &str, text: &str) -> bool {
        if self.queued.contains(hash) || self.in_flight.contains(hash) {
            return false;
        }
        self.queued.insert(hash.to_string());
        self.queue.push(Pending {
            hash: hash.to_string(),
            text: text.to_string(),
            attempts: 0,
        });
        true
    }

    /// Move to `Queued`, or push the deadline back when `restart` is set.
    /// A pending retry backoff is never shortened.
    /// Returns true when the lane was idle and needs a driver task.
    fn arm(&mut self, deadline: Instant, restart: bool) -> bool {
        match self.phase {
            FlushPhase::Idle if !self.queue.is_empty() => {
                self.retrying = false;
                self.phase = FlushPhase::Queued { deadline };
                true
            }
            FlushPhase::Queued { deadline: current } if restart => {
                let deadline = if self.retrying {
                    current.max(deadline)
                } else {
                    deadline
                };
                self.phase = FlushPhase::Queued { deadline };
                false
            }
            _ => false,
        }
    }

    fn take_batch(&mut self) -> Vec<Pending> {
        self.retrying = false;
        self.queued.clear();
        let batch = std::mem::take(&mut self.queue);
        self.in_flight = batch.iter().map(|p| p.hash.clone()).collect();
        batch
    }
}

struct State {
    entries: CacheBlob,
    lanes: HashMap<Language, Lane>,
}

impl State {
    fn lookup(&self, hash: &str, lang: Language) -> Option<&String> {
        self.entries.get(hash)?.get(lang.code())
    }
}

// ── Observers ────────────────────────────────────────────────────────

/// Receiver of "new translations arrived" notifications.
pub trait CacheObserver: Send + Sync {
    fn on_update(&self);
}

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: BTreeMap<u64, Listener>,
}

/// Registration handle returned by [`TranslationCache::subscribe`].
///
/// Dropping it removes the listener.
#[must_use = "dropping a Subscription removes the listener"]
pub struct Subscription {
    listeners: Weak<Mutex<Listeners>>,
    id: u64,
}

impl Subscription {
    /// Remove the listener now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entries
                .remove(&self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

// ── Cache ────────────────────────────────────────────────────────────

struct Inner<G, S> {
    generator: G,
    store: S,
    settings: TranslationSettings,
    handle: Handle,
    state: Mutex<State>,
    listeners: Arc<Mutex<Listeners>>,
    settled: Notify,
}

/// Process-wide translation cache. Clones share the same state.
pub struct TranslationCache<G, S> {
    inner: Arc<Inner<G, S>>,
}

impl<G, S> Clone for TranslationCache<G, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G, S> TranslationCache<G, S>
where
    G: TextGenerator + 'static,
    S: CacheStore + 'static,
{
    /// Load the persisted cache and bind to the current Tokio runtime.
    ///
    /// A missing or corrupt blob starts an empty cache.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new(generator: G, store: S, settings: TranslationSettings) -> Self {
        let entries = match store.load() {
            Ok(entries) => {
                info!("Loaded {} cached translations", entries.len());
                entries
            }
            Err(e) => {
                warn!("Translation cache unreadable, starting empty: {e}");
                CacheBlob::new()
            }
        };

        Self {
            inner: Arc::new(Inner {
                generator,
                store,
                settings,
                handle: Handle::current(),
                state: Mutex::new(State {
                    entries,
                    lanes: HashMap::new(),
                }),
                listeners: Arc::new(Mutex::new(Listeners::default())),
                settled: Notify::new(),
            }),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &TranslationSettings {
        &self.inner.settings
    }

    #[must_use]
    pub fn generator(&self) -> &G {
        &self.inner.generator
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// Translated `text`, or `text` itself while the translation is pending.
    ///
    /// Misses are queued and a batch is scheduled; this never blocks.
    pub fn translate(&self, text: &str, lang: Language) -> String {
        if text.is_empty() || lang == self.inner.settings.source_language {
            return text.to_string();
        }

        let hash = content_hash(text);
        let spawn = {
            let mut state = self.inner.lock_state();
            if let Some(hit) = state.lookup(&hash, lang) {
                return hit.clone();
            }
            let deadline = Instant::now() + self.inner.settings.debounce;
            let lane = state.lanes.entry(lang).or_default();
            let added = lane.enqueue(&hash, text);
            if added {
                debug!("Queued {hash} for {lang} ({} pending)", lane.queue.len());
            }
            lane.arm(deadline, added)
        };

        if spawn {
            self.inner
                .handle
                .spawn(run_lane(Arc::clone(&self.inner), lang));
        }
        text.to_string()
    }

    /// Cached translation of `text`, or `text` itself. Never queues.
    #[must_use]
    pub fn get_cached(&self, text: &str, lang: Language) -> String {
        if text.is_empty() || lang == self.inner.settings.source_language {
            return text.to_string();
        }
        let hash = content_hash(text);
        self.inner
            .lock_state()
            .lookup(&hash, lang)
            .cloned()
            .unwrap_or_else(|| text.to_string())
    }

    #[must_use]
    pub fn is_cached(&self, text: &str, lang: Language) -> bool {
        self.inner
            .lock_state()
            .lookup(&content_hash(text), lang)
            .is_some()
    }

    /// Number of strings waiting for the next batch.
    #[must_use]
    pub fn pending_len(&self, lang: Language) -> usize {
        self.inner
            .lock_state()
            .lanes
            .get(&lang)
            .map_or(0, |lane| lane.queue.len())
    }

    #[must_use]
    pub fn phase(&self, lang: Language) -> FlushPhase {
        self.inner
            .lock_state()
            .lanes
            .get(&lang)
            .map_or(FlushPhase::Idle, |lane| lane.phase)
    }

    /// Outcome of the most recent batch for `lang`.
    #[must_use]
    pub fn last_outcome(&self, lang: Language) -> Option<FlushOutcome> {
        self.inner
            .lock_state()
            .lanes
            .get(&lang)
            .and_then(|lane| lane.last_outcome)
    }

    /// Wait until the lane for `lang` is idle, then report its last outcome.
    pub async fn settled(&self, lang: Language) -> Option<FlushOutcome> {
        loop {
            let notified = self.inner.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let state = self.inner.lock_state();
                let lane = state.lanes.get(&lang);
                if lane.is_none_or(|l| l.phase == FlushPhase::Idle) {
                    return lane.and_then(|l| l.last_outcome);
                }
            }
            notified.await;
        }
    }

    /// Call `listener` after every successful batch. Listeners run in
    /// registration order.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut listeners = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.insert(id, Arc::new(listener));

        Subscription {
            listeners: Arc::downgrade(&self.inner.listeners),
            id,
        }
    }

    /// Subscribe an observer without keeping it alive.
    pub fn subscribe_observer<O>(&self, observer: &Arc<O>) -> Subscription
    where
        O: CacheObserver + 'static,
    {
        let weak = Arc::downgrade(observer);
        self.subscribe(move || {
            if let Some(observer) = weak.upgrade() {
                observer.on_update();
            }
        })
    }
}

impl<G, S> Inner<G, S>
where
    G: TextGenerator,
    S: CacheStore,
{
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deadline_of(&self, lang: Language) -> Option<Instant> {
        match self.lock_state().lanes.get(&lang).map(|lane| lane.phase) {
            Some(FlushPhase::Queued { deadline }) => Some(deadline),
            _ => None,
        }
    }

    /// Send one batch and fold the result into the cache.
    async fn fill(&self, lang: Language, batch: Vec<Pending>) -> FlushOutcome {
        let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();
        let instruction = translation_instruction(lang);
        debug!("Sending {} strings for {}", texts.len(), lang.name());

        let result = match timeout(
            self.settings.request_timeout,
            self.generator.generate_list(&instruction, &texts),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(self.settings.request_timeout)),
        };

        let result = result.and_then(|translations| {
            if translations.len() == batch.len() {
                Ok(translations)
            } else {
                Err(GenerationError::Malformed(format!(
                    "expected {} translations, got {}",
                    batch.len(),
                    translations.len()
                )))
            }
        });

        match result {
            Ok(translations) => {
                let mut translated = 0;
                let snapshot = {
                    let mut state = self.lock_state();
                    for (pending, text) in batch.iter().zip(translations) {
                        if text.is_empty() {
                            debug!("Empty translation for {}, leaving uncached", pending.hash);
                            continue;
                        }
                        state
                            .entries
                            .entry(pending.hash.clone())
                            .or_default()
                            .insert(lang.code().to_string(), text);
                        translated += 1;
                    }
                    state.entries.clone()
                };

                if let Err(e) = self.store.save(&snapshot) {
                    warn!("Failed to persist translation cache: {e}");
                }
                info!("Translated {translated} strings into {}", lang.name());
                self.notify();
                FlushOutcome::Success { translated }
            }
            Err(e) => {
                let outcome = FlushOutcome::from(&e);
                warn!(
                    "Translation batch of {} strings into {} failed: {e}",
                    batch.len(),
                    lang.name()
                );
                self.requeue(lang, batch);
                outcome
            }
        }
    }

    /// Put a failed batch back ahead of newer misses, dropping strings that
    /// have used up their retries.
    fn requeue(&self, lang: Language, batch: Vec<Pending>) {
        let mut state = self.lock_state();
        let State { entries, lanes } = &mut *state;
        let lane = lanes.entry(lang).or_default();

        let mut retry = Vec::with_capacity(batch.len());
        let mut highest_attempt = 0;
        for mut pending in batch {
            pending.attempts += 1;
            if pending.attempts > self.settings.max_retries {
                warn!(
                    "Giving up on {:?} for {} after {} attempts",
                    pending.text,
                    lang.name(),
                    pending.attempts
                );
                continue;
            }
            let cached = entries
                .get(&pending.hash)
                .is_some_and(|by_lang| by_lang.contains_key(lang.code()));
            if cached || lane.queued.contains(&pending.hash) {
                continue;
            }
            highest_attempt = highest_attempt.max(pending.attempts);
            lane.queued.insert(pending.hash.clone());
            retry.push(pending);
        }

        if highest_attempt > 0 {
            lane.retry_delay = Some(self.settings.backoff_for(highest_attempt));
        }
        retry.append(&mut lane.queue);
        lane.queue = retry;
    }

    fn notify(&self) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .values()
            .cloned()
            .collect();

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener())).is_err() {
                error!("Translation listener panicked");
            }
        }
    }
}

/// Driver task for one language lane. Runs until the lane goes idle.
async fn run_lane<G, S>(inner: Arc<Inner<G, S>>, lang: Language)
where
    G: TextGenerator,
    S: CacheStore,
{
    loop {
        // Quiet period; new misses keep pushing the deadline back
        while let Some(deadline) = inner.deadline_of(lang) {
            if Instant::now() >= deadline {
                break;
            }
            sleep_until(deadline).await;
        }

        let batch = {
            let mut state = inner.lock_state();
            let lane = state.lanes.entry(lang).or_default();
            if !matches!(lane.phase, FlushPhase::Queued { .. }) {
                return;
            }
            let batch = lane.take_batch();
            lane.phase = if batch.is_empty() {
                FlushPhase::Idle
            } else {
                FlushPhase::Flushing
            };
            batch
        };
        if batch.is_empty() {
            inner.settled.notify_waiters();
            return;
        }

        let outcome = inner.fill(lang, batch).await;

        let rearmed = {
            let mut state = inner.lock_state();
            let lane = state.lanes.entry(lang).or_default();
            lane.in_flight.clear();
            lane.last_outcome = Some(outcome);
            let backoff = lane.retry_delay.take();
            let delay = backoff.map_or(inner.settings.debounce, |d| d.max(inner.settings.debounce));

            // Auth failures wait for the next miss instead of retrying on a timer
            if lane.queue.is_empty() || outcome == FlushOutcome::AuthError {
                lane.phase = FlushPhase::Idle;
                false
            } else {
                lane.retrying = backoff.is_some();
                lane.phase = FlushPhase::Queued {
                    deadline: Instant::now() + delay,
                };
                true
            }
        };

        if !rearmed {
            inner.settled.notify_waiters();
            return;
        }
    }
}

// src/session/runtime.rs

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
    time::Duration as StdDuration,
};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    models::{
        session::{AttemptView, Notice, Phase, SessionKey},
        submission::{SubmissionRecord, SubmitTrigger},
    },
    providers::{AttemptHistory, ContentProvider, Notifier, SubmissionStore},
    session::{
        attempt::Attempt,
        eligibility::check_eligibility,
        error::SessionError,
        integrity::{FocusSignal, SignalOutcome},
        navigation::Navigation,
        store::{Restored, SessionStore, reconcile},
        timer::{Clock, TickControl, TimerHandle, spawn_ticker},
    },
};

type SharedAttempt = Arc<Mutex<Attempt>>;

/// External services the runtime depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub content: Arc<dyn ContentProvider>,
    pub history: Arc<dyn AttemptHistory>,
    pub submissions: Arc<dyn SubmissionStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

struct RuntimeInner {
    deps: Collaborators,
    tick: StdDuration,
    attempts: Mutex<HashMap<SessionKey, SharedAttempt>>,
}

/// Hosts live attempts and wires the timer, the integrity monitor, the
/// session store and the submission engine around them.
///
/// Each attempt sits behind its own async mutex; attempts for different keys
/// never contend. Every student action mutates the attempt and then saves the
/// snapshot before the lock is released, so saves are applied in order.
#[derive(Clone)]
pub struct SessionRuntime {
    inner: Arc<RuntimeInner>,
}

impl SessionRuntime {
    pub fn new(deps: Collaborators, tick: StdDuration) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                deps,
                tick,
                attempts: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.inner.deps.clock.now()
    }

    async fn lookup(&self, key: &SessionKey) -> Option<SharedAttempt> {
        self.inner.attempts.lock().await.get(key).cloned()
    }

    async fn attempt(&self, key: &SessionKey) -> Result<SharedAttempt, SessionError> {
        self.lookup(key).await.ok_or(SessionError::NoActiveAttempt)
    }

    /// Saves the snapshot of a `taking` attempt. Failures are logged, not raised:
    /// the in-memory attempt stays authoritative for this process.
    async fn persist(&self, attempt: &Attempt) {
        if attempt.phase() != Phase::Taking {
            return;
        }
        if let Err(e) = self
            .inner
            .deps
            .sessions
            .save(&attempt.key(), attempt.snapshot())
            .await
        {
            tracing::warn!("Failed to save snapshot for {}: {}", attempt.key(), e);
        }
    }

    async fn discard_snapshot(&self, key: &SessionKey) {
        if let Err(e) = self.inner.deps.sessions.clear(key).await {
            tracing::warn!("Failed to clear snapshot for {}: {}", key, e);
        }
    }

    /// Loads an attempt: eligibility first, then resume or lobby.
    ///
    /// A live attempt (taking, or awaiting a successful write) is returned as is.
    pub async fn open(
        &self,
        user_id: i64,
        class_id: i64,
        assignment_id: i64,
    ) -> Result<AttemptView, SessionError> {
        let key = SessionKey::new(user_id, assignment_id);

        if let Some(shared) = self.lookup(&key).await {
            let attempt = shared.lock().await;
            if attempt.is_live() {
                return Ok(attempt.view(self.now()));
            }
        }

        let deps = &self.inner.deps;
        let assignment = deps
            .content
            .get_assignment(class_id, assignment_id)
            .await
            .map_err(|e| {
                tracing::warn!("Failed to load assignment {}: {}", assignment_id, e);
                SessionError::from(e)
            })?;
        let test = deps.content.get_test(assignment.test_id).await?;
        let prior_attempts = deps.history.count_attempts(assignment_id, user_id).await?;

        let now = self.now();
        if let Err(reason) = check_eligibility(&assignment, prior_attempts, now) {
            tracing::info!("{} is not eligible: {:?}", key, reason);
            self.discard_snapshot(&key).await;
            self.inner.attempts.lock().await.remove(&key);
            return Err(reason.into());
        }

        let mut attempt = Attempt::new(key, class_id, assignment, test);
        if attempt.test().questions.is_empty() {
            return Err(attempt.fail("test has no questions"));
        }

        let restored = deps
            .sessions
            .load(&key)
            .await?
            .map(|snapshot| reconcile(snapshot, now));

        match restored {
            None => attempt.enter_lobby(None)?,
            Some(Restored::Expired) => {
                tracing::info!("{}: stored session expired, returning to lobby", key);
                self.discard_snapshot(&key).await;
                attempt.enter_lobby(Some(Notice::SessionExpired))?;
            }
            Some(Restored::Resume { snapshot, remaining }) => {
                tracing::info!(
                    "{}: resuming session ({:?}s remaining)",
                    key,
                    remaining.map(|r| r.num_seconds())
                );
                attempt.resume(snapshot)?;
            }
        }

        let shared = Arc::new(Mutex::new(attempt));
        let view = {
            let mut attempt = shared.lock().await;
            if attempt.phase() == Phase::Taking {
                // The snapshot may have been repaired against current content.
                self.persist(&attempt).await;
                if attempt.test().is_timed() {
                    attempt.set_timer(self.spawn_timer(Arc::downgrade(&shared)));
                }
            }
            attempt.view(now)
        };

        self.inner.attempts.lock().await.insert(key, shared);
        Ok(view)
    }

    /// Lobby -> taking. Eligibility is checked again at this moment.
    pub async fn start(&self, key: &SessionKey) -> Result<AttemptView, SessionError> {
        let shared = self.attempt(key).await?;
        let mut attempt = shared.lock().await;
        if attempt.phase() != Phase::Lobby {
            return Err(SessionError::InvalidPhase(attempt.phase().as_str()));
        }

        let prior_attempts = self
            .inner
            .deps
            .history
            .count_attempts(key.assignment_id, key.user_id)
            .await?;
        let now = self.now();
        check_eligibility(attempt.assignment(), prior_attempts, now)?;

        attempt.start(now)?;
        self.persist(&attempt).await;
        if attempt.test().is_timed() {
            attempt.set_timer(self.spawn_timer(Arc::downgrade(&shared)));
        }

        tracing::info!(
            "{}: attempt started, ends at {:?}",
            key,
            attempt.snapshot().end_time
        );
        Ok(attempt.view(now))
    }

    /// Applies one student action under the attempt lock and saves the snapshot.
    async fn mutate<T, F>(&self, key: &SessionKey, action: F) -> Result<(T, AttemptView), SessionError>
    where
        F: FnOnce(&mut Attempt, DateTime<Utc>) -> Result<T, SessionError>,
    {
        let shared = self.attempt(key).await?;
        let mut attempt = shared.lock().await;
        let now = self.now();
        let out = action(&mut *attempt, now)?;
        self.persist(&attempt).await;
        Ok((out, attempt.view(now)))
    }

    pub async fn select_answer(&self, key: &SessionKey, option: &str) -> Result<AttemptView, SessionError> {
        let (_, view) = self
            .mutate(key, |a, now| a.select_answer(option, now))
            .await?;
        Ok(view)
    }

    pub async fn toggle_flag(&self, key: &SessionKey) -> Result<AttemptView, SessionError> {
        let (_, view) = self.mutate(key, |a, now| a.toggle_flag(now)).await?;
        Ok(view)
    }

    pub async fn navigate(&self, key: &SessionKey, navigation: Navigation) -> Result<AttemptView, SessionError> {
        let (_, view) = self
            .mutate(key, |a, now| a.navigate(navigation, now))
            .await?;
        Ok(view)
    }

    pub async fn finish_or_advance(&self, key: &SessionKey) -> Result<AttemptView, SessionError> {
        let (_, view) = self
            .mutate(key, |a, now| a.finish_or_advance(now))
            .await?;
        Ok(view)
    }

    pub async fn cancel_confirmation(&self, key: &SessionKey) -> Result<AttemptView, SessionError> {
        let (_, view) = self
            .mutate(key, |a, now| a.cancel_confirmation(now))
            .await?;
        Ok(view)
    }

    /// Feeds one browser signal to the integrity monitor.
    /// Returns the outcome and the current tab-switch count.
    pub async fn focus_signal(
        &self,
        key: &SessionKey,
        signal: FocusSignal,
    ) -> Result<(SignalOutcome, u32), SessionError> {
        let shared = self.attempt(key).await?;
        let mut attempt = shared.lock().await;
        let outcome = attempt.observe_focus(signal);
        if outcome == SignalOutcome::Counted {
            tracing::debug!(
                "{}: focus lost ({} total)",
                key,
                attempt.snapshot().tab_switch_count
            );
            self.persist(&attempt).await;
        }
        Ok((outcome, attempt.snapshot().tab_switch_count))
    }

    /// Confirmed manual submission.
    pub async fn submit(&self, key: &SessionKey) -> Result<AttemptView, SessionError> {
        let shared = self.attempt(key).await?;
        self.submit_attempt(&shared, SubmitTrigger::Manual).await
    }

    /// Retries a failed submission write. The score is not recomputed.
    pub async fn retry_submission(&self, key: &SessionKey) -> Result<AttemptView, SessionError> {
        let shared = self.attempt(key).await?;
        let record = shared.lock().await.begin_retry()?;
        tracing::info!("{}: retrying submission write", key);
        self.spawn_write(shared, record, false).await
    }

    /// Submitted view with the visibility policy applied.
    ///
    /// Served from the live attempt while its write is pending, otherwise from
    /// the stored submission.
    pub async fn result(&self, class_id: i64, key: &SessionKey) -> Result<AttemptView, SessionError> {
        if let Some(shared) = self.lookup(key).await {
            let attempt = shared.lock().await;
            match attempt.phase() {
                Phase::Submitted => return Ok(attempt.view(self.now())),
                Phase::Taking => return Err(SessionError::InvalidPhase("taking")),
                _ => {}
            }
        }

        let deps = &self.inner.deps;
        let stored = deps
            .submissions
            .get_submission(key)
            .await?
            .ok_or_else(|| SessionError::NotFound(format!("submission for {}", key)))?;
        let assignment = deps
            .content
            .get_assignment(class_id, key.assignment_id)
            .await?;
        let test = deps.content.get_test(assignment.test_id).await?;

        let attempt = Attempt::archived(*key, class_id, assignment, test, stored);
        Ok(attempt.view(self.now()))
    }

    pub async fn view(&self, key: &SessionKey) -> Result<AttemptView, SessionError> {
        let shared = self.attempt(key).await?;
        let attempt = shared.lock().await;
        Ok(attempt.view(self.now()))
    }

    /// Shared by the manual and the timeout path. The phase guard runs under the
    /// lock before anything is awaited; the loser gets `InvalidPhase`.
    async fn submit_attempt(
        &self,
        shared: &SharedAttempt,
        trigger: SubmitTrigger,
    ) -> Result<AttemptView, SessionError> {
        let record = {
            let mut attempt = shared.lock().await;
            attempt.begin_submission(trigger, self.now())?
        };
        let key = SessionKey::new(record.user_id, record.assignment_id);

        tracing::info!(
            "{}: submitted ({}), score {}/{}, {} tab switches",
            key,
            trigger.as_str(),
            record.score,
            record.total_questions,
            record.tab_switches
        );

        self.spawn_write(shared.clone(), record, true).await
    }

    /// Runs the snapshot clear and the write on their own task. A dropped
    /// request future cannot strand the write in flight: the task always
    /// records the outcome, and a failure stays retryable.
    async fn spawn_write(
        &self,
        shared: SharedAttempt,
        record: SubmissionRecord,
        clear_snapshot: bool,
    ) -> Result<AttemptView, SessionError> {
        let runtime = self.clone();
        let task = tokio::spawn(async move {
            if clear_snapshot {
                // Cleared once, before the write: a reload must never resurrect `taking`.
                let key = SessionKey::new(record.user_id, record.assignment_id);
                runtime.discard_snapshot(&key).await;
            }
            runtime.write_submission(&shared, record).await
        });

        task.await.map_err(|e| {
            tracing::error!("Submission task did not complete: {}", e);
            SessionError::SubmissionWriteFailed(e.to_string())
        })?
    }

    async fn write_submission(
        &self,
        shared: &SharedAttempt,
        record: SubmissionRecord,
    ) -> Result<AttemptView, SessionError> {
        let key = SessionKey::new(record.user_id, record.assignment_id);
        let outcome = self
            .inner
            .deps
            .submissions
            .upsert_submission(&key, &record)
            .await;

        let mut attempt = shared.lock().await;
        match outcome {
            Ok(attempts_taken) => {
                attempt.record_write_accepted(attempts_taken);
                self.notify_teacher(&attempt, &record);
                let view = attempt.view(self.now());
                drop(attempt);
                self.evict(&key, shared).await;
                Ok(view)
            }
            Err(e) => {
                tracing::error!("{}: submission write failed: {}", key, e);
                attempt.record_write_failed(e.to_string());
                Err(SessionError::SubmissionWriteFailed(e.to_string()))
            }
        }
    }

    /// Accepted attempts leave the registry; `result` reads them back from storage.
    async fn evict(&self, key: &SessionKey, shared: &SharedAttempt) {
        let mut attempts = self.inner.attempts.lock().await;
        if attempts
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, shared))
        {
            attempts.remove(key);
        }
    }

    /// Fire-and-forget; a failed notification never affects the submission.
    fn notify_teacher(&self, attempt: &Attempt, record: &SubmissionRecord) {
        let notifier = self.inner.deps.notifier.clone();
        let recipient_id = attempt.assignment().teacher_id;
        let title = format!("New submission: {}", attempt.test().title);
        let body = format!(
            "Student {} scored {}/{} ({} tab switches, {} submit)",
            record.user_id,
            record.score,
            record.total_questions,
            record.tab_switches,
            record.trigger.as_str()
        );
        let link = format!(
            "/classes/{}/assignments/{}/submissions/{}",
            attempt.class_id(),
            record.assignment_id,
            record.user_id
        );

        tokio::spawn(async move {
            if let Err(e) = notifier
                .notify(recipient_id, "submission", &title, &body, &link)
                .await
            {
                tracing::warn!("Failed to notify teacher {}: {}", recipient_id, e);
            }
        });
    }

    fn spawn_timer(&self, attempt: Weak<Mutex<Attempt>>) -> TimerHandle {
        let runtime = self.clone();
        spawn_ticker(self.inner.tick, move || {
            let runtime = runtime.clone();
            let attempt = attempt.clone();
            async move { runtime.on_tick(attempt).await }
        })
    }

    /// One timer tick. Remaining time is derived from `end_time` on every tick,
    /// so ticks lost to suspension do not matter.
    async fn on_tick(&self, attempt: Weak<Mutex<Attempt>>) -> TickControl {
        let Some(shared) = attempt.upgrade() else {
            return TickControl::Stop;
        };

        let time_up = {
            let attempt = shared.lock().await;
            if attempt.phase() != Phase::Taking {
                return TickControl::Stop;
            }
            attempt.is_time_up(self.now())
        };
        if !time_up {
            return TickControl::Continue;
        }

        match self.submit_attempt(&shared, SubmitTrigger::Timeout).await {
            Ok(_) => tracing::info!("Attempt auto-submitted at time-out"),
            Err(SessionError::InvalidPhase(_)) => {
                tracing::debug!("Time-out lost the race to a manual submit")
            }
            Err(e) => tracing::warn!("Auto-submit did not complete: {}", e),
        }
        TickControl::Stop
    }
}

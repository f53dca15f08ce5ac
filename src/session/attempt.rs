// src/session/attempt.rs

use chrono::{DateTime, Utc};

use crate::{
    models::{
        assignment::{AssignmentConfig, PublicQuestion, TestContent},
        session::{AttemptView, Notice, Phase, SessionKey, SessionSnapshot},
        submission::{ResultView, SubmissionRecord, SubmitTrigger, WriteStatus},
    },
    providers::StoredSubmission,
    session::{
        error::SessionError,
        integrity::{FocusSignal, IntegrityMonitor, SignalOutcome},
        navigation::{Advance, Navigation, Navigator},
        scoring::{PendingSubmission, build_record},
        timer::{TimerHandle, end_time_for, time_remaining},
        visibility::may_reveal_score,
    },
};

/// In-memory state of one student's attempt.
///
/// Every method is synchronous; persistence and network writes are done by the
/// runtime around these calls. The `taking -> submitted` transition in
/// `begin_submission` is the single guard that makes submission exactly-once.
#[derive(Debug)]
pub struct Attempt {
    key: SessionKey,
    class_id: i64,
    assignment: AssignmentConfig,
    test: TestContent,
    phase: Phase,
    snapshot: SessionSnapshot,
    monitor: IntegrityMonitor,
    confirm_open: bool,
    timer: Option<TimerHandle>,
    submission: Option<PendingSubmission>,
    notice: Option<Notice>,
}

impl Attempt {
    pub fn new(key: SessionKey, class_id: i64, assignment: AssignmentConfig, test: TestContent) -> Self {
        Self {
            key,
            class_id,
            assignment,
            test,
            phase: Phase::Loading,
            snapshot: SessionSnapshot::default(),
            monitor: IntegrityMonitor::default(),
            confirm_open: false,
            timer: None,
            submission: None,
            notice: None,
        }
    }

    /// A finished attempt rebuilt from its stored submission, for result views.
    pub fn archived(
        key: SessionKey,
        class_id: i64,
        assignment: AssignmentConfig,
        test: TestContent,
        stored: StoredSubmission,
    ) -> Self {
        let mut pending = PendingSubmission::new(stored.record);
        pending.accept(stored.attempts_taken);

        let mut attempt = Self::new(key, class_id, assignment, test);
        attempt.phase = Phase::Submitted;
        attempt.submission = Some(pending);
        attempt
    }

    pub fn key(&self) -> SessionKey {
        self.key
    }

    pub fn class_id(&self) -> i64 {
        self.class_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn assignment(&self) -> &AssignmentConfig {
        &self.assignment
    }

    pub fn test(&self) -> &TestContent {
        &self.test
    }

    pub fn snapshot(&self) -> &SessionSnapshot {
        &self.snapshot
    }

    pub fn submission(&self) -> Option<&PendingSubmission> {
        self.submission.as_ref()
    }

    /// Taking, or submitted with a write that has not been accepted yet.
    pub fn is_live(&self) -> bool {
        match self.phase {
            Phase::Taking => true,
            Phase::Submitted => self
                .submission
                .as_ref()
                .is_some_and(|s| s.status != WriteStatus::Accepted),
            _ => false,
        }
    }

    fn transition(&mut self, next: Phase) -> Result<(), SessionError> {
        if !self.phase.can_transition_to(next) {
            return Err(SessionError::InvalidPhase(self.phase.as_str()));
        }
        tracing::debug!(
            "{}: {} -> {}",
            self.key,
            self.phase.as_str(),
            next.as_str()
        );
        self.phase = next;
        Ok(())
    }

    fn ensure_phase(&self, expected: Phase) -> Result<(), SessionError> {
        if self.phase != expected {
            return Err(SessionError::InvalidPhase(self.phase.as_str()));
        }
        Ok(())
    }

    pub fn is_time_up(&self, now: DateTime<Utc>) -> bool {
        self.snapshot.end_time.is_some_and(|end| end <= now)
    }

    /// Gate for every student action during `taking`. Never extends the clock.
    fn ensure_taking(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.ensure_phase(Phase::Taking)?;
        if self.is_time_up(now) {
            return Err(SessionError::TimeUp);
        }
        self.notice = None;
        Ok(())
    }

    /// Answers and navigation are frozen while the finish confirmation is open;
    /// the student has to cancel it first, which re-arms the monitor.
    fn ensure_editable(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.ensure_phase(Phase::Taking)?;
        if self.confirm_open && !self.is_time_up(now) {
            return Err(SessionError::InvalidPhase("confirming"));
        }
        self.ensure_taking(now)
    }

    fn navigator(&mut self) -> Navigator<'_> {
        Navigator::new(&self.test.questions, &mut self.snapshot)
    }

    /// Loading failed on content that cannot be attempted.
    pub fn fail(&mut self, reason: &str) -> SessionError {
        if let Err(e) = self.transition(Phase::Error) {
            tracing::warn!("{}: could not enter error phase: {}", self.key, e);
        }
        SessionError::NotFound(reason.to_string())
    }

    pub fn enter_lobby(&mut self, notice: Option<Notice>) -> Result<(), SessionError> {
        self.transition(Phase::Lobby)?;
        self.notice = notice;
        Ok(())
    }

    /// Loading -> taking from a snapshot whose `end_time` is still ahead.
    pub fn resume(&mut self, snapshot: SessionSnapshot) -> Result<(), SessionError> {
        self.transition(Phase::Taking)?;
        self.snapshot = snapshot;
        self.navigator().sanitize();
        self.monitor.arm();
        Ok(())
    }

    /// Lobby -> taking. The one place `end_time` is computed.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.transition(Phase::Taking)?;
        self.snapshot = SessionSnapshot {
            end_time: end_time_for(now, self.test.duration_minutes),
            ..Default::default()
        };
        self.confirm_open = false;
        self.notice = None;
        self.monitor.arm();
        Ok(())
    }

    pub fn set_timer(&mut self, timer: TimerHandle) {
        if let Some(old) = self.timer.replace(timer) {
            old.cancel();
        }
    }

    pub fn select_answer(&mut self, option: &str, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.ensure_editable(now)?;
        self.navigator().select_answer(option)
    }

    pub fn toggle_flag(&mut self, now: DateTime<Utc>) -> Result<bool, SessionError> {
        self.ensure_editable(now)?;
        Ok(self.navigator().toggle_flag())
    }

    pub fn navigate(&mut self, navigation: Navigation, now: DateTime<Utc>) -> Result<usize, SessionError> {
        self.ensure_editable(now)?;
        self.navigator().navigate(navigation)
    }

    /// Advances, or on the last question either jumps to a missed question or
    /// opens the finish confirmation. The monitor pauses while it is open.
    pub fn finish_or_advance(&mut self, now: DateTime<Utc>) -> Result<Advance, SessionError> {
        self.ensure_editable(now)?;
        let advance = self.navigator().finish_or_advance();
        match advance {
            Advance::MissedQuestion(index) => {
                self.notice = Some(Notice::MissedQuestion { index });
            }
            Advance::ReadyToFinish => {
                self.confirm_open = true;
                self.monitor.disarm();
            }
            Advance::Moved(_) => {}
        }
        Ok(advance)
    }

    pub fn cancel_confirmation(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.ensure_taking(now)?;
        if self.confirm_open {
            self.confirm_open = false;
            self.monitor.arm();
        }
        Ok(())
    }

    /// Focus events outside `taking` or during the confirmation are ignored.
    pub fn observe_focus(&mut self, signal: FocusSignal) -> SignalOutcome {
        if self.phase != Phase::Taking {
            return SignalOutcome::Ignored;
        }
        self.monitor
            .observe(signal, &mut self.snapshot.tab_switch_count)
    }

    /// Atomic `taking -> submitted` check-and-set.
    ///
    /// Runs before any asynchronous work, so whichever of the timeout and the
    /// confirmed manual submit gets here first wins; the other sees
    /// `InvalidPhase`. Tears down the timer and the monitor.
    pub fn begin_submission(
        &mut self,
        trigger: SubmitTrigger,
        now: DateTime<Utc>,
    ) -> Result<SubmissionRecord, SessionError> {
        self.ensure_phase(Phase::Taking)?;
        if trigger == SubmitTrigger::Manual && !self.confirm_open {
            return Err(SessionError::ConfirmationRequired);
        }
        self.transition(Phase::Submitted)?;

        if let Some(timer) = self.timer.take() {
            // The timer path is running inside the tick task; only detach it there.
            if trigger == SubmitTrigger::Manual {
                timer.cancel();
            }
        }
        self.monitor.disarm();
        self.confirm_open = false;
        self.notice = None;

        let record = build_record(self.key, &self.test, &self.snapshot, trigger, now);
        self.submission = Some(PendingSubmission::new(record.clone()));
        Ok(record)
    }

    pub fn begin_retry(&mut self) -> Result<SubmissionRecord, SessionError> {
        self.ensure_phase(Phase::Submitted)?;
        self.notice = None;
        self.submission
            .as_mut()
            .ok_or(SessionError::InvalidPhase("submitted"))?
            .begin_retry()
    }

    pub fn record_write_accepted(&mut self, attempts_taken: u32) {
        if let Some(pending) = self.submission.as_mut() {
            pending.accept(attempts_taken);
        }
        self.notice = None;
    }

    pub fn record_write_failed(&mut self, error: String) {
        if let Some(pending) = self.submission.as_mut() {
            pending.fail(error);
        }
        self.notice = Some(Notice::SubmissionFailed);
    }

    fn result_view(&self, now: DateTime<Utc>) -> Option<ResultView> {
        let pending = self.submission.as_ref()?;
        let reveal = may_reveal_score(self.test.results_visibility, self.assignment.due_at, now);
        Some(ResultView {
            write_status: pending.status,
            trigger: pending.record.trigger,
            score: reveal.then_some(pending.record.score),
            total_questions: pending.record.total_questions,
            attempts_taken: pending.attempts_taken,
            submitted_at: pending.record.submitted_at,
            last_error: pending.last_error.clone(),
        })
    }

    pub fn view(&self, now: DateTime<Utc>) -> AttemptView {
        let taking = self.phase == Phase::Taking;
        AttemptView {
            phase: self.phase,
            title: self.test.title.clone(),
            total_questions: self.test.questions.len(),
            duration_minutes: self.test.duration_minutes,
            time_remaining_secs: self
                .snapshot
                .end_time
                .filter(|_| taking)
                .map(|end| time_remaining(end, now).num_seconds()),
            current_index: self.snapshot.current_index,
            question: taking
                .then(|| self.test.questions.get(self.snapshot.current_index))
                .flatten()
                .map(PublicQuestion::from),
            answers: self.snapshot.answers.clone(),
            flagged: self.snapshot.flagged.clone(),
            tab_switch_count: self.snapshot.tab_switch_count,
            confirm_open: self.confirm_open,
            notice: self.notice,
            result: self.result_view(now),
        }
    }
}

impl Drop for Attempt {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

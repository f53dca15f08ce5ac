// tests/common/mod.rs

#![allow(dead_code)]

use std::{collections::BTreeMap, sync::Arc, time::Duration as StdDuration};

use assessment::{
    models::assignment::{AssignmentConfig, Question, ResultsVisibility, TestContent},
    providers::{
        SubmissionStore,
        memory::{MemoryContent, MemoryNotifier, MemorySubmissions},
    },
    session::{
        Collaborators, SessionRuntime,
        store::MemorySessionStore,
        timer::{Clock, ManualClock},
    },
};
use chrono::{DateTime, TimeZone, Utc};

pub const CLASS_ID: i64 = 1;
pub const ASSIGNMENT_ID: i64 = 10;
pub const TEST_ID: i64 = 100;
pub const TEACHER_ID: i64 = 500;
pub const USER_ID: i64 = 42;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap()
}

pub fn assignment(allowed_attempts: u32, due_at: Option<DateTime<Utc>>) -> AssignmentConfig {
    AssignmentConfig {
        id: ASSIGNMENT_ID,
        class_id: CLASS_ID,
        teacher_id: TEACHER_ID,
        test_id: TEST_ID,
        open_at: None,
        due_at,
        allowed_attempts,
    }
}

/// Three questions (ids 1, 2, 3) whose correct answers are A, B and C.
pub fn three_question_test(duration_minutes: u32, visibility: ResultsVisibility) -> TestContent {
    let questions = ["A", "B", "C"]
        .iter()
        .enumerate()
        .map(|(i, correct)| Question {
            id: i as i64 + 1,
            prompt: format!("Question {}", i + 1),
            options: ["A", "B", "C", "D"]
                .iter()
                .map(|k| (k.to_string(), format!("Option {}", k)))
                .collect::<BTreeMap<_, _>>(),
            correct_answer: correct.to_string(),
        })
        .collect();

    TestContent {
        id: TEST_ID,
        title: "Chapter 3 quiz".to_string(),
        duration_minutes,
        questions,
        results_visibility: visibility,
    }
}

pub struct Fixture {
    pub runtime: SessionRuntime,
    pub content: Arc<MemoryContent>,
    pub submissions: Arc<MemorySubmissions>,
    pub sessions: Arc<MemorySessionStore>,
    pub notifier: Arc<MemoryNotifier>,
    pub clock: ManualClock,
}

impl Fixture {
    pub async fn new(assignment: AssignmentConfig, test: TestContent) -> Self {
        let content = Arc::new(MemoryContent::new());
        content.insert_assignment(assignment).await;
        content.insert_test(test).await;

        let submissions = Arc::new(MemorySubmissions::new());
        let sessions = Arc::new(MemorySessionStore::new());
        let notifier = Arc::new(MemoryNotifier::new());
        let clock = ManualClock::new(t0());

        let runtime = build_runtime(&content, &submissions, &sessions, &notifier, clock.clone());
        Self {
            runtime,
            content,
            submissions,
            sessions,
            notifier,
            clock,
        }
    }

    /// Same stores, but submission writes go through `submissions`.
    pub fn runtime_with_submissions(&self, submissions: Arc<dyn SubmissionStore>) -> SessionRuntime {
        let deps = Collaborators {
            content: self.content.clone(),
            history: self.submissions.clone(),
            submissions,
            sessions: self.sessions.clone(),
            notifier: self.notifier.clone(),
            clock: Arc::new(self.clock.clone()),
        };
        SessionRuntime::new(deps, StdDuration::from_secs(1))
    }

    /// A fresh runtime over the same stores, as after a process restart or reload.
    pub fn restart(&self) -> SessionRuntime {
        build_runtime(
            &self.content,
            &self.submissions,
            &self.sessions,
            &self.notifier,
            self.clock.clone(),
        )
    }
}

pub fn build_runtime(
    content: &Arc<MemoryContent>,
    submissions: &Arc<MemorySubmissions>,
    sessions: &Arc<MemorySessionStore>,
    notifier: &Arc<MemoryNotifier>,
    clock: impl Clock + 'static,
) -> SessionRuntime {
    let deps = Collaborators {
        content: content.clone(),
        history: submissions.clone(),
        submissions: submissions.clone(),
        sessions: sessions.clone(),
        notifier: notifier.clone(),
        clock: Arc::new(clock),
    };
    SessionRuntime::new(deps, StdDuration::from_secs(1))
}

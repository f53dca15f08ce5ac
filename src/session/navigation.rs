// src/session/navigation.rs

use crate::{
    models::{assignment::Question, session::SessionSnapshot},
    session::error::SessionError,
};

/// A movement request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Next,
    Prev,
    GoTo(usize),
}

/// Result of `finish_or_advance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Moved(usize),
    /// On the last question with gaps; jumped to the first unanswered one.
    MissedQuestion(usize),
    /// Every question is answered; the finish confirmation may open.
    ReadyToFinish,
}

/// Answer and navigation operations over one snapshot.
///
/// Keeps `current_index` inside `[0, len)` and only ever records answers for
/// question ids that belong to the test.
pub struct Navigator<'a> {
    questions: &'a [Question],
    snapshot: &'a mut SessionSnapshot,
}

impl<'a> Navigator<'a> {
    /// `questions` must not be empty.
    pub fn new(questions: &'a [Question], snapshot: &'a mut SessionSnapshot) -> Self {
        Self {
            questions,
            snapshot,
        }
    }

    fn last_index(&self) -> usize {
        self.questions.len().saturating_sub(1)
    }

    fn current(&self) -> &'a Question {
        &self.questions[self.snapshot.current_index.min(self.last_index())]
    }

    pub fn select_answer(&mut self, option: &str) -> Result<(), SessionError> {
        let question = self.current();
        if !question.has_option(option) {
            return Err(SessionError::InvalidOption(option.to_string()));
        }
        self.snapshot
            .answers
            .insert(question.id, option.to_string());
        Ok(())
    }

    /// Returns whether the current question is flagged afterwards.
    pub fn toggle_flag(&mut self) -> bool {
        let id = self.current().id;
        if self.snapshot.flagged.remove(&id) {
            false
        } else {
            self.snapshot.flagged.insert(id);
            true
        }
    }

    pub fn go_to(&mut self, index: usize) -> Result<usize, SessionError> {
        if index >= self.questions.len() {
            return Err(SessionError::IndexOutOfRange {
                index,
                len: self.questions.len(),
            });
        }
        self.snapshot.current_index = index;
        Ok(index)
    }

    pub fn next(&mut self) -> usize {
        self.snapshot.current_index = (self.snapshot.current_index + 1).min(self.last_index());
        self.snapshot.current_index
    }

    pub fn prev(&mut self) -> usize {
        self.snapshot.current_index = self.snapshot.current_index.saturating_sub(1);
        self.snapshot.current_index
    }

    pub fn navigate(&mut self, navigation: Navigation) -> Result<usize, SessionError> {
        match navigation {
            Navigation::Next => Ok(self.next()),
            Navigation::Prev => Ok(self.prev()),
            Navigation::GoTo(index) => self.go_to(index),
        }
    }

    pub fn first_unanswered(&self) -> Option<usize> {
        self.questions
            .iter()
            .position(|q| !self.snapshot.answers.contains_key(&q.id))
    }

    pub fn finish_or_advance(&mut self) -> Advance {
        if self.snapshot.current_index < self.last_index() {
            return Advance::Moved(self.next());
        }

        match self.first_unanswered() {
            Some(index) => {
                self.snapshot.current_index = index;
                Advance::MissedQuestion(index)
            }
            None => Advance::ReadyToFinish,
        }
    }

    /// Repairs a restored snapshot against the current content: clamps the index
    /// and drops answers or flags for questions that no longer exist.
    pub fn sanitize(&mut self) {
        let questions = self.questions;
        let known = |id: &i64| questions.iter().any(|q| q.id == *id);
        self.snapshot.answers.retain(|id, _| known(id));
        self.snapshot.flagged.retain(|id| known(id));
        self.snapshot.current_index = self.snapshot.current_index.min(self.last_index());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn questions(n: i64) -> Vec<Question> {
        (1..=n)
            .map(|id| Question {
                id,
                prompt: format!("Question {}", id),
                options: BTreeMap::from([
                    ("A".to_string(), "yes".to_string()),
                    ("B".to_string(), "no".to_string()),
                ]),
                correct_answer: "A".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_select_answer_overwrites() {
        let qs = questions(2);
        let mut snapshot = SessionSnapshot::default();
        let mut nav = Navigator::new(&qs, &mut snapshot);

        nav.select_answer("A").unwrap();
        nav.select_answer("B").unwrap();
        assert_eq!(snapshot.answers.len(), 1);
        assert_eq!(snapshot.answers[&1], "B");
    }

    #[test]
    fn test_select_unknown_option_rejected() {
        let qs = questions(1);
        let mut snapshot = SessionSnapshot::default();
        let mut nav = Navigator::new(&qs, &mut snapshot);

        let err = nav.select_answer("Z").unwrap_err();
        assert!(matches!(err, SessionError::InvalidOption(ref o) if o == "Z"));
        assert!(snapshot.answers.is_empty());
    }

    #[test]
    fn test_toggle_flag() {
        let qs = questions(2);
        let mut snapshot = SessionSnapshot::default();
        let mut nav = Navigator::new(&qs, &mut snapshot);

        assert!(nav.toggle_flag());
        assert!(!nav.toggle_flag());
        nav.next();
        assert!(nav.toggle_flag());
        assert_eq!(snapshot.flagged.iter().copied().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_navigation_is_bounded() {
        let qs = questions(3);
        let mut snapshot = SessionSnapshot::default();
        let mut nav = Navigator::new(&qs, &mut snapshot);

        assert_eq!(nav.prev(), 0);
        assert_eq!(nav.next(), 1);
        assert_eq!(nav.next(), 2);
        assert_eq!(nav.next(), 2);
        assert_eq!(nav.go_to(0).unwrap(), 0);
        assert!(matches!(
            nav.go_to(3),
            Err(SessionError::IndexOutOfRange { index: 3, len: 3 })
        ));
        assert_eq!(snapshot.current_index, 0);
    }

    #[test]
    fn test_finish_jumps_to_first_missed_question() {
        let qs = questions(3);
        let mut snapshot = SessionSnapshot::default();
        let mut nav = Navigator::new(&qs, &mut snapshot);

        nav.select_answer("A").unwrap();
        assert_eq!(nav.finish_or_advance(), Advance::Moved(1));
        assert_eq!(nav.finish_or_advance(), Advance::Moved(2));
        nav.select_answer("B").unwrap();
        assert_eq!(nav.finish_or_advance(), Advance::MissedQuestion(1));

        nav.select_answer("A").unwrap();
        nav.go_to(2).unwrap();
        assert_eq!(nav.finish_or_advance(), Advance::ReadyToFinish);
        assert_eq!(snapshot.current_index, 2);
    }

    #[test]
    fn test_sanitize_drops_unknown_questions() {
        let qs = questions(2);
        let mut snapshot = SessionSnapshot {
            current_index: 9,
            ..Default::default()
        };
        snapshot.answers.insert(1, "A".to_string());
        snapshot.answers.insert(77, "A".to_string());
        snapshot.flagged.insert(77);

        Navigator::new(&qs, &mut snapshot).sanitize();
        assert_eq!(snapshot.current_index, 1);
        assert_eq!(snapshot.answers.len(), 1);
        assert!(snapshot.flagged.is_empty());
    }
}

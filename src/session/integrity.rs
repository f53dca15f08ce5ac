// src/session/integrity.rs

use serde::Deserialize;

/// Browser events the client forwards while an attempt is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusSignal {
    WindowBlur,
    DocumentHidden,
    WindowFocus,
    DocumentVisible,
    ContextMenu,
}

impl FocusSignal {
    fn is_loss(self) -> bool {
        matches!(self, FocusSignal::WindowBlur | FocusSignal::DocumentHidden)
    }

    fn is_regain(self) -> bool {
        matches!(self, FocusSignal::WindowFocus | FocusSignal::DocumentVisible)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// A new focus loss was counted.
    Counted,
    /// Context menu should be cancelled by the client.
    Suppressed,
    Ignored,
}

/// Counts focus-loss transitions while an attempt is being taken.
///
/// Blur and hidden are the same logical event: a loss is counted once and
/// further loss signals are ignored until focus comes back. The counter is
/// informational only and never blocks the student.
#[derive(Debug, Clone)]
pub struct IntegrityMonitor {
    armed: bool,
    in_focus: bool,
}

impl Default for IntegrityMonitor {
    fn default() -> Self {
        Self {
            armed: false,
            in_focus: true,
        }
    }
}

impl IntegrityMonitor {
    /// Start listening. Focus is assumed present at arm time.
    pub fn arm(&mut self) {
        self.armed = true;
        self.in_focus = true;
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Applies one signal, bumping `tab_switch_count` on a new loss.
    pub fn observe(&mut self, signal: FocusSignal, tab_switch_count: &mut u32) -> SignalOutcome {
        if !self.armed {
            return SignalOutcome::Ignored;
        }

        if signal == FocusSignal::ContextMenu {
            return SignalOutcome::Suppressed;
        }

        if signal.is_loss() {
            if !self.in_focus {
                return SignalOutcome::Ignored;
            }
            self.in_focus = false;
            *tab_switch_count = tab_switch_count.saturating_add(1);
            return SignalOutcome::Counted;
        }

        if signal.is_regain() {
            self.in_focus = true;
        }
        SignalOutcome::Ignored
    }
}

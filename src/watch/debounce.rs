// src/watch/debounce.rs

//! Debounce state machine for watch-triggered runs.
//!
//! Pure: callers pass the current time in, so the transitions can be tested
//! without a runtime or real clock.
//!
//! ```text
//! Idle --change--> Debouncing --deadline--> Running --done--> Idle
//!                   ^    |                     |
//!                   +----+ change (reset)      | change: remembered,
//!                   ^                          | re-enters Debouncing
//!                   +--------------------------+ after the run
//! ```

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::dag::TaskName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    /// Waiting for the window to pass without further changes.
    Debouncing { deadline: Instant },
    /// A run is in flight; `pending` records changes seen meanwhile.
    Running { pending: bool },
}

#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    state: DebounceState,
    due: BTreeSet<TaskName>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: DebounceState::Idle,
            due: BTreeSet::new(),
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Tasks waiting for the next run.
    pub fn due(&self) -> impl Iterator<Item = &str> {
        self.due.iter().map(String::as_str)
    }

    /// Record a change owned by `tasks`.
    ///
    /// The deadline is trailing: every change pushes it to `now + window`.
    pub fn on_change<I>(&mut self, tasks: I, now: Instant)
    where
        I: IntoIterator<Item = TaskName>,
    {
        let mut any = false;
        for task in tasks {
            any = true;
            self.due.insert(task);
        }
        if !any {
            return;
        }

        self.state = match self.state {
            DebounceState::Idle | DebounceState::Debouncing { .. } => DebounceState::Debouncing {
                deadline: now + self.window,
            },
            DebounceState::Running { .. } => DebounceState::Running { pending: true },
        };
    }

    /// When the current window ends, if one is open.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            DebounceState::Debouncing { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// Start a run if the window has passed; returns the tasks to run.
    pub fn poll(&mut self, now: Instant) -> Option<Vec<TaskName>> {
        match self.state {
            DebounceState::Debouncing { deadline } if now >= deadline => {
                self.state = DebounceState::Running { pending: false };
                Some(std::mem::take(&mut self.due).into_iter().collect())
            }
            _ => None,
        }
    }

    /// The in-flight run finished.
    pub fn on_run_complete(&mut self, now: Instant) {
        self.state = match self.state {
            DebounceState::Running { pending: true } if !self.due.is_empty() => {
                DebounceState::Debouncing {
                    deadline: now + self.window,
                }
            }
            _ => DebounceState::Idle,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(100);

    fn t(name: &str) -> Vec<TaskName> {
        vec![name.to_string()]
    }

    #[test]
    fn burst_within_window_yields_one_run() {
        let start = Instant::now();
        let mut d = Debouncer::new(WINDOW);
        assert_eq!(d.state(), DebounceState::Idle);

        for i in 0..10u64 {
            d.on_change(t("css"), start + Duration::from_millis(i * 5));
        }
        // Trailing deadline: last change + window.
        assert_eq!(d.deadline(), Some(start + Duration::from_millis(45) + WINDOW));
        assert!(d.poll(start + Duration::from_millis(100)).is_none());

        let run = d.poll(start + Duration::from_millis(200)).unwrap();
        assert_eq!(run, t("css"));
        assert_eq!(d.state(), DebounceState::Running { pending: false });

        d.on_run_complete(start + Duration::from_millis(300));
        assert_eq!(d.state(), DebounceState::Idle);
        assert!(d.poll(start + Duration::from_secs(10)).is_none());
    }

    #[test]
    fn spaced_changes_yield_one_run_each() {
        let start = Instant::now();
        let mut d = Debouncer::new(WINDOW);
        let mut runs = 0;
        for i in 0..4u64 {
            let at = start + Duration::from_secs(i);
            d.on_change(t("js"), at);
            if d.poll(at + WINDOW).is_some() {
                runs += 1;
                d.on_run_complete(at + WINDOW);
            }
        }
        assert_eq!(runs, 4);
    }

    #[test]
    fn change_during_run_is_remembered() {
        let start = Instant::now();
        let mut d = Debouncer::new(WINDOW);
        d.on_change(t("css"), start);
        d.poll(start + WINDOW).unwrap();

        d.on_change(t("js"), start + WINDOW + Duration::from_millis(1));
        assert_eq!(d.state(), DebounceState::Running { pending: true });
        assert!(d.poll(start + Duration::from_secs(5)).is_none());

        let done = start + Duration::from_millis(500);
        d.on_run_complete(done);
        assert_eq!(d.deadline(), Some(done + WINDOW));
        assert_eq!(d.poll(done + WINDOW).unwrap(), t("js"));
    }

    #[test]
    fn union_of_tasks_is_collected() {
        let start = Instant::now();
        let mut d = Debouncer::new(WINDOW);
        d.on_change(t("js"), start);
        d.on_change(vec!["css".to_string(), "js".to_string()], start);
        assert_eq!(d.due().collect::<Vec<_>>(), vec!["css", "js"]);
        assert_eq!(d.poll(start + WINDOW).unwrap(), vec!["css", "js"]);
    }

    #[test]
    fn change_without_tasks_does_not_open_a_window() {
        let mut d = Debouncer::new(WINDOW);
        d.on_change(Vec::new(), Instant::now());
        assert_eq!(d.state(), DebounceState::Idle);
    }
}

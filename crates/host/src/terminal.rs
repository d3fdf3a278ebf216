//! Terminal-backed permissions, input and display
//!
//! One blocking thread owns stdin. A line answers the oldest open permission
//! question when there is one; otherwise it is a screen command. Once stdin
//! closes, open and later questions are answered with a denial.

use indicatif::ProgressBar;
use sos_beacon::{
    DisplaySurface, EventSender, Permission, PermissionPlatform, PermissionRequestKind,
    ScreenEvent,
};
use sos_cli::output::Status;
use sos_cli::{progress, prompt};
use sos_core::config::PermissionsConfig;
use std::collections::{HashSet, VecDeque};
use std::io::BufRead;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use tracing::{debug, warn};

#[derive(Debug)]
struct Question {
    request_code: i32,
    permissions: Vec<Permission>,
}

#[derive(Debug, Default)]
struct PromptState {
    held: HashSet<Permission>,
    open: VecDeque<Question>,
    input_closed: bool,
}

type SharedPrompts = Arc<Mutex<PromptState>>;

fn lock(state: &SharedPrompts) -> MutexGuard<'_, PromptState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Permissions granted in configuration or by answering a terminal prompt
#[derive(Debug, Clone)]
pub struct TerminalPermissions {
    state: SharedPrompts,
    prompt: bool,
}

impl TerminalPermissions {
    /// Pre-grant the configured kinds
    #[must_use]
    pub fn from_config(config: &PermissionsConfig) -> Self {
        let held = config
            .granted
            .iter()
            .flat_map(|grant| PermissionRequestKind::from(*grant).permissions().iter().copied())
            .collect();

        Self {
            state: Arc::new(Mutex::new(PromptState {
                held,
                open: VecDeque::new(),
                input_closed: false,
            })),
            prompt: config.prompt,
        }
    }

    /// Questions waiting for an answer line
    #[must_use]
    pub fn open_questions(&self) -> usize {
        lock(&self.state).open.len()
    }

    /// Apply an answer line to the oldest open question. Returns `false` when
    /// nothing is open or the line is not a yes/no answer.
    pub fn answer(&self, line: &str, events: &EventSender) -> bool {
        let mut state = lock(&self.state);
        let Some(grant) = prompt::answer_or(line, false) else {
            return false;
        };
        let Some(question) = state.open.pop_front() else {
            return false;
        };

        if grant {
            state.held.extend(question.permissions.iter().copied());
        }
        let next = state.open.front().map(|q| q.permissions.clone());
        drop(state);

        debug!(request_code = question.request_code, grant, "Permission answered");
        events.post(ScreenEvent::PermissionResult {
            request_code: question.request_code,
            grants: vec![grant; question.permissions.len()],
        });

        if let Some(permissions) = next {
            ask(&permissions);
        }
        true
    }

    /// No more answers will arrive: deny every open question and every
    /// later request
    pub fn close_input(&self, events: &EventSender) {
        let open: Vec<Question> = {
            let mut state = lock(&self.state);
            state.input_closed = true;
            state.open.drain(..).collect()
        };

        for question in open {
            debug!(request_code = question.request_code, "Input closed, denying");
            deny(question.request_code, question.permissions.len(), events);
        }
    }
}

fn deny(request_code: i32, count: usize, events: &EventSender) {
    events.post(ScreenEvent::PermissionResult {
        request_code,
        grants: vec![false; count],
    });
}

fn ask(permissions: &[Permission]) {
    let names: Vec<&str> = permissions.iter().map(Permission::as_str).collect();
    let question = format!("Allow the beacon to use {}?", names.join(" and "));
    if let Err(e) = prompt::ask(&question, false) {
        warn!(error = %e, "Could not write permission prompt");
    }
}

impl PermissionPlatform for TerminalPermissions {
    fn is_granted(&self, permission: Permission) -> bool {
        lock(&self.state).held.contains(&permission)
    }

    fn request(
        &mut self,
        request_code: i32,
        permissions: &[Permission],
        events: &EventSender,
    ) -> sos_beacon::Result<()> {
        if !self.prompt {
            debug!(request_code, "Prompting disabled, denying");
            deny(request_code, permissions.len(), events);
            return Ok(());
        }

        let mut state = lock(&self.state);
        if state.input_closed {
            drop(state);
            debug!(request_code, "Input closed, denying");
            deny(request_code, permissions.len(), events);
            return Ok(());
        }
        let first = state.open.is_empty();
        state.open.push_back(Question {
            request_code,
            permissions: permissions.to_vec(),
        });
        drop(state);

        if first {
            ask(permissions);
        }
        Ok(())
    }
}

/// What a non-answer line on stdin may do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Empty line presses SOS, `q` quits
    Interactive,
    /// Only answers and `q` are accepted
    AnswersOnly,
}

/// What one input line meant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    /// Answered a permission question
    Answered,
    /// Posted an event
    Posted,
    /// Nothing to do
    Ignored,
}

/// Route one stdin line
pub fn handle_line(
    line: &str,
    mode: InputMode,
    permissions: &TerminalPermissions,
    events: &EventSender,
) -> InputAction {
    if permissions.open_questions() > 0 && permissions.answer(line, events) {
        return InputAction::Answered;
    }

    match (line.trim(), mode) {
        ("q" | "quit", _) => {
            events.post(ScreenEvent::Shutdown);
            InputAction::Posted
        }
        ("", InputMode::Interactive) => {
            events.post(ScreenEvent::SosPressed);
            InputAction::Posted
        }
        _ => InputAction::Ignored,
    }
}

/// Read stdin on a dedicated thread until EOF. EOF denies pending
/// permission questions; in interactive mode it also posts a shutdown.
pub fn spawn_input(
    mode: InputMode,
    permissions: TerminalPermissions,
    events: EventSender,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            handle_line(&line, mode, &permissions, &events);
        }
        debug!("Input closed");
        permissions.close_input(&events);
        if mode == InputMode::Interactive {
            events.post(ScreenEvent::Shutdown);
        }
    })
}

/// Label and toasts printed through the status helpers, with an optional
/// spinner kept out of their way
#[derive(Debug, Clone, Default)]
pub struct TerminalDisplay {
    spinner: Arc<Mutex<Option<ProgressBar>>>,
}

impl TerminalDisplay {
    /// No spinner running
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Show a spinner until [`finish_spinner`](Self::finish_spinner)
    pub fn start_spinner(&self, message: &str) {
        let mut slot = self.slot();
        if slot.is_none() {
            *slot = Some(progress::spinner(message));
        }
    }

    /// Stop the spinner, if any
    pub fn finish_spinner(&self, ok: bool, message: &str) {
        if let Some(pb) = self.slot().take() {
            if ok {
                progress::finish_success(&pb, message);
            } else {
                progress::finish_error(&pb, message);
            }
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.spinner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn print(&self, f: impl FnOnce()) {
        match self.slot().as_ref() {
            Some(pb) => pb.suspend(f),
            None => f(),
        }
    }
}

impl DisplaySurface for TerminalDisplay {
    fn set_label(&self, text: &str) {
        self.print(|| Status::header(text));
    }

    fn toast(&self, text: &str) {
        self.print(|| Status::info(text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sos_beacon::channel;
    use sos_core::config::PermissionGrant;

    fn config(granted: Vec<PermissionGrant>, prompt: bool) -> PermissionsConfig {
        PermissionsConfig { granted, prompt }
    }

    #[test]
    fn test_pre_granted_kinds() {
        let permissions = TerminalPermissions::from_config(&config(vec![PermissionGrant::Location], true));
        assert!(permissions.is_granted(Permission::FineLocation));
        assert!(permissions.is_granted(Permission::CoarseLocation));
        assert!(!permissions.is_granted(Permission::ReadPhoneState));
    }

    #[test]
    fn test_prompting_disabled_denies() {
        let (events, mut rx) = channel();
        let mut permissions = TerminalPermissions::from_config(&config(vec![], false));

        permissions
            .request(2, &[Permission::ReadPhoneState], &events)
            .unwrap();

        assert_eq!(
            rx.try_next(),
            Some(ScreenEvent::PermissionResult {
                request_code: 2,
                grants: vec![false],
            })
        );
        assert_eq!(permissions.open_questions(), 0);
    }

    #[test]
    fn test_answer_grants_and_posts() {
        let (events, mut rx) = channel();
        let mut permissions = TerminalPermissions::from_config(&config(vec![], true));

        permissions
            .request(1, PermissionRequestKind::LocationAccess.permissions(), &events)
            .unwrap();
        assert!(rx.try_next().is_none());

        assert_eq!(
            handle_line("y", InputMode::Interactive, &permissions, &events),
            InputAction::Answered
        );
        assert_eq!(
            rx.try_next(),
            Some(ScreenEvent::PermissionResult {
                request_code: 1,
                grants: vec![true, true],
            })
        );
        assert!(permissions.is_granted(Permission::FineLocation));
    }

    #[test]
    fn test_questions_answered_in_order() {
        let (events, mut rx) = channel();
        let mut permissions = TerminalPermissions::from_config(&config(vec![], true));

        permissions.request(2, &[Permission::ReadPhoneState], &events).unwrap();
        permissions
            .request(1, PermissionRequestKind::LocationAccess.permissions(), &events)
            .unwrap();

        permissions.answer("n", &events);
        permissions.answer("yes", &events);

        assert_eq!(
            rx.try_next(),
            Some(ScreenEvent::PermissionResult { request_code: 2, grants: vec![false] })
        );
        assert_eq!(
            rx.try_next(),
            Some(ScreenEvent::PermissionResult { request_code: 1, grants: vec![true, true] })
        );
        assert!(!permissions.is_granted(Permission::ReadPhoneState));
    }

    #[test]
    fn test_commands_without_open_question() {
        let (events, mut rx) = channel();
        let permissions = TerminalPermissions::from_config(&config(vec![], true));

        assert_eq!(
            handle_line("", InputMode::Interactive, &permissions, &events),
            InputAction::Posted
        );
        assert_eq!(rx.try_next(), Some(ScreenEvent::SosPressed));

        assert_eq!(
            handle_line("", InputMode::AnswersOnly, &permissions, &events),
            InputAction::Ignored
        );
        assert_eq!(
            handle_line("q", InputMode::AnswersOnly, &permissions, &events),
            InputAction::Posted
        );
        assert_eq!(rx.try_next(), Some(ScreenEvent::Shutdown));
    }

    #[test]
    fn test_closed_input_denies_open_and_later_questions() {
        let (events, mut rx) = channel();
        let mut permissions = TerminalPermissions::from_config(&config(vec![], true));
        permissions.request(2, &[Permission::ReadPhoneState], &events).unwrap();

        permissions.close_input(&events);
        assert_eq!(
            rx.try_next(),
            Some(ScreenEvent::PermissionResult { request_code: 2, grants: vec![false] })
        );
        assert_eq!(permissions.open_questions(), 0);

        permissions
            .request(1, PermissionRequestKind::LocationAccess.permissions(), &events)
            .unwrap();
        assert_eq!(
            rx.try_next(),
            Some(ScreenEvent::PermissionResult { request_code: 1, grants: vec![false, false] })
        );
        assert_eq!(permissions.open_questions(), 0);
        assert!(!permissions.is_granted(Permission::FineLocation));
    }

    #[test]
    fn test_unrecognised_answer_keeps_question_open() {
        let (events, _rx) = channel();
        let mut permissions = TerminalPermissions::from_config(&config(vec![], true));
        permissions.request(2, &[Permission::ReadPhoneState], &events).unwrap();

        assert_eq!(
            handle_line("maybe", InputMode::Interactive, &permissions, &events),
            InputAction::Ignored
        );
        assert_eq!(permissions.open_questions(), 1);
    }
}

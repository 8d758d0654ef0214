//! Form configuration and the ambient context layer.

use crate::bus::DEFAULT_DEBOUNCE;
use crate::hooks::{FormHooks, SubmitAction};
use crate::reconciler::CommitGuard;
use crate::rules::{MessageTable, RuleSet};
use std::fmt;
use std::time::Duration;

/// Configuration for one form.
#[derive(Clone)]
pub struct FormConfig {
    /// Buffering window for registration/unregistration/patch events.
    pub debounce: Duration,
    /// Rules bound for this form.
    pub rules: RuleSet,
    /// Messages for rejected rules.
    pub messages: MessageTable,
    /// Host lifecycle hooks.
    pub hooks: FormHooks,
    /// The externally supplied submit action.
    pub action: Option<SubmitAction>,
    /// Host veto over state commits.
    pub commit_guard: Option<CommitGuard>,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            rules: RuleSet::new(),
            messages: MessageTable::new(),
            hooks: FormHooks::default(),
            action: None,
            commit_guard: None,
        }
    }
}

impl FormConfig {
    /// Layers ambient context under this config. Explicit settings win:
    /// ambient rules run before this form's own bindings for the same
    /// path, ambient messages lose on conflicting rule ids, and the
    /// ambient debounce only applies when the form kept the default.
    #[must_use]
    pub fn with_scope(mut self, scope: &FormScope) -> Self {
        self.rules = RuleSet::merged(&scope.rules, &self.rules);
        self.messages = MessageTable::merged(&scope.messages, &self.messages);
        if let Some(debounce) = scope.debounce {
            if self.debounce == DEFAULT_DEBOUNCE {
                self.debounce = debounce;
            }
        }
        self
    }
}

impl fmt::Debug for FormConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormConfig")
            .field("debounce", &self.debounce)
            .field("rules", &self.rules)
            .field("hooks", &self.hooks)
            .field("action", &self.action.as_ref().map(|_| "<fn>"))
            .finish_non_exhaustive()
    }
}

/// Ambient context shared by many forms (application-wide rules,
/// messages, buffering window).
#[derive(Debug, Clone, Default)]
pub struct FormScope {
    /// Buffering window applied to forms that kept the default.
    pub debounce: Option<Duration>,
    /// Application-wide rules.
    pub rules: RuleSet,
    /// Application-wide messages.
    pub messages: MessageTable,
}

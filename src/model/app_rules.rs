//! Decides whether a window may be managed at all, and where it goes.

use tracing::debug;

use crate::common::config::PolicySettings;
use crate::model::virtual_workspace::WorkspaceIndex;
use crate::sys::window_server::{self, ClassHint, WindowServer, WindowServerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppClass {
    Terminal,
    Browser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Managed {
        class: AppClass,
        workspace: WorkspaceIndex,
    },
    Reject,
}

#[derive(Debug, Clone)]
struct Rule {
    class: AppClass,
    names: Vec<String>,
    workspace: WorkspaceIndex,
}

impl Rule {
    fn matches(&self, value: &str) -> bool {
        self.names.iter().any(|name| name.eq_ignore_ascii_case(value))
    }
}

#[derive(Debug, Clone)]
pub struct AppRules {
    rules: [Rule; 2],
}

impl AppRules {
    pub fn new(policy: &PolicySettings) -> Self {
        let rule = |class, rule: &crate::common::config::AppRule| Rule {
            class,
            names: rule.classes.clone(),
            workspace: rule.workspace,
        };
        Self {
            rules: [
                rule(AppClass::Terminal, &policy.terminal),
                rule(AppClass::Browser, &policy.browser),
            ],
        }
    }

    /// `res_class` is consulted before `res_name`; each is checked against
    /// both lists. Missing strings never match.
    pub fn classify(&self, hint: Option<&ClassHint>) -> Classification {
        let Some(hint) = hint else {
            return Classification::Reject;
        };
        [hint.res_class.as_deref(), hint.res_name.as_deref()]
            .into_iter()
            .flatten()
            .find_map(|value| self.rules.iter().find(|rule| rule.matches(value)))
            .map_or(Classification::Reject, |rule| Classification::Managed {
                class: rule.class,
                workspace: rule.workspace,
            })
    }

    pub fn classify_window<S: WindowServer + ?Sized>(
        &self,
        server: &S,
        window: WindowServerId,
    ) -> window_server::Result<Classification> {
        let hint = server.class_hint(window)?;
        let result = self.classify(hint.as_ref());
        debug!(?window, ?hint, ?result, "Classified window");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hint(name: Option<&str>, class: Option<&str>) -> ClassHint {
        ClassHint {
            res_name: name.map(String::from),
            res_class: class.map(String::from),
        }
    }

    fn rules() -> AppRules { AppRules::new(&PolicySettings::default()) }

    #[test]
    fn matches_class_case_insensitively() {
        let rules = rules();
        assert_eq!(
            rules.classify(Some(&hint(Some("xterm"), Some("XTerm")))),
            Classification::Managed { class: AppClass::Terminal, workspace: 0 }
        );
        assert_eq!(
            rules.classify(Some(&hint(Some("Navigator"), Some("FIREFOX")))),
            Classification::Managed { class: AppClass::Browser, workspace: 1 }
        );
    }

    #[test]
    fn falls_back_to_instance_name() {
        let rules = rules();
        assert_eq!(
            rules.classify(Some(&hint(Some("urxvt"), None))),
            Classification::Managed { class: AppClass::Terminal, workspace: 0 }
        );
        assert_eq!(
            rules.classify(Some(&hint(Some("kitty"), Some("SomethingElse")))),
            Classification::Managed { class: AppClass::Terminal, workspace: 0 }
        );
    }

    #[test]
    fn rejects_unknown_or_missing_hints() {
        let rules = rules();
        assert_eq!(rules.classify(None), Classification::Reject);
        assert_eq!(rules.classify(Some(&hint(None, None))), Classification::Reject);
        assert_eq!(
            rules.classify(Some(&hint(Some("gimp"), Some("Gimp")))),
            Classification::Reject
        );
        // Substrings are not enough.
        assert_eq!(rules.classify(Some(&hint(None, Some("xterm-256")))), Classification::Reject);
    }

    #[test]
    fn class_takes_precedence_over_name() {
        let rules = rules();
        assert_eq!(
            rules.classify(Some(&hint(Some("firefox"), Some("kitty")))),
            Classification::Managed { class: AppClass::Terminal, workspace: 0 }
        );
    }

    #[test]
    fn classification_is_stable() {
        let rules = rules();
        let h = hint(Some("Navigator"), Some("Firefox"));
        let first = rules.classify(Some(&h));
        for _ in 0..10 {
            assert_eq!(rules.classify(Some(&h)), first);
        }
    }
}

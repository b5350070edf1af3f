//! Condition interpretation for modifier calls.
//!
//! Every modifier (`skip`, `fixme`, `slow`, `flaky`, `fail`) accepts the same
//! four argument shapes. They all collapse into an [`Interpreted`] value
//! before the modifier decides whether to apply.

/// The argument shapes accepted by modifier methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// No arguments: the modifier applies unconditionally.
    Always,
    /// A single string: applies, with the string as the reason.
    Reason(String),
    /// A single boolean: applies iff `true`.
    When(bool),
    /// A boolean followed by a reason.
    WhenWithReason(bool, String),
}

/// Uniform result of interpreting a [`Condition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreted {
    pub applies: bool,
    pub reason: Option<String>,
}

impl Condition {
    pub fn interpret(self) -> Interpreted {
        match self {
            Condition::Always => Interpreted {
                applies: true,
                reason: None,
            },
            Condition::Reason(reason) => Interpreted {
                applies: true,
                reason: Some(reason),
            },
            Condition::When(applies) => Interpreted {
                applies,
                reason: None,
            },
            Condition::WhenWithReason(applies, reason) => Interpreted {
                applies,
                reason: Some(reason),
            },
        }
    }
}

impl From<()> for Condition {
    fn from(_: ()) -> Self {
        Condition::Always
    }
}

impl From<bool> for Condition {
    fn from(applies: bool) -> Self {
        Condition::When(applies)
    }
}

impl From<&str> for Condition {
    fn from(reason: &str) -> Self {
        Condition::Reason(reason.to_string())
    }
}

impl From<String> for Condition {
    fn from(reason: String) -> Self {
        Condition::Reason(reason)
    }
}

impl From<(bool, &str)> for Condition {
    fn from((applies, reason): (bool, &str)) -> Self {
        Condition::WhenWithReason(applies, reason.to_string())
    }
}

impl From<(bool, String)> for Condition {
    fn from((applies, reason): (bool, String)) -> Self {
        Condition::WhenWithReason(applies, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interpret(c: impl Into<Condition>) -> Interpreted {
        c.into().interpret()
    }

    #[test]
    fn no_arguments_always_applies() {
        let i = interpret(());
        assert!(i.applies);
        assert_eq!(i.reason, None);
    }

    #[test]
    fn string_applies_with_reason() {
        let i = interpret("flaky on CI");
        assert!(i.applies);
        assert_eq!(i.reason.as_deref(), Some("flaky on CI"));
    }

    #[test]
    fn boolean_controls_application() {
        assert!(interpret(true).applies);
        assert!(!interpret(false).applies);
        assert_eq!(interpret(true).reason, None);
    }

    #[test]
    fn boolean_with_reason_keeps_reason_verbatim() {
        let i = interpret((false, "only on linux"));
        assert!(!i.applies);
        assert_eq!(i.reason.as_deref(), Some("only on linux"));

        let i = interpret((true, String::from("slow disk")));
        assert!(i.applies);
        assert_eq!(i.reason.as_deref(), Some("slow disk"));
    }
}

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Receives user-visible warnings raised while serving a request.
pub trait Notifier {
    fn notify(&self, message: &str);
}

/// Collects notices so the router can attach them to the current response.
#[derive(Clone, Default)]
pub struct NoticeBuffer {
    pending: Rc<RefCell<Vec<String>>>,
}

impl NoticeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.pending.borrow_mut())
    }
}

impl Notifier for NoticeBuffer {
    fn notify(&self, message: &str) {
        self.pending.borrow_mut().push(message.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarnPolicy {
    /// First warning per process only.
    Once,
    Always,
    /// At most one warning per interval.
    Interval(Duration),
}

impl WarnPolicy {
    /// Accepts `once`, `always` or `interval:<seconds>`.
    pub fn parse(s: &str) -> Option<WarnPolicy> {
        let t = s.trim().to_ascii_lowercase();
        match t.as_str() {
            "once" => Some(WarnPolicy::Once),
            "always" => Some(WarnPolicy::Always),
            _ => {
                let secs = t.strip_prefix("interval:")?.trim().parse::<u64>().ok()?;
                Some(WarnPolicy::Interval(Duration::from_secs(secs)))
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            WarnPolicy::Once => "once".to_string(),
            WarnPolicy::Always => "always".to_string(),
            WarnPolicy::Interval(d) => format!("interval:{}", d.as_secs()),
        }
    }
}

/// Decides whether a warning may reach the user right now.
#[derive(Debug, Clone)]
pub struct WarnGate {
    policy: WarnPolicy,
    last_shown: Option<Instant>,
}

impl WarnGate {
    pub fn new(policy: WarnPolicy) -> Self {
        Self {
            policy,
            last_shown: None,
        }
    }

    pub fn policy(&self) -> WarnPolicy {
        self.policy
    }

    pub fn has_shown(&self) -> bool {
        self.last_shown.is_some()
    }

    pub fn reset(&mut self, policy: WarnPolicy) {
        self.policy = policy;
        self.last_shown = None;
    }

    pub fn allow(&mut self, now: Instant) -> bool {
        let open = match (self.policy, self.last_shown) {
            (_, None) => true,
            (WarnPolicy::Once, Some(_)) => false,
            (WarnPolicy::Always, Some(_)) => true,
            (WarnPolicy::Interval(d), Some(prev)) => now.duration_since(prev) >= d,
        };
        if open {
            self.last_shown = Some(now);
        }
        open
    }
}

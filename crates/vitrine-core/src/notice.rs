//! Transient user notices
//!
//! Nothing in the pipeline is fatal. Failures and state changes the user
//! should know about end up here and are shown briefly by the front end.

use std::collections::VecDeque;
use std::time::Duration;

/// How long a notice stays on screen
pub const NOTICE_DURATION: Duration = Duration::from_millis(6500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// FIFO of notices waiting to be shown
#[derive(Debug, Clone, Default)]
pub struct Notices {
    queue: VecDeque<Notice>,
}

impl Notices {
    pub fn push(&mut self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error => tracing::warn!(message = %notice.message, "Notice"),
            _ => tracing::info!(message = %notice.message, "Notice"),
        }
        self.queue.push_back(notice);
    }

    pub fn pop(&mut self) -> Option<Notice> {
        self.queue.pop_front()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Notice> + '_ {
        self.queue.drain(..)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.queue.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notices_fifo() {
        let mut notices = Notices::default();
        notices.push(Notice::info("first"));
        notices.push(Notice::error("second"));
        assert_eq!(notices.len(), 2);
        assert_eq!(notices.pop().map(|n| n.message), Some("first".to_string()));
        let rest: Vec<_> = notices.drain().collect();
        assert_eq!(rest, vec![Notice::error("second")]);
        assert!(notices.is_empty());
    }
}

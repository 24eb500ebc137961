use crate::object::Source;
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EventMethod {
    Add,
    Update,
    Delete,
}

impl fmt::Display for EventMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventMethod::Add => "add",
            EventMethod::Update => "update",
            EventMethod::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// One lifecycle change handed to the reconciler.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub method: EventMethod,
    pub source: Source,
}

impl Event {
    pub fn new(method: EventMethod, source: impl Into<Source>) -> Self {
        Event {
            method,
            source: source.into(),
        }
    }

    pub fn add(source: impl Into<Source>) -> Self {
        Self::new(EventMethod::Add, source)
    }

    pub fn update(source: impl Into<Source>) -> Self {
        Self::new(EventMethod::Update, source)
    }

    pub fn delete(source: impl Into<Source>) -> Self {
        Self::new(EventMethod::Delete, source)
    }
}

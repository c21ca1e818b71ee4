// Change notifications emitted on active-copy transitions

use serde::{Deserialize, Serialize};

use crate::model::InstanceInfo;
use crate::source::Source;

/// Type of active-copy transition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Add,
    Modify,
    Delete,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Add => write!(f, "ADD"),
            ChangeKind::Modify => write!(f, "MODIFY"),
            ChangeKind::Delete => write!(f, "DELETE"),
        }
    }
}

/// Notification delivered to interest subscribers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub kind: ChangeKind,
    pub data: InstanceInfo,
}

impl ChangeNotification {
    pub fn add(data: InstanceInfo) -> Self {
        Self {
            kind: ChangeKind::Add,
            data,
        }
    }

    pub fn modify(data: InstanceInfo) -> Self {
        Self {
            kind: ChangeKind::Modify,
            data,
        }
    }

    pub fn delete(data: InstanceInfo) -> Self {
        Self {
            kind: ChangeKind::Delete,
            data,
        }
    }
}

/// Notification together with the source of the copy it describes
///
/// For `Add`/`Modify` the source is the new active copy's; for `Delete` it
/// is the source of the last active copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourcedChangeNotification {
    pub notification: ChangeNotification,
    pub source: Source,
}

impl SourcedChangeNotification {
    pub fn new(kind: ChangeKind, data: InstanceInfo, source: Source) -> Self {
        Self {
            notification: ChangeNotification { kind, data },
            source,
        }
    }

    pub fn kind(&self) -> ChangeKind {
        self.notification.kind
    }

    pub fn data(&self) -> &InstanceInfo {
        &self.notification.data
    }

    pub fn into_notification(self) -> ChangeNotification {
        self.notification
    }
}

//! Per-instance merge holder
//!
//! A `MultiSourcedHolder` owns every copy of one instance id, one copy per
//! distinct `Source`. The active copy is the one with the highest origin
//! precedence; among copies of the same origin the most recently written
//! one wins (arrival order within this holder). Only transitions of the
//! active copy produce notifications.

use std::collections::HashMap;

use crate::model::InstanceInfo;
use crate::notification::{ChangeKind, SourcedChangeNotification};
use crate::source::Source;

#[derive(Clone, Debug)]
struct SourcedCopy {
    record: InstanceInfo,
    /// Holder-local write sequence, strictly increasing
    sequence: u64,
}

/// Result of removing a copy from a holder
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// No copy was held for the source
    Absent,
    /// The copy was removed; carries the notification if the active copy changed
    Removed(Option<SourcedChangeNotification>),
}

impl RemoveOutcome {
    pub fn is_removed(&self) -> bool {
        matches!(self, RemoveOutcome::Removed(_))
    }

    pub fn notification(&self) -> Option<&SourcedChangeNotification> {
        match self {
            RemoveOutcome::Removed(notification) => notification.as_ref(),
            RemoveOutcome::Absent => None,
        }
    }

    pub fn into_notification(self) -> Option<SourcedChangeNotification> {
        match self {
            RemoveOutcome::Removed(notification) => notification,
            RemoveOutcome::Absent => None,
        }
    }
}

/// All copies of a single instance id, keyed by source
#[derive(Clone, Debug)]
pub struct MultiSourcedHolder {
    id: String,
    copies: HashMap<Source, SourcedCopy>,
    /// Cached winner, recomputed on every put/remove
    active: Option<Source>,
    write_sequence: u64,
}

impl MultiSourcedHolder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            copies: HashMap::new(),
            active: None,
            write_sequence: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of distinct sources currently held
    pub fn size(&self) -> usize {
        self.copies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }

    pub fn active_copy(&self) -> Option<&InstanceInfo> {
        self.active
            .as_ref()
            .and_then(|source| self.copies.get(source))
            .map(|copy| &copy.record)
    }

    pub fn active_source(&self) -> Option<&Source> {
        self.active.as_ref()
    }

    /// Copy held for `source`, whether active or not
    pub fn get(&self, source: &Source) -> Option<&InstanceInfo> {
        self.copies.get(source).map(|copy| &copy.record)
    }

    /// All held copies, in no particular order
    pub fn copies(&self) -> impl Iterator<Item = (&Source, &InstanceInfo)> {
        self.copies.iter().map(|(source, copy)| (source, &copy.record))
    }

    /// Insert or replace the copy written by `source`
    pub fn put(&mut self, source: Source, record: InstanceInfo) -> Option<SourcedChangeNotification> {
        let was_empty = self.copies.is_empty();
        let previous = self.active_entry();

        self.write_sequence += 1;
        self.copies.insert(
            source,
            SourcedCopy {
                record,
                sequence: self.write_sequence,
            },
        );
        self.active = self.select_active();

        let (active_source, active_record) = self.active_entry()?;
        if was_empty {
            return Some(SourcedChangeNotification::new(
                ChangeKind::Add,
                active_record,
                active_source,
            ));
        }

        match previous {
            Some((prev_source, prev_record))
                if prev_source == active_source && prev_record == active_record =>
            {
                None
            }
            _ => Some(SourcedChangeNotification::new(
                ChangeKind::Modify,
                active_record,
                active_source,
            )),
        }
    }

    /// Remove the copy written by `source`, if any
    pub fn remove(&mut self, source: &Source) -> RemoveOutcome {
        let was_active = self.active.as_ref() == Some(source);
        let Some(removed) = self.copies.remove(source) else {
            return RemoveOutcome::Absent;
        };

        if self.copies.is_empty() {
            self.active = None;
            return RemoveOutcome::Removed(Some(SourcedChangeNotification::new(
                ChangeKind::Delete,
                removed.record,
                source.clone(),
            )));
        }

        if !was_active {
            return RemoveOutcome::Removed(None);
        }

        self.active = self.select_active();
        RemoveOutcome::Removed(self.active_entry().map(|(active_source, active_record)| {
            SourcedChangeNotification::new(ChangeKind::Modify, active_record, active_source)
        }))
    }

    fn active_entry(&self) -> Option<(Source, InstanceInfo)> {
        let source = self.active.as_ref()?;
        self.copies
            .get(source)
            .map(|copy| (source.clone(), copy.record.clone()))
    }

    fn select_active(&self) -> Option<Source> {
        self.copies
            .iter()
            .max_by_key(|(source, copy)| (source.origin.precedence(), copy.sequence))
            .map(|(source, _)| source.clone())
    }
}

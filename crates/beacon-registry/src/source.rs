//! Provenance of registry writes
//!
//! Every copy held by the registry is tagged with the `Source` that wrote it.
//! The origin class carries a fixed precedence used to pick the active copy.

use serde::{Deserialize, Serialize};

use beacon_common::LOCAL_WRITER_ID;

/// Category of writer that produced a registration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Registered directly by a client connected to this server
    Local,
    /// Received from a peer replication stream
    Replicated,
    /// Loaded at startup by the bootstrap loader
    Bootstrap,
    /// Learned through an interest subscription to another registry
    Interested,
}

impl Origin {
    /// Fixed precedence; higher wins
    pub fn precedence(self) -> u8 {
        match self {
            Origin::Local => 3,
            Origin::Replicated => 2,
            Origin::Bootstrap => 1,
            Origin::Interested => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Origin::Local => "local",
            Origin::Replicated => "replicated",
            Origin::Bootstrap => "bootstrap",
            Origin::Interested => "interested",
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Origin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Origin::Local),
            "replicated" => Ok(Origin::Replicated),
            "bootstrap" => Ok(Origin::Bootstrap),
            "interested" => Ok(Origin::Interested),
            _ => Err(format!("Invalid origin: {}", s)),
        }
    }
}

/// Writer identity: origin class plus an optional writer id
///
/// Both fields participate in equality and hashing, so two replication
/// peers produce two distinct copies of the same instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub origin: Origin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writer_id: Option<String>,
}

impl Source {
    pub fn new(origin: Origin, writer_id: Option<String>) -> Self {
        Self { origin, writer_id }
    }

    pub fn local() -> Self {
        Self::new(Origin::Local, Some(LOCAL_WRITER_ID.to_string()))
    }

    pub fn replicated(peer: impl Into<String>) -> Self {
        Self::new(Origin::Replicated, Some(peer.into()))
    }

    pub fn bootstrap(name: impl Into<String>) -> Self {
        Self::new(Origin::Bootstrap, Some(name.into()))
    }

    /// Matcher accepting every writer of `origin`
    pub fn matcher_for(origin: Origin) -> SourceMatcher {
        SourceMatcher::Origin(origin)
    }

    /// Matcher for this source; a source without a writer id matches its whole origin
    pub fn matcher(&self) -> SourceMatcher {
        match self.writer_id {
            Some(_) => SourceMatcher::Exact(self.clone()),
            None => SourceMatcher::Origin(self.origin),
        }
    }
}

impl From<Origin> for Source {
    fn from(origin: Origin) -> Self {
        Self::new(origin, None)
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.writer_id {
            Some(id) => write!(f, "{}:{}", self.origin, id),
            None => write!(f, "{}", self.origin),
        }
    }
}

/// Predicate over sources, used to filter interest streams by provenance
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum SourceMatcher {
    #[default]
    Any,
    Origin(Origin),
    Exact(Source),
}

impl SourceMatcher {
    pub fn matches(&self, source: &Source) -> bool {
        match self {
            SourceMatcher::Any => true,
            SourceMatcher::Origin(origin) => source.origin == *origin,
            SourceMatcher::Exact(expected) => expected == source,
        }
    }
}

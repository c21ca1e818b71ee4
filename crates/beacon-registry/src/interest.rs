//! Interest model for subscriptions and snapshots
//!
//! An `Interest` is a closed set of predicates over instance records. The
//! composite `Union` variant may nest arbitrarily; `flatten` and `compose`
//! convert between that tree and the flat leaf list carried on the wire by
//! `InterestRegistration`.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::model::InstanceInfo;

/// Selection predicate over instance records
///
/// Two `Union`s are equal when their flattened leaf sequences are equal, so
/// `Union[a, Union[b, c]] == Union[a, b, c]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum Interest {
    /// Exact instance id
    Instance(String),
    /// Exact application name
    Application(String),
    /// Exact VIP address
    Vip(String),
    /// Exact secure VIP address
    SecureVip(String),
    /// Every record in the registry
    FullRegistry,
    /// Matches when any child matches
    Union(Vec<Interest>),
}

impl Interest {
    pub fn for_full_registry() -> Self {
        Interest::FullRegistry
    }

    pub fn for_instances<S: AsRef<str>>(ids: &[S]) -> Self {
        Self::compose(
            ids.iter()
                .map(|id| Interest::Instance(id.as_ref().to_string()))
                .collect(),
        )
    }

    pub fn for_applications<S: AsRef<str>>(names: &[S]) -> Self {
        Self::compose(
            names
                .iter()
                .map(|name| Interest::Application(name.as_ref().to_string()))
                .collect(),
        )
    }

    pub fn for_vips<S: AsRef<str>>(vips: &[S]) -> Self {
        Self::compose(
            vips.iter()
                .map(|vip| Interest::Vip(vip.as_ref().to_string()))
                .collect(),
        )
    }

    pub fn for_secure_vips<S: AsRef<str>>(vips: &[S]) -> Self {
        Self::compose(
            vips.iter()
                .map(|vip| Interest::SecureVip(vip.as_ref().to_string()))
                .collect(),
        )
    }

    /// Check whether a record satisfies this interest
    pub fn matches(&self, record: &InstanceInfo) -> bool {
        match self {
            Interest::Instance(id) => record.id == *id,
            Interest::Application(name) => record.app == *name,
            Interest::Vip(vip) => record.vip_address.as_deref() == Some(vip.as_str()),
            Interest::SecureVip(vip) => {
                record.secure_vip_address.as_deref() == Some(vip.as_str())
            }
            Interest::FullRegistry => true,
            Interest::Union(children) => children.iter().any(|child| child.matches(record)),
        }
    }

    pub fn is_union(&self) -> bool {
        matches!(self, Interest::Union(_))
    }

    /// Expand nested unions depth-first, left-to-right, into leaf interests
    pub fn flatten(&self) -> Vec<Interest> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves(&self, leaves: &mut Vec<Interest>) {
        match self {
            Interest::Union(children) => {
                for child in children {
                    child.collect_leaves(leaves);
                }
            }
            leaf => leaves.push(leaf.clone()),
        }
    }

    /// Inverse of `flatten`: a single leaf stays as is, anything else becomes a `Union`
    pub fn compose(mut leaves: Vec<Interest>) -> Interest {
        if leaves.len() == 1 {
            return leaves.remove(0);
        }
        Interest::Union(leaves)
    }
}

impl PartialEq for Interest {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Interest::Instance(a), Interest::Instance(b)) => a == b,
            (Interest::Application(a), Interest::Application(b)) => a == b,
            (Interest::Vip(a), Interest::Vip(b)) => a == b,
            (Interest::SecureVip(a), Interest::SecureVip(b)) => a == b,
            (Interest::FullRegistry, Interest::FullRegistry) => true,
            (Interest::Union(_), Interest::Union(_)) => self.flatten() == other.flatten(),
            _ => false,
        }
    }
}

impl Eq for Interest {}

impl Hash for Interest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Interest::Instance(value)
            | Interest::Application(value)
            | Interest::Vip(value)
            | Interest::SecureVip(value) => value.hash(state),
            Interest::FullRegistry => {}
            Interest::Union(_) => self.flatten().hash(state),
        }
    }
}

impl std::fmt::Display for Interest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Interest::Instance(id) => write!(f, "InstanceInterest{{id={}}}", id),
            Interest::Application(name) => write!(f, "ApplicationInterest{{app={}}}", name),
            Interest::Vip(vip) => write!(f, "VipInterest{{vip={}}}", vip),
            Interest::SecureVip(vip) => write!(f, "SecureVipInterest{{vip={}}}", vip),
            Interest::FullRegistry => write!(f, "FullRegistryInterest"),
            Interest::Union(children) => {
                write!(f, "MultipleInterests{{")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Flat wire form of an interest registration
///
/// Two registrations are equal iff their flattened leaf sequences are equal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterestRegistration {
    interests: Vec<Interest>,
}

impl InterestRegistration {
    pub fn new(interest: &Interest) -> Self {
        Self {
            interests: interest.flatten(),
        }
    }

    /// Build from a leaf list as received on the wire; nested unions are flattened
    pub fn from_leaves(leaves: Vec<Interest>) -> Self {
        Self {
            interests: leaves.iter().flat_map(Interest::flatten).collect(),
        }
    }

    pub fn interests(&self) -> &[Interest] {
        &self.interests
    }

    pub fn to_composite(&self) -> Interest {
        Interest::compose(self.interests.clone())
    }
}

impl From<&Interest> for InterestRegistration {
    fn from(interest: &Interest) -> Self {
        Self::new(interest)
    }
}

impl std::fmt::Display for InterestRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RegisterInterestSet{{interests=[")?;
        for (i, interest) in self.interests.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", interest)?;
        }
        write!(f, "]}}")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;
    use crate::model::InstanceStatus;

    fn record(id: &str, app: &str) -> InstanceInfo {
        InstanceInfo::builder(id, app)
            .with_status(InstanceStatus::Up)
            .with_vip_address(format!("{}:80", app))
            .build()
    }

    #[test]
    fn test_leaf_matches() {
        let r = record("i-1", "discovery");
        assert!(Interest::Instance("i-1".to_string()).matches(&r));
        assert!(!Interest::Instance("i-2".to_string()).matches(&r));
        assert!(Interest::Application("discovery".to_string()).matches(&r));
        assert!(!Interest::Application("zuul".to_string()).matches(&r));
        assert!(Interest::Vip("discovery:80".to_string()).matches(&r));
        assert!(!Interest::SecureVip("discovery:443".to_string()).matches(&r));
        assert!(Interest::FullRegistry.matches(&r));
    }

    #[test]
    fn test_union_matches_any_child() {
        let interest = Interest::for_applications(&["zuul", "discovery"]);
        assert!(interest.is_union());
        assert!(interest.matches(&record("i-1", "discovery")));
        assert!(interest.matches(&record("i-2", "zuul")));
        assert!(!interest.matches(&record("i-3", "edge")));
    }

    #[test]
    fn test_empty_union_matches_nothing() {
        let interest = Interest::compose(vec![]);
        assert!(!interest.matches(&record("i-1", "discovery")));
        assert!(interest.flatten().is_empty());
    }

    #[test]
    fn test_flatten_depth_first_left_to_right() {
        let a = Interest::Instance("a".to_string());
        let b = Interest::Application("b".to_string());
        let c = Interest::Vip("c".to_string());
        let d = Interest::FullRegistry;
        let nested = Interest::Union(vec![
            a.clone(),
            Interest::Union(vec![b.clone(), Interest::Union(vec![c.clone()])]),
            d.clone(),
        ]);

        assert_eq!(nested.flatten(), vec![a, b, c, d]);
    }

    #[test]
    fn test_compose_single_leaf_is_unchanged() {
        let leaf = Interest::Application("discovery".to_string());
        assert_eq!(Interest::compose(vec![leaf.clone()]), leaf);
        assert!(!Interest::for_instances(&["only"]).is_union());
    }

    #[test]
    fn test_union_equality_by_flattened_leaves() {
        let a = Interest::Instance("a".to_string());
        let b = Interest::Instance("b".to_string());
        let c = Interest::Instance("c".to_string());

        let nested = Interest::Union(vec![a.clone(), Interest::Union(vec![b.clone(), c.clone()])]);
        let flat = Interest::Union(vec![a.clone(), b.clone(), c.clone()]);
        let reordered = Interest::Union(vec![b, a, c]);

        assert_eq!(nested, flat);
        assert_ne!(flat, reordered);

        let mut set = HashSet::new();
        set.insert(nested);
        assert!(set.contains(&flat));
    }

    #[test]
    fn test_interest_registration_roundtrip_shape() {
        let interest = Interest::Union(vec![
            Interest::for_applications(&["zuul", "discovery"]),
            Interest::Instance("i-9".to_string()),
        ]);

        let registration = InterestRegistration::new(&interest);
        assert_eq!(registration.interests().len(), 3);
        assert!(registration.interests().iter().all(|i| !i.is_union()));
        assert_eq!(registration.to_composite(), interest);
    }

    #[test]
    fn test_interest_registration_equality() {
        let first = InterestRegistration::new(&Interest::Union(vec![
            Interest::Instance("a".to_string()),
            Interest::Union(vec![Interest::Instance("b".to_string())]),
        ]));
        let second = InterestRegistration::from_leaves(vec![
            Interest::Instance("a".to_string()),
            Interest::Instance("b".to_string()),
        ]);
        let third = InterestRegistration::from_leaves(vec![
            Interest::Instance("b".to_string()),
            Interest::Instance("a".to_string()),
        ]);

        assert_eq!(first, second);
        assert_ne!(first, third);
    }

    #[test]
    fn test_interest_registration_json() {
        let registration = InterestRegistration::new(&Interest::Union(vec![
            Interest::FullRegistry,
            Interest::Application("zuul".to_string()),
        ]));
        let json = serde_json::to_string(&registration).unwrap();
        let decoded: InterestRegistration = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, registration);
    }

    #[test]
    fn test_display() {
        let registration = InterestRegistration::new(&Interest::for_instances(&["a", "b"]));
        assert_eq!(
            registration.to_string(),
            "RegisterInterestSet{interests=[InstanceInterest{id=a}, InstanceInterest{id=b}]}"
        );
    }

    fn arb_leaf() -> impl Strategy<Value = Interest> {
        prop_oneof![
            "[a-c]".prop_map(Interest::Instance),
            "[a-c]".prop_map(Interest::Application),
            "[a-c]".prop_map(Interest::Vip),
            "[a-c]".prop_map(Interest::SecureVip),
            Just(Interest::FullRegistry),
        ]
    }

    fn arb_interest() -> impl Strategy<Value = Interest> {
        arb_leaf().prop_recursive(4, 32, 4, |inner| {
            prop::collection::vec(inner, 0..4).prop_map(Interest::Union)
        })
    }

    fn arb_record() -> impl Strategy<Value = InstanceInfo> {
        ("[a-c]", "[a-c]", proptest::option::of("[a-c]"), proptest::option::of("[a-c]")).prop_map(
            |(id, app, vip, secure_vip)| InstanceInfo {
                id,
                app,
                vip_address: vip,
                secure_vip_address: secure_vip,
                ..Default::default()
            },
        )
    }

    proptest! {
        #[test]
        fn prop_compose_flatten_matches_same_records(
            interest in arb_interest(),
            records in prop::collection::vec(arb_record(), 1..8),
        ) {
            let composed = Interest::compose(interest.flatten());
            for record in &records {
                prop_assert_eq!(composed.matches(record), interest.matches(record));
            }
        }

        #[test]
        fn prop_flatten_yields_only_leaves(interest in arb_interest()) {
            prop_assert!(interest.flatten().iter().all(|leaf| !leaf.is_union()));
        }
    }
}

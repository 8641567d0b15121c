//! Composable predicates over a change set of Observed Instances.
use std::collections::HashMap;

use regex::Regex;

use crate::updater::LastAction;
use crate::updater::ObservedInstance;

/// A filterable set of Observed Instances, keyed by instance id.
pub type ChangeSet = HashMap<String, ObservedInstance>;

/// A pure filter over a `ChangeSet`.
///
/// `And(a, b)` is `b.matches ∘ a.matches`: `b` is applied to whatever `a`
/// let through. `Or(a, b)` unions the two results, preferring `a`'s entry
/// on an id collision.
pub enum Criterion {
    ImageAndTagMatches(Regex),
    InStatus(LastAction),
    IsHealthy(bool),
    And(Box<Criterion>, Box<Criterion>),
    Or(Box<Criterion>, Box<Criterion>),
}

impl Criterion {
    pub fn matches(&self, elements: &ChangeSet) -> ChangeSet {
        match self {
            Criterion::ImageAndTagMatches(regex) => elements
                .iter()
                .filter(|(_, instance)| regex.is_match(&instance.snapshot.full_image_name()))
                .map(|(id, instance)| (id.clone(), instance.clone()))
                .collect(),
            Criterion::InStatus(action) => elements
                .iter()
                .filter(|(_, instance)| &instance.last_action == action)
                .map(|(id, instance)| (id.clone(), instance.clone()))
                .collect(),
            Criterion::IsHealthy(healthy) => elements
                .iter()
                .filter(|(_, instance)| instance.snapshot.healthy() == *healthy)
                .map(|(id, instance)| (id.clone(), instance.clone()))
                .collect(),
            Criterion::And(a, b) => {
                let filtered = a.matches(elements);
                b.matches(&filtered)
            }
            Criterion::Or(a, b) => {
                let mut filtered = a.matches(elements);
                let others = b.matches(elements);
                for (id, instance) in others {
                    filtered.entry(id).or_insert(instance);
                }
                filtered
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InstanceSnapshot;
    use crate::models::InstanceStatus;
    use chrono::Utc;

    fn instance(id: &str, image: &str, tag: &str, status: InstanceStatus) -> ObservedInstance {
        ObservedInstance {
            registered_at: Utc::now(),
            last_update: Utc::now(),
            last_action: LastAction::Added,
            cluster_id: "wdc".into(),
            snapshot: InstanceSnapshot {
                id: id.into(),
                image_name: image.into(),
                image_tag: tag.into(),
                host: "h1".into(),
                container_name: format!("{}_1", image),
                status,
            },
        }
    }

    fn change_set() -> ChangeSet {
        let mut set = HashMap::new();
        set.insert("a".into(), instance("a", "svc", "v1", InstanceStatus::Up));
        set.insert("b".into(), instance("b", "svc", "v1", InstanceStatus::Down));
        set.insert("c".into(), instance("c", "svc", "v2", InstanceStatus::Up));
        set
    }

    #[test]
    fn and_composes_as_function_composition() {
        let criterion = Criterion::And(
            Box::new(Criterion::ImageAndTagMatches(Regex::new("^svc:v1$").unwrap())),
            Box::new(Criterion::IsHealthy(true)),
        );
        let result = criterion.matches(&change_set());
        assert_eq!(result.keys().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn or_returns_the_union_preferring_left_on_collision() {
        let left = Criterion::ImageAndTagMatches(Regex::new("^svc:v1$").unwrap());
        let right = Criterion::IsHealthy(true);
        let criterion = Criterion::Or(Box::new(left), Box::new(right));
        let result = criterion.matches(&change_set());
        let mut ids: Vec<&String> = result.keys().collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn in_status_compares_last_action_by_identity() {
        let mut set = change_set();
        set.get_mut("a").unwrap().last_action = LastAction::Removed;
        let criterion = Criterion::InStatus(LastAction::Removed);
        let result = criterion.matches(&set);
        assert_eq!(result.keys().collect::<Vec<_>>(), vec!["a"]);
    }
}

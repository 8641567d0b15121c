//! Ordered, short-circuiting health predicates over a Manager's instances.
//!
//! Grounded on `original_source/manager/service/check.go`'s `Checker`
//! interface (`check`/`next`/`checkHandler` recursion), reworked as a
//! tagged enum with an explicit `next` slot per the design note to avoid
//! trait-object virtual dispatch for what is, at any point in time, a
//! short, statically-known chain.
use std::collections::HashMap;
use std::collections::HashSet;

use super::ManagedInstance;

/// One node in the check chain.
///
/// `ok` is the entry point: it evaluates this node's predicate and, only
/// if the predicate holds, recurses into `next`. A failing predicate
/// short-circuits the whole chain to `false` without evaluating `next`.
pub enum Checker {
    MinInstancesPerCluster {
        min_instances_per_cluster: HashMap<String, usize>,
        next: Option<Box<Checker>>,
    },
    AtLeastXHosts {
        min_hosts: usize,
        next: Option<Box<Checker>>,
    },
    MultiTags {
        next: Option<Box<Checker>>,
    },
}

impl Checker {
    pub fn ok(&self, instances: &HashMap<String, ManagedInstance>) -> bool {
        if !self.check(instances) {
            return false;
        }
        match self.next() {
            Some(next) => next.ok(instances),
            None => true,
        }
    }

    fn next(&self) -> &Option<Box<Checker>> {
        match self {
            Checker::MinInstancesPerCluster { next, .. } => next,
            Checker::AtLeastXHosts { next, .. } => next,
            Checker::MultiTags { next } => next,
        }
    }

    fn check(&self, instances: &HashMap<String, ManagedInstance>) -> bool {
        match self {
            Checker::MinInstancesPerCluster {
                min_instances_per_cluster,
                ..
            } => {
                let mut healthy_per_cluster: HashMap<&str, usize> = HashMap::new();
                for instance in instances.values().filter(|i| i.healthy) {
                    *healthy_per_cluster.entry(instance.cluster_id.as_str()).or_insert(0) += 1;
                }
                min_instances_per_cluster.iter().all(|(cluster_id, min)| {
                    healthy_per_cluster.get(cluster_id.as_str()).copied().unwrap_or(0) >= *min
                })
            }
            Checker::AtLeastXHosts { min_hosts, .. } => {
                let mut hosts_per_cluster: HashMap<&str, HashSet<&str>> = HashMap::new();
                for instance in instances.values().filter(|i| i.healthy) {
                    hosts_per_cluster
                        .entry(instance.cluster_id.as_str())
                        .or_insert_with(HashSet::new)
                        .insert(instance.host.as_str());
                }
                hosts_per_cluster.values().all(|hosts| hosts.len() >= *min_hosts)
            }
            Checker::MultiTags { .. } => {
                let tags: HashSet<&str> = instances
                    .values()
                    .filter(|i| i.healthy)
                    .map(|i| i.image_tag.as_str())
                    .collect();
                tags.len() > 1
            }
        }
    }
}

/// Builds the default chain for a newly constructed Manager:
/// `MinInstancesPerCluster -> AtLeastXHosts`.
pub fn default_chain(min_instances_per_cluster: HashMap<String, usize>) -> Checker {
    Checker::MinInstancesPerCluster {
        min_instances_per_cluster,
        next: Some(Box::new(Checker::AtLeastXHosts {
            min_hosts: 2,
            next: None,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn instance(cluster_id: &str, host: &str, healthy: bool, tag: &str) -> ManagedInstance {
        ManagedInstance {
            id: format!("{}-{}", cluster_id, host),
            created_at: Utc::now(),
            host: host.into(),
            healthy,
            cluster_id: cluster_id.into(),
            image_name: "svc".into(),
            image_tag: tag.into(),
        }
    }

    fn instances(list: Vec<ManagedInstance>) -> HashMap<String, ManagedInstance> {
        list.into_iter().map(|i| (i.id.clone(), i)).collect()
    }

    #[test]
    fn default_chain_requires_min_instances_then_host_spread() {
        let mut min = HashMap::new();
        min.insert("wdc".to_string(), 2);
        let chain = default_chain(min);

        let insufficient = instances(vec![instance("wdc", "h1", true, "v1")]);
        assert!(!chain.ok(&insufficient));

        let single_host = instances(vec![
            instance("wdc", "h1", true, "v1"),
            instance("wdc", "h1", true, "v1"),
        ]);
        assert!(!chain.ok(&single_host));

        let healthy = instances(vec![
            instance("wdc", "h1", true, "v1"),
            instance("wdc", "h2", true, "v1"),
        ]);
        assert!(chain.ok(&healthy));
    }

    #[test]
    fn unhealthy_instances_do_not_count() {
        let mut min = HashMap::new();
        min.insert("wdc".to_string(), 1);
        let chain = default_chain(min);
        let set = instances(vec![instance("wdc", "h1", false, "v1")]);
        assert!(!chain.ok(&set));
    }

    #[test]
    fn multi_tags_detects_a_mixed_rollout() {
        let checker = Checker::MultiTags { next: None };
        let mixed = instances(vec![
            instance("wdc", "h1", true, "v1"),
            instance("wdc", "h2", true, "v2"),
        ]);
        assert!(checker.ok(&mixed));

        let uniform = instances(vec![
            instance("wdc", "h1", true, "v1"),
            instance("wdc", "h2", true, "v1"),
        ]);
        assert!(!checker.ok(&uniform));
    }

    #[test]
    fn a_failing_node_short_circuits_before_the_next() {
        let chain = Checker::AtLeastXHosts {
            min_hosts: 99,
            next: Some(Box::new(Checker::MultiTags { next: None })),
        };
        let set = instances(vec![instance("wdc", "h1", true, "v1")]);
        assert!(!chain.ok(&set));
    }
}

//! Property tests over randomly generated acyclic forests.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;
use version_forest::{CacheConfig, EntityName, VersionForest, VersionKey};

/// Per entity: per version, a list of raw dependency picks.
type RawForest = Vec<Vec<Vec<(u16, u16)>>>;

fn arb_forest() -> impl Strategy<Value = RawForest> {
    prop::collection::vec(
        prop::collection::vec(prop::collection::vec((any::<u16>(), any::<u16>()), 0..4), 1..4),
        1..9,
    )
}

/// Entities are added in index order and may only depend on earlier ones,
/// so every generated forest is acyclic.
fn build(raw: &RawForest, config: CacheConfig) -> (VersionForest, Vec<VersionKey>) {
    let mut forest = VersionForest::with_cache_config(config);
    let mut all = Vec::new();
    let counts: Vec<usize> = raw.iter().map(Vec::len).collect();

    for (i, versions) in raw.iter().enumerate() {
        let name = format!("E{i}");
        let declared: Vec<(u64, Vec<VersionKey>)> = versions
            .iter()
            .enumerate()
            .map(|(v, picks)| {
                let deps = if i == 0 {
                    Vec::new()
                } else {
                    picks
                        .iter()
                        .map(|&(e, n)| {
                            let target = e as usize % i;
                            let number = n as usize % counts[target] + 1;
                            VersionKey::new(format!("E{target}"), number as u64)
                        })
                        .collect()
                };
                ((v + 1) as u64, deps)
            })
            .collect();

        all.extend(declared.iter().map(|(v, _)| VersionKey::new(name.clone(), *v)));
        forest.add_entity(name, declared).unwrap();
    }

    (forest, all)
}

/// Unmemoized reference closure.
fn naive_closure(forest: &VersionForest, key: &VersionKey, out: &mut BTreeSet<VersionKey>) {
    for dependency in forest.dependencies(key).unwrap() {
        out.insert(dependency.clone());
        naive_closure(forest, dependency, out);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn closure_matches_naive_traversal(raw in arb_forest()) {
        let (forest, all) = build(&raw, CacheConfig::default());
        for key in &all {
            let mut expected = BTreeSet::new();
            naive_closure(&forest, key, &mut expected);
            let closure = forest.dependency_closure(key).unwrap();
            prop_assert_eq!(&*closure, &expected);
        }
    }

    #[test]
    fn no_self_membership(raw in arb_forest()) {
        let (forest, all) = build(&raw, CacheConfig::default());
        for key in &all {
            prop_assert!(!forest.dependency_closure(key).unwrap().contains(key));
            prop_assert!(!forest.ancestors(key).unwrap().contains(key));
        }
    }

    #[test]
    fn ancestors_mirror_dependencies(raw in arb_forest()) {
        let (forest, all) = build(&raw, CacheConfig::default());
        for parent in &all {
            let closure = forest.dependency_closure(parent).unwrap();
            for child in &all {
                let is_ancestor = forest.ancestors(child).unwrap().contains(parent);
                prop_assert_eq!(is_ancestor, closure.contains(child));
            }
        }
    }

    #[test]
    fn leaves_have_empty_closure(raw in arb_forest()) {
        let (forest, all) = build(&raw, CacheConfig::default());
        for key in all.iter().filter(|k| forest.dependencies(k).unwrap().is_empty()) {
            prop_assert!(forest.dependency_closure(key).unwrap().is_empty());
            prop_assert!(forest.contradictions(key).unwrap().is_empty());
        }
    }

    #[test]
    fn contradictions_match_grouping(raw in arb_forest()) {
        let (forest, all) = build(&raw, CacheConfig::default());
        for key in &all {
            let mut expected = BTreeSet::new();
            naive_closure(&forest, key, &mut expected);

            let mut by_entity: BTreeMap<EntityName, BTreeSet<u64>> = BTreeMap::new();
            for v in &expected {
                by_entity.entry(v.entity.clone()).or_default().insert(v.version);
            }
            let conflicting: BTreeSet<EntityName> = by_entity
                .into_iter()
                .filter(|(_, versions)| versions.len() > 1)
                .map(|(name, _)| name)
                .collect();

            prop_assert_eq!(forest.contradictions(key).unwrap(), conflicting);
        }
    }

    #[test]
    fn lowest_commonalities_are_nested(raw in arb_forest()) {
        let (forest, all) = build(&raw, CacheConfig::default());
        let roots: Vec<_> = all.iter().filter(|k| forest.parents(k).unwrap().is_empty()).collect();

        for root in roots {
            let closure = forest.dependency_closure(root).unwrap();
            let below: Vec<_> = closure.iter().collect();
            for (i, a) in below.iter().enumerate() {
                for b in below.iter().skip(i + 1) {
                    let common = forest.find_commonalities(a, b).unwrap();
                    let under = forest.find_commonalities_under(root, a, b).unwrap();
                    let lowest = forest.find_lowest_commonalities(root, a, b).unwrap();

                    for c in &under {
                        prop_assert!(c == root || common.contains(c));
                    }
                    for c in &lowest {
                        prop_assert!(under.contains(c));
                    }
                    prop_assert_eq!(under.is_empty(), lowest.is_empty());
                }
            }
        }
    }

    #[test]
    fn cache_does_not_change_results(raw in arb_forest()) {
        let (cached, all) = build(&raw, CacheConfig::default());
        let (uncached, _) = build(&raw, CacheConfig::disabled());
        for key in &all {
            prop_assert_eq!(cached.ancestors(key).unwrap(), uncached.ancestors(key).unwrap());
            prop_assert_eq!(cached.contradictions(key).unwrap(), uncached.contradictions(key).unwrap());
        }
    }
}

//! Splits a family's desired and existing resources into action sets
//!
//! Every logical name from either side ends up in exactly one of the remove,
//! modify or create sets, or is excluded with a reason recorded in the
//! outcome map of the phase it would otherwise have entered.

use std::collections::HashMap;

use crate::outcome::{PhaseOutcomes, step};
use crate::resource::{DesiredResource, ExistingResource};

/// Result of classifying one family
#[derive(Debug)]
pub struct Classification<'a, S, C> {
    /// Existing resources no longer desired and not yet tagged
    pub remove: Vec<&'a ExistingResource<C>>,
    /// Pairs matched one-to-one by logical name
    pub modify: Vec<(&'a DesiredResource<S>, &'a ExistingResource<C>)>,
    /// Desired resources with no existing counterpart
    pub create: Vec<&'a DesiredResource<S>>,
}

impl<S, C> Classification<'_, S, C> {
    /// Whether no phase has anything to do
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.modify.is_empty() && self.create.is_empty()
    }
}

fn count_by_name<'a, T>(items: &'a [T], name: impl Fn(&T) -> &str) -> HashMap<&'a str, Vec<&'a T>> {
    let mut by_name: HashMap<&str, Vec<&T>> = HashMap::new();
    for item in items {
        by_name.entry(name(item)).or_default().push(item);
    }
    by_name
}

/// Classify desired against existing resources by logical name
///
/// `immutable_conflict` returns a message when an existing resource differs
/// from its desired counterpart in a field that cannot be changed in place.
/// Exclusion reasons are written to `outcomes`.
pub fn classify<'a, S, C, F>(
    desired: &'a [DesiredResource<S>],
    existing: &'a [ExistingResource<C>],
    immutable_conflict: F,
    outcomes: &mut PhaseOutcomes,
) -> Classification<'a, S, C>
where
    F: Fn(&DesiredResource<S>, &ExistingResource<C>) -> Option<String>,
{
    let desired_by_name = count_by_name(desired, |d| d.name.as_str());
    let existing_by_name = count_by_name(existing, |e| e.name.as_str());

    let mut classification = Classification {
        remove: Vec::new(),
        modify: Vec::new(),
        create: Vec::new(),
    };

    let mut seen = Vec::new();
    for current in existing {
        let name = current.name.as_str();
        if seen.contains(&name) {
            continue;
        }
        seen.push(name);

        let existing_count = existing_by_name.get(name).map_or(0, Vec::len);
        let wanted = desired_by_name.get(name).map_or(&[][..], Vec::as_slice);

        match wanted {
            [] => {
                if existing_count > 1 {
                    outcomes.removing.record(
                        name,
                        step::DUPLICATE_EXISTING,
                        format!("{existing_count} existing resources share this name."),
                    );
                } else if current.removing {
                    outcomes.removing.record(
                        name,
                        step::ALREADY_REMOVING,
                        "already marked removing, awaiting manual removal.",
                    );
                } else {
                    classification.remove.push(current);
                }
            }
            [single] => {
                if existing_count > 1 {
                    outcomes.modify.record(
                        name,
                        step::DUPLICATE_EXISTING,
                        format!("{existing_count} existing resources share this name."),
                    );
                } else if current.removing {
                    outcomes.modify.record(
                        name,
                        step::ALREADY_REMOVING,
                        "marked removing, resolve the removal before reconfiguring.",
                    );
                } else if let Some(conflict) = immutable_conflict(*single, current) {
                    outcomes
                        .modify
                        .record(name, step::IMMUTABLE_FIELD_CHANGED, conflict);
                } else {
                    classification.modify.push((*single, current));
                }
            }
            many => {
                outcomes.modify.record(
                    name,
                    step::DUPLICATE_CONFIGURATION,
                    format!("appears {} times in configuration.", many.len()),
                );
            }
        }
    }

    let mut seen = Vec::new();
    for wanted in desired {
        let name = wanted.name.as_str();
        if seen.contains(&name) {
            continue;
        }
        seen.push(name);

        let desired_count = desired_by_name.get(name).map_or(0, Vec::len);
        let matches = existing_by_name.get(name).map_or(&[][..], Vec::as_slice);

        if desired_count > 1 {
            if matches.is_empty() {
                outcomes.create.record(
                    name,
                    step::DUPLICATE_CONFIGURATION,
                    format!("appears {desired_count} times in configuration."),
                );
            }
            continue;
        }

        match matches {
            [] => classification.create.push(wanted),
            [one] if one.removing => {
                outcomes.create.record(
                    name,
                    step::AWAITING_REMOVAL,
                    "a removing resource with this name still exists, awaiting manual removal completion.",
                );
            }
            _ => {}
        }
    }

    classification
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn desired(name: &str, size: u32) -> DesiredResource<u32> {
        DesiredResource::new(name, size)
    }

    fn existing(name: &str, size: u32, removing: bool) -> ExistingResource<u32> {
        ExistingResource {
            id: format!("id-{name}"),
            name: name.to_string(),
            removing,
            snapshot: size,
            status: None,
            endpoint: None,
        }
    }

    fn no_conflict(_: &DesiredResource<u32>, _: &ExistingResource<u32>) -> Option<String> {
        None
    }

    fn names<'a>(iter: impl Iterator<Item = &'a str>) -> BTreeSet<String> {
        iter.map(str::to_string).collect()
    }

    #[test]
    fn test_basic_split() {
        let d = vec![desired("a", 1), desired("b", 1)];
        let e = vec![existing("b", 1, false), existing("c", 1, false)];
        let mut outcomes = PhaseOutcomes::default();

        let result = classify(&d, &e, no_conflict, &mut outcomes);

        assert_eq!(result.create.len(), 1);
        assert_eq!(result.create[0].name, "a");
        assert_eq!(result.modify.len(), 1);
        assert_eq!(result.modify[0].1.name, "b");
        assert_eq!(result.remove.len(), 1);
        assert_eq!(result.remove[0].name, "c");
        assert!(outcomes.modify.is_empty());
        assert!(outcomes.create.is_empty());
    }

    #[test]
    fn test_already_removing_is_not_removed_again() {
        let e = vec![existing("a", 1, true)];
        let mut outcomes = PhaseOutcomes::default();

        let result = classify(&[], &e, no_conflict, &mut outcomes);

        assert!(result.is_empty());
        assert!(
            outcomes
                .removing
                .get("a", step::ALREADY_REMOVING)
                .is_some()
        );
    }

    #[test]
    fn test_duplicate_configuration_is_excluded_everywhere() {
        let d = vec![desired("a", 1), desired("a", 2)];
        let mut outcomes = PhaseOutcomes::default();

        let result = classify(&d, &[], no_conflict, &mut outcomes);

        assert!(result.is_empty());
        assert!(
            outcomes
                .create
                .get("a", step::DUPLICATE_CONFIGURATION)
                .unwrap()
                .contains("2 times")
        );

        let e = vec![existing("a", 1, false)];
        let mut outcomes = PhaseOutcomes::default();
        let result = classify(&d, &e, no_conflict, &mut outcomes);
        assert!(result.is_empty());
        assert!(
            outcomes
                .modify
                .get("a", step::DUPLICATE_CONFIGURATION)
                .is_some()
        );
    }

    #[test]
    fn test_removing_resource_blocks_create_and_modify() {
        let d = vec![desired("a", 1)];
        let e = vec![existing("a", 1, true)];
        let mut outcomes = PhaseOutcomes::default();

        let result = classify(&d, &e, no_conflict, &mut outcomes);

        assert!(result.is_empty());
        assert!(outcomes.modify.get("a", step::ALREADY_REMOVING).is_some());
        assert!(
            outcomes
                .create
                .get("a", step::AWAITING_REMOVAL)
                .unwrap()
                .contains("awaiting manual removal completion")
        );
    }

    #[test]
    fn test_duplicate_existing_is_excluded() {
        let d = vec![desired("a", 1)];
        let e = vec![existing("a", 1, false), existing("a", 1, false)];
        let mut outcomes = PhaseOutcomes::default();

        let result = classify(&d, &e, no_conflict, &mut outcomes);

        assert!(result.is_empty());
        assert!(outcomes.modify.get("a", step::DUPLICATE_EXISTING).is_some());
    }

    #[test]
    fn test_immutable_conflict_excludes_pair() {
        let d = vec![desired("a", 2)];
        let e = vec![existing("a", 1, false)];
        let mut outcomes = PhaseOutcomes::default();

        let result = classify(
            &d,
            &e,
            |d, e| (d.spec != e.snapshot).then(|| "size cannot change.".to_string()),
            &mut outcomes,
        );

        assert!(result.modify.is_empty());
        assert_eq!(
            outcomes.modify.get("a", step::IMMUTABLE_FIELD_CHANGED),
            Some("size cannot change.")
        );
    }

    #[test]
    fn test_every_name_is_accounted_for() {
        let d = vec![
            desired("a", 1),
            desired("b", 1),
            desired("b", 1),
            desired("c", 1),
            desired("d", 1),
        ];
        let e = vec![
            existing("c", 1, false),
            existing("d", 1, true),
            existing("e", 1, false),
            existing("f", 1, true),
            existing("g", 1, false),
            existing("g", 1, false),
        ];
        let mut outcomes = PhaseOutcomes::default();

        let result = classify(&d, &e, no_conflict, &mut outcomes);

        let mut covered = BTreeSet::new();
        covered.extend(result.remove.iter().map(|e| e.name.clone()));
        covered.extend(result.modify.iter().map(|(d, _)| d.name.clone()));
        covered.extend(result.create.iter().map(|d| d.name.clone()));
        covered.extend(names(outcomes.removing.names()));
        covered.extend(names(outcomes.modify.names()));
        covered.extend(names(outcomes.create.names()));

        let all: BTreeSet<String> = d
            .iter()
            .map(|d| d.name.clone())
            .chain(e.iter().map(|e| e.name.clone()))
            .collect();
        assert_eq!(covered, all);

        // no name sits in two action sets
        let acted: Vec<&str> = result
            .remove
            .iter()
            .map(|e| e.name.as_str())
            .chain(result.modify.iter().map(|(d, _)| d.name.as_str()))
            .chain(result.create.iter().map(|d| d.name.as_str()))
            .collect();
        let unique: BTreeSet<&str> = acted.iter().copied().collect();
        assert_eq!(acted.len(), unique.len());
    }
}

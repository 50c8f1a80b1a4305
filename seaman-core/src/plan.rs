//! Computing the steps that move a release from one object set to another.

use std::fmt;

use kube::core::DynamicObject;
use serde::{Deserialize, Serialize};

use crate::id::{Identifier, ReleaseName};
use crate::objects::Objects;
use crate::tags::tag_managed;

/// The kind of change a plan step makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Create an object that does not exist yet.
    Create,
    /// Server-side apply over an existing object.
    Upgrade,
    /// Delete an existing object.
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Create => "create",
            Action::Upgrade => "upgrade",
            Action::Delete => "delete",
        })
    }
}

/// An object to create.
#[derive(Debug, Clone)]
pub struct Creation {
    pub identifier: Identifier,
    pub new: DynamicObject,
}

/// An object to upgrade, with the state it replaces.
#[derive(Debug, Clone)]
pub struct Upgrade {
    pub identifier: Identifier,
    pub new: DynamicObject,
    pub old: DynamicObject,
}

/// An object to delete.
#[derive(Debug, Clone)]
pub struct Deletion {
    pub identifier: Identifier,
    pub old: DynamicObject,
}

/// A single step borrowed from a [`ReleasePlan`].
#[derive(Debug, Clone, Copy)]
pub enum Step<'a> {
    Create(&'a Creation),
    Upgrade(&'a Upgrade),
    Delete(&'a Deletion),
}

impl Step<'_> {
    /// The action this step performs.
    #[must_use]
    pub fn action(&self) -> Action {
        match self {
            Step::Create(_) => Action::Create,
            Step::Upgrade(_) => Action::Upgrade,
            Step::Delete(_) => Action::Delete,
        }
    }

    /// The object this step touches.
    #[must_use]
    pub fn identifier(&self) -> &Identifier {
        match self {
            Step::Create(c) => &c.identifier,
            Step::Upgrade(u) => &u.identifier,
            Step::Delete(d) => &d.identifier,
        }
    }
}

/// Creations, upgrades and deletions needed to move between object sets.
///
/// All objects are tagged as managed objects of the release.
#[derive(Debug, Clone, Default)]
pub struct ReleasePlan {
    pub creations: Vec<Creation>,
    pub upgrades: Vec<Upgrade>,
    pub deletions: Vec<Deletion>,
}

impl ReleasePlan {
    /// Diffs `new_objects` against `old_objects`.
    ///
    /// # Complexity
    /// O((n + m) log(n + m)) for n new and m old objects.
    #[must_use]
    pub fn new(release: &ReleaseName, new_objects: &Objects, old_objects: &Objects) -> Self {
        let creations = new_objects
            .iter()
            .filter(|(id, _)| !old_objects.contains_key(*id))
            .map(|(id, new)| Creation {
                identifier: id.clone(),
                new: tag_managed(release, new),
            })
            .collect();

        let upgrades = new_objects
            .iter()
            .filter_map(|(id, new)| {
                old_objects.get(id).map(|old| Upgrade {
                    identifier: id.clone(),
                    new: tag_managed(release, new),
                    old: tag_managed(release, old),
                })
            })
            .collect();

        let deletions = old_objects
            .iter()
            .filter(|(id, _)| !new_objects.contains_key(*id))
            .map(|(id, old)| Deletion {
                identifier: id.clone(),
                old: tag_managed(release, old),
            })
            .collect();

        Self { creations, upgrades, deletions }
    }

    /// Steps in execution order: creations, upgrades, then deletions.
    pub fn steps(&self) -> impl Iterator<Item = Step<'_>> {
        self.creations
            .iter()
            .map(Step::Create)
            .chain(self.upgrades.iter().map(Step::Upgrade))
            .chain(self.deletions.iter().map(Step::Delete))
    }

    /// Returns the plan that reverts this one.
    #[must_use]
    pub fn undo(&self) -> Self {
        Self {
            creations: self
                .deletions
                .iter()
                .map(|d| Creation { identifier: d.identifier.clone(), new: d.old.clone() })
                .collect(),
            upgrades: self
                .upgrades
                .iter()
                .map(|u| Upgrade {
                    identifier: u.identifier.clone(),
                    new: u.old.clone(),
                    old: u.new.clone(),
                })
                .collect(),
            deletions: self
                .creations
                .iter()
                .map(|c| Deletion { identifier: c.identifier.clone(), old: c.new.clone() })
                .collect(),
        }
    }

    /// Total number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.creations.len() + self.upgrades.len() + self.deletions.len()
    }

    /// Returns `true` if the plan has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for ReleasePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in self.steps() {
            let sigil = match step.action() {
                Action::Create => '+',
                Action::Upgrade => '~',
                Action::Delete => '-',
            };
            writeln!(f, "{sigil} {}", step.identifier())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use kube::core::{ApiResource, GroupVersionKind};
    use kube::ResourceExt;

    use super::*;
    use crate::objects::insert_unique;
    use crate::tags::{RELEASE_KEY, TYPE_KEY};

    fn objects(names: &[&str]) -> Objects {
        let resource = ApiResource::from_gvk(&GroupVersionKind::gvk("", "v1", "ConfigMap"));
        let mut objects = Objects::new();
        for name in names {
            if let Err(e) = insert_unique(&mut objects, DynamicObject::new(name, &resource)) {
                panic!("insert failed: {e}");
            }
        }
        objects
    }

    fn release() -> ReleaseName {
        match ReleaseName::new("web") {
            Ok(n) => n,
            Err(e) => panic!("{e}"),
        }
    }

    #[test]
    fn plan_splits_into_create_upgrade_delete() {
        let plan = ReleasePlan::new(&release(), &objects(&["a", "b"]), &objects(&["b", "c"]));
        assert_eq!(plan.creations.len(), 1);
        assert_eq!(plan.creations[0].identifier.name, "a");
        assert_eq!(plan.upgrades.len(), 1);
        assert_eq!(plan.upgrades[0].identifier.name, "b");
        assert_eq!(plan.deletions.len(), 1);
        assert_eq!(plan.deletions[0].identifier.name, "c");
    }

    #[test]
    fn plan_tags_every_object() {
        let plan = ReleasePlan::new(&release(), &objects(&["a", "b"]), &objects(&["b", "c"]));
        for object in plan
            .creations
            .iter()
            .map(|c| &c.new)
            .chain(plan.upgrades.iter().flat_map(|u| [&u.new, &u.old]))
            .chain(plan.deletions.iter().map(|d| &d.old))
        {
            assert_eq!(object.labels().get(TYPE_KEY).map(String::as_str), Some("managed"));
            assert_eq!(object.labels().get(RELEASE_KEY).map(String::as_str), Some("web"));
        }
    }

    #[test]
    fn steps_run_creations_first_and_deletions_last() {
        let plan = ReleasePlan::new(&release(), &objects(&["a", "b"]), &objects(&["b", "c"]));
        let actions: Vec<Action> = plan.steps().map(|s| s.action()).collect();
        assert_eq!(actions, vec![Action::Create, Action::Upgrade, Action::Delete]);
    }

    #[test]
    fn undo_swaps_creations_and_deletions() {
        let plan = ReleasePlan::new(&release(), &objects(&["a", "b"]), &objects(&["b", "c"]));
        let undo = plan.undo();
        assert_eq!(undo.creations[0].identifier.name, "c");
        assert_eq!(undo.deletions[0].identifier.name, "a");
        assert_eq!(undo.upgrades.len(), 1);
    }

    #[test]
    fn install_plan_only_creates() {
        let plan = ReleasePlan::new(&release(), &objects(&["a", "b"]), &Objects::new());
        assert_eq!(plan.creations.len(), 2);
        assert!(plan.upgrades.is_empty() && plan.deletions.is_empty());
    }

    #[test]
    fn display_lists_one_line_per_step() {
        let plan = ReleasePlan::new(&release(), &objects(&["a"]), &objects(&["c"]));
        let text = plan.to_string();
        assert_eq!(text, "+ ConfigMap/v1/a\n- ConfigMap/v1/c\n");
    }

    proptest::proptest! {
        #[test]
        fn proptest_plan_partitions_union_of_keys(
            new in proptest::collection::btree_set("[a-z]{1,4}", 0..12usize),
            old in proptest::collection::btree_set("[a-z]{1,4}", 0..12usize),
        ) {
            let new_names: Vec<&str> = new.iter().map(String::as_str).collect();
            let old_names: Vec<&str> = old.iter().map(String::as_str).collect();
            let plan = ReleasePlan::new(&release(), &objects(&new_names), &objects(&old_names));

            let union = new.union(&old).count();
            proptest::prop_assert_eq!(plan.len(), union, "each key appears in exactly one step");
            proptest::prop_assert_eq!(plan.creations.len() + plan.upgrades.len(), new.len());
            proptest::prop_assert_eq!(plan.deletions.len() + plan.upgrades.len(), old.len());

            let undo = plan.undo();
            proptest::prop_assert_eq!(undo.creations.len(), plan.deletions.len());
            proptest::prop_assert_eq!(undo.deletions.len(), plan.creations.len());
            proptest::prop_assert_eq!(undo.undo().len(), plan.len());
        }
    }
}

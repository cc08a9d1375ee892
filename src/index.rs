use crate::config::{
    CLASS_BODY_CONTENT, CLASS_CONTENT_PROPERTY, CLASS_LABEL, CLASS_LABELLING, CLASS_USER,
};
use crate::objects::{ExportObject, ObjectBuckets};
use rustc_hash::FxHashMap;
use tracing::{debug, info};

/// A name/value entry of the generic content property side table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentProperty<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

/// Lookup tables used to resolve references between export objects.
///
/// Every table is keyed by the referenced object's id. When an id occurs
/// more than once the last occurrence wins.
#[derive(Debug, Default)]
pub struct ExportIndex<'a> {
    users: FxHashMap<&'a str, &'a str>,
    bodies: FxHashMap<&'a str, &'a str>,
    labels: FxHashMap<&'a str, &'a str>,
    labellings: FxHashMap<&'a str, &'a str>,
    properties: FxHashMap<&'a str, ContentProperty<'a>>,
}

/// Entry counts of each table, for logging and the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub users: usize,
    pub bodies: usize,
    pub labels: usize,
    pub labellings: usize,
    pub properties: usize,
}

impl<'a> ExportIndex<'a> {
    /// Builds all tables. They are independent of each other, so they are
    /// built concurrently.
    pub fn build(buckets: &ObjectBuckets<'a>) -> Self {
        let ((users, bodies), (labels, (labellings, properties))) = rayon::join(
            || {
                rayon::join(
                    || build_table(CLASS_USER, buckets.get(CLASS_USER), user_entry),
                    || build_table(CLASS_BODY_CONTENT, buckets.get(CLASS_BODY_CONTENT), body_entry),
                )
            },
            || {
                rayon::join(
                    || build_table(CLASS_LABEL, buckets.get(CLASS_LABEL), label_entry),
                    || {
                        rayon::join(
                            || {
                                build_table(
                                    CLASS_LABELLING,
                                    buckets.get(CLASS_LABELLING),
                                    labelling_entry,
                                )
                            },
                            || {
                                build_table(
                                    CLASS_CONTENT_PROPERTY,
                                    buckets.get(CLASS_CONTENT_PROPERTY),
                                    property_entry,
                                )
                            },
                        )
                    },
                )
            },
        );

        let index = Self {
            users,
            bodies,
            labels,
            labellings,
            properties,
        };

        let stats = index.stats();
        info!(
            users = stats.users,
            bodies = stats.bodies,
            labels = stats.labels,
            labellings = stats.labellings,
            properties = stats.properties,
            "Reference index built"
        );

        index
    }

    /// Display name of the user with the given key.
    pub fn user_name(&self, key: &str) -> Option<&'a str> {
        self.users.get(key).copied()
    }

    /// Raw storage-format markup of a body content block.
    pub fn body(&self, content_id: &str) -> Option<&'a str> {
        self.bodies.get(content_id).copied()
    }

    pub fn label_name(&self, label_id: &str) -> Option<&'a str> {
        self.labels.get(label_id).copied()
    }

    /// Label id that a labelling association points to.
    pub fn labelling_label(&self, labelling_id: &str) -> Option<&'a str> {
        self.labellings.get(labelling_id).copied()
    }

    pub fn property(&self, property_id: &str) -> Option<ContentProperty<'a>> {
        self.properties.get(property_id).copied()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            users: self.users.len(),
            bodies: self.bodies.len(),
            labels: self.labels.len(),
            labellings: self.labellings.len(),
            properties: self.properties.len(),
        }
    }
}

fn build_table<'a, V>(
    class: &str,
    objects: &[ExportObject<'a>],
    entry: fn(&ExportObject<'a>) -> Option<(&'a str, V)>,
) -> FxHashMap<&'a str, V> {
    let mut table = FxHashMap::with_capacity_and_hasher(objects.len(), Default::default());
    let mut skipped = 0usize;

    for object in objects {
        match entry(object) {
            Some((key, value)) => {
                table.insert(key, value);
            }
            None => skipped += 1,
        }
    }

    debug!(class, entries = table.len(), skipped, "Loaded lookup table");
    table
}

/// Key → display name; `fullName` is preferred over the login `name`.
fn user_entry<'a>(obj: &ExportObject<'a>) -> Option<(&'a str, &'a str)> {
    let key = obj.id("key")?;
    let name = obj.property("fullName").or_else(|| obj.property("name"))?;
    Some((key, name))
}

fn body_entry<'a>(obj: &ExportObject<'a>) -> Option<(&'a str, &'a str)> {
    Some((obj.id("id")?, obj.property("body")?))
}

fn label_entry<'a>(obj: &ExportObject<'a>) -> Option<(&'a str, &'a str)> {
    Some((obj.any_id()?, obj.property("name")?))
}

fn labelling_entry<'a>(obj: &ExportObject<'a>) -> Option<(&'a str, &'a str)> {
    Some((obj.id("id")?, obj.property_ref("label", "id")?))
}

/// Property id → name/value; `stringValue` is preferred over `longValue`.
fn property_entry<'a>(obj: &ExportObject<'a>) -> Option<(&'a str, ContentProperty<'a>)> {
    let id = obj.id("id")?;
    let name = obj.property("name")?;
    let value = obj
        .property("stringValue")
        .or_else(|| obj.property("longValue"))?;
    Some((id, ContentProperty { name, value }))
}

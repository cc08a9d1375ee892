use crate::parser::{XmlDocument, XmlNode};
use rustc_hash::FxHashMap;
use tracing::{debug, info};

/// One `<object class="...">` record of the export, borrowed from the
/// parsed document.
///
/// The accessors mirror the handful of path shapes the export format uses:
/// `id`, `property` and `collection` children, some of which carry nested
/// `id` references to other objects.
#[derive(Debug, Clone, Copy)]
pub struct ExportObject<'a> {
    node: &'a XmlNode,
}

impl<'a> ExportObject<'a> {
    pub fn new(node: &'a XmlNode) -> Self {
        Self { node }
    }

    /// The `class` attribute; empty when missing.
    pub fn class(&self) -> &'a str {
        self.node.attr("class").unwrap_or_default()
    }

    /// Text of the first direct `<id name="{name}">` child.
    pub fn id(&self, name: &str) -> Option<&'a str> {
        first_text(self.node.children_named("id", name))
    }

    /// Text of the first direct `<id>` child, whatever its name.
    pub fn any_id(&self) -> Option<&'a str> {
        first_text(self.node.children_tagged("id"))
    }

    /// Text of the first direct `<property name="{name}">` child.
    pub fn property(&self, name: &str) -> Option<&'a str> {
        first_text(self.node.children_named("property", name))
    }

    /// Reference held by a direct `<property name="{property}">` child, as
    /// the text of its `<id name="{id_name}">`.
    pub fn property_ref(&self, property: &str, id_name: &str) -> Option<&'a str> {
        first_text(
            self.node
                .children_named("property", property)
                .flat_map(|p| p.children_named("id", id_name)),
        )
    }

    /// Same as [`property_ref`](Self::property_ref) but the property may sit
    /// at any depth below the object.
    pub fn nested_property_ref(&self, property: &str, id_name: &str) -> Option<&'a str> {
        first_text(
            self.node
                .descendants()
                .filter(|n| n.tag == "property" && n.attr("name") == Some(property))
                .flat_map(|p| p.children_named("id", id_name)),
        )
    }

    /// First `<id name="id">` found at any depth under a property whose name
    /// is one of `properties`.
    pub fn container_id(&self, properties: &[&str]) -> Option<&'a str> {
        first_text(
            self.node
                .descendants()
                .filter(|n| {
                    n.tag == "property"
                        && n.attr("name").is_some_and(|name| properties.iter().any(|p| *p == name))
                })
                .flat_map(|p| {
                    p.descendants()
                        .filter(|n| n.tag == "id" && n.attr("name") == Some("id"))
                }),
        )
    }

    /// Every `<collection name="{name}">` at any depth, in document order.
    pub fn collections(&self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.node
            .descendants()
            .filter(move |n| n.tag == "collection" && n.attr("name") == Some(name))
    }

    /// Ids referenced by `<element>` entries of the named collections, i.e.
    /// `collection[@name]/element/id[@name='id']`, in document order.
    pub fn collection_element_ids(&self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.collections(name)
            .flat_map(|c| c.children_tagged("element"))
            .flat_map(|e| e.children_named("id", "id"))
            .filter_map(XmlNode::text)
    }

    /// Ids referenced by `<ref>` entries of the named collections.
    pub fn collection_ref_ids(&self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.collections(name)
            .flat_map(|c| c.children_tagged("ref"))
            .flat_map(|r| r.children_named("id", "id"))
            .filter_map(XmlNode::text)
    }
}

fn first_text<'a>(mut nodes: impl Iterator<Item = &'a XmlNode>) -> Option<&'a str> {
    nodes.find_map(XmlNode::text)
}

/// Export objects grouped by their `class` attribute, each group in
/// document order. Objects nested inside other objects are included.
#[derive(Debug, Default)]
pub struct ObjectBuckets<'a> {
    by_class: FxHashMap<&'a str, Vec<ExportObject<'a>>>,
}

impl<'a> ObjectBuckets<'a> {
    pub fn classify(doc: &'a XmlDocument) -> Self {
        let mut by_class: FxHashMap<&'a str, Vec<ExportObject<'a>>> = FxHashMap::default();

        for object in doc
            .elements()
            .filter(|n| n.tag == "object")
            .map(ExportObject::new)
        {
            match object.class() {
                "" => debug!(id = ?object.any_id(), "Skipping object without a class attribute"),
                class => by_class.entry(class).or_default().push(object),
            }
        }

        let buckets = Self { by_class };
        for (class, count) in buckets.counts() {
            info!(class, count, "Classified objects");
        }
        buckets
    }

    /// Objects of the given class; empty when the export has none.
    pub fn get(&self, class: &str) -> &[ExportObject<'a>] {
        self.by_class.get(class).map(Vec::as_slice).unwrap_or_default()
    }

    /// Number of objects per class, sorted by class name.
    pub fn counts(&self) -> Vec<(&'a str, usize)> {
        let mut counts: Vec<_> = self
            .by_class
            .iter()
            .map(|(class, objects)| (*class, objects.len()))
            .collect();
        counts.sort_unstable();
        counts
    }

    pub fn total(&self) -> usize {
        self.by_class.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(xml: &str) -> XmlDocument {
        XmlDocument::parse_str(xml).unwrap()
    }

    #[test]
    fn classify_groups_by_class_in_document_order() {
        let d = doc(r#"<hibernate-generic>
            <object class="Page"><id name="id">1</id></object>
            <object class="Label"><id name="id">9</id></object>
            <object class="Page"><id name="id">2</id></object>
            <object><id name="id">3</id></object>
            <object class=""><id name="id">4</id></object>
        </hibernate-generic>"#);
        let buckets = ObjectBuckets::classify(&d);
        assert!(buckets.get("Page").iter().all(|o| o.class() == "Page"));

        let pages: Vec<_> = buckets.get("Page").iter().filter_map(|o| o.id("id")).collect();
        assert_eq!(pages, vec!["1", "2"]);
        assert_eq!(buckets.get("Label").len(), 1);
        assert!(buckets.get("Attachment").is_empty());
        assert_eq!(buckets.counts(), vec![("Label", 1), ("Page", 2)]);
        assert_eq!(buckets.total(), 3);
    }

    #[test]
    fn classify_includes_nested_objects() {
        let d = doc(r#"<r><object class="Page"><collection name="labellings">
            <object class="Labelling"><id name="id">5</id></object>
        </collection></object></r>"#);
        let buckets = ObjectBuckets::classify(&d);
        assert_eq!(buckets.get("Page").len(), 1);
        assert_eq!(buckets.get("Labelling").len(), 1);
    }

    #[test]
    fn id_and_property_accessors() {
        let d = doc(r#"<object class="ConfluenceUserImpl">
            <id name="key">u1</id>
            <property name="name">alice</property>
            <property name="fullName">Alice</property>
        </object>"#);
        let obj = ExportObject::new(&d.roots()[0]);
        assert_eq!(obj.class(), "ConfluenceUserImpl");
        assert_eq!(obj.id("key"), Some("u1"));
        assert_eq!(obj.id("id"), None);
        assert_eq!(obj.any_id(), Some("u1"));
        assert_eq!(obj.property("fullName"), Some("Alice"));
        assert_eq!(obj.property("email"), None);
    }

    #[test]
    fn property_ref_only_matches_direct_children() {
        let d = doc(r#"<object class="Page">
            <property name="creator" class="ConfluenceUserImpl"><id name="key">u1</id></property>
            <collection name="x"><property name="lastModifier"><id name="key">u2</id></property></collection>
        </object>"#);
        let obj = ExportObject::new(&d.roots()[0]);
        assert_eq!(obj.property_ref("creator", "key"), Some("u1"));
        assert_eq!(obj.property_ref("lastModifier", "key"), None);
        assert_eq!(obj.nested_property_ref("lastModifier", "key"), Some("u2"));
    }

    #[test]
    fn container_id_searches_all_alternatives_at_depth() {
        let d = doc(r#"<object class="Attachment">
            <id name="id">a1</id>
            <property name="containerContent" class="Page">
                <wrapper><id name="id">p7</id></wrapper>
            </property>
        </object>"#);
        let obj = ExportObject::new(&d.roots()[0]);
        assert_eq!(
            obj.container_id(&["content", "container", "containerContent"]),
            Some("p7")
        );
        assert_eq!(obj.container_id(&["content"]), None);
    }

    #[test]
    fn collection_ids_preserve_order() {
        let d = doc(r#"<object class="Page">
            <collection name="bodyContents">
                <element class="BodyContent"><id name="id">b2</id></element>
                <element class="BodyContent"><id name="id">b1</id></element>
            </collection>
            <collection name="parent"><ref class="Page"><id name="id">p0</id></ref></collection>
        </object>"#);
        let obj = ExportObject::new(&d.roots()[0]);
        let bodies: Vec<_> = obj.collection_element_ids("bodyContents").collect();
        assert_eq!(bodies, vec!["b2", "b1"]);
        let parents: Vec<_> = obj.collection_ref_ids("parent").collect();
        assert_eq!(parents, vec!["p0"]);
        assert_eq!(obj.collection_element_ids("missing").count(), 0);
    }
}

use crate::attachments::AttachmentGroups;
use crate::index::ExportIndex;
use crate::models::{ContentRecord, ContentType};
use crate::objects::{ExportObject, ObjectBuckets};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Reduces storage-format markup to plain text: tags are stripped, HTML
/// entities decoded and surrounding whitespace trimmed.
///
/// Decoding follows the HTML5 rules, so legacy entities without a trailing
/// semicolon (`&amp`, `&copy`) and windows-1252 numeric references (`&#150;`)
/// come out the way a browser would render them.
pub fn markup_to_text(markup: &str) -> String {
    let stripped = TAG_REGEX.replace_all(markup, "");
    htmlize::unescape(stripped).trim().to_string()
}

/// Builds one record per page, blog post and custom content object.
///
/// Records come out grouped by [`ContentType::ALL`] order and, within a
/// type, in document order. Objects without an id or a title are dropped.
pub fn assemble_content(
    buckets: &ObjectBuckets<'_>,
    index: &ExportIndex<'_>,
    attachments: &AttachmentGroups,
) -> Vec<ContentRecord> {
    let mut records = Vec::new();

    for content_type in ContentType::ALL {
        let objects = buckets.get(content_type.class_name());
        let before = records.len();

        records.extend(
            objects
                .iter()
                .filter_map(|obj| assemble_record(obj, content_type, index, attachments)),
        );

        let assembled = records.len() - before;
        debug!(
            class = content_type.class_name(),
            assembled,
            skipped = objects.len() - assembled,
            "Assembled content records"
        );
    }

    info!(records = records.len(), "Content assembly complete");
    records
}

fn assemble_record(
    obj: &ExportObject<'_>,
    content_type: ContentType,
    index: &ExportIndex<'_>,
    attachments: &AttachmentGroups,
) -> Option<ContentRecord> {
    let Some(id) = obj.id("id") else {
        debug!(class = content_type.class_name(), "Skipping content without an id");
        return None;
    };
    let Some(title) = obj.property("title") else {
        debug!(id, "Skipping content without a title");
        return None;
    };

    let resolve_user = |property: &str| {
        obj.property_ref(property, "key")
            .and_then(|key| index.user_name(key))
            .map(str::to_string)
    };

    let content_raw = obj
        .collection_element_ids("bodyContents")
        .next()
        .and_then(|body_id| index.body(body_id));

    let parent_id = obj
        .collection_ref_ids("parent")
        .next()
        .or_else(|| obj.property_ref("parent", "id"));

    Some(ContentRecord {
        id: id.to_string(),
        content_type,
        title: title.to_string(),
        creator: resolve_user("creator"),
        last_modifier: resolve_user("lastModifier"),
        attachments: attachments.for_page(id).to_vec(),
        comments: Vec::new(),
        labels: resolve_labels(obj, index),
        version: parse_version(id, obj.property("version")),
        created_at: obj.property("creationDate").map(str::to_string),
        modified_at: obj.property("lastModificationDate").map(str::to_string),
        content_text: content_raw.map(markup_to_text).unwrap_or_default(),
        content_raw: content_raw.map(str::to_string),
        parent_id: parent_id.map(str::to_string),
    })
}

fn parse_version(id: &str, version: Option<&str>) -> i64 {
    let Some(version) = version else {
        return 0;
    };
    version.trim().parse().unwrap_or_else(|_| {
        debug!(id, version, "Unparseable version, defaulting to 0");
        0
    })
}

/// Label names attached through the `labellings` collection, in source
/// order and keeping duplicates.
///
/// Entries are either inline labelling objects holding a `label` reference,
/// or `element` references to separate `Labelling` objects.
fn resolve_labels(obj: &ExportObject<'_>, index: &ExportIndex<'_>) -> Vec<String> {
    let mut label_ids = Vec::new();

    for entry in obj.collections("labellings").flat_map(|c| c.children.iter()) {
        match entry.tag.as_str() {
            "object" => label_ids.extend(
                entry
                    .children_named("ref", "label")
                    .flat_map(|r| r.children_tagged("id"))
                    .filter_map(|id| id.text()),
            ),
            "element" => label_ids.extend(
                entry
                    .children_named("id", "id")
                    .filter_map(|id| id.text())
                    .filter_map(|labelling_id| index.labelling_label(labelling_id)),
            ),
            _ => {}
        }
    }

    label_ids
        .into_iter()
        .filter_map(|label_id| index.label_name(label_id))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttachmentRecord;
    use crate::parser::XmlDocument;

    fn assemble(xml: &str, attachments: &AttachmentGroups) -> Vec<ContentRecord> {
        let doc = XmlDocument::parse_str(xml).unwrap();
        let buckets = ObjectBuckets::classify(&doc);
        let index = ExportIndex::build(&buckets);
        assemble_content(&buckets, &index, attachments)
    }

    #[test]
    fn markup_to_text_strips_tags_and_decodes() {
        assert_eq!(markup_to_text("<p>Hello &amp; welcome</p>"), "Hello & welcome");
        assert_eq!(
            markup_to_text("<h1>Title</h1>\n<p>Body with <strong>bold</strong></p>\n"),
            "Title\nBody with bold"
        );
        assert_eq!(markup_to_text("caf&eacute; &lt;3 &#x263A;"), "café <3 ☺");
    }

    #[test]
    fn markup_to_text_decodes_legacy_entities() {
        assert_eq!(markup_to_text("Hello &amp welcome"), "Hello & welcome");
        assert_eq!(markup_to_text("&copy 2024"), "© 2024");
        assert_eq!(markup_to_text("a&#150;b"), "a\u{2013}b");
        assert_eq!(markup_to_text("a&#0;b"), "a\u{fffd}b");
    }

    #[test]
    fn markup_to_text_handles_confluence_macros() {
        let raw = r#"<ac:structured-macro ac:name="info"><ac:rich-text-body><p>Note</p></ac:rich-text-body></ac:structured-macro>"#;
        assert_eq!(markup_to_text(raw), "Note");
    }

    #[test]
    fn markup_to_text_is_idempotent_on_clean_text() {
        let once = markup_to_text("<p>  plain words, nothing else </p>");
        assert_eq!(once, "plain words, nothing else");
        assert_eq!(markup_to_text(&once), once);
        assert_eq!(markup_to_text(""), "");
    }

    #[test]
    fn resolves_users_body_and_defaults() {
        let records = assemble(
            r#"<r>
            <object class="ConfluenceUserImpl"><id name="key">u1</id><property name="fullName">Alice</property></object>
            <object class="BodyContent"><id name="id">b1</id><property name="body">&lt;p&gt;Hello &amp;amp; welcome&lt;/p&gt;</property></object>
            <object class="Page">
                <id name="id">p1</id>
                <property name="title">Home</property>
                <property name="creator" class="ConfluenceUserImpl"><id name="key">u1</id></property>
                <property name="lastModifier" class="ConfluenceUserImpl"><id name="key">ghost</id></property>
                <collection name="bodyContents"><element class="BodyContent"><id name="id">b1</id></element></collection>
            </object>
            </r>"#,
            &AttachmentGroups::default(),
        );

        assert_eq!(records.len(), 1);
        let page = &records[0];
        assert_eq!(page.id, "p1");
        assert_eq!(page.content_type, ContentType::Page);
        assert_eq!(page.creator.as_deref(), Some("Alice"));
        assert_eq!(page.last_modifier, None);
        assert_eq!(page.content_raw.as_deref(), Some("<p>Hello &amp; welcome</p>"));
        assert_eq!(page.content_text, "Hello & welcome");
        assert_eq!(page.version, 0);
        assert_eq!(page.created_at, None);
        assert_eq!(page.modified_at, None);
        assert_eq!(page.parent_id, None);
        assert!(page.labels.is_empty());
        assert!(page.comments.is_empty());
    }

    #[test]
    fn unresolved_body_gives_empty_text() {
        let records = assemble(
            r#"<object class="Page">
                <id name="id">p1</id>
                <property name="title">Home</property>
                <collection name="bodyContents"><element class="BodyContent"><id name="id">missing</id></element></collection>
            </object>"#,
            &AttachmentGroups::default(),
        );
        assert_eq!(records[0].content_raw, None);
        assert_eq!(records[0].content_text, "");
    }

    #[test]
    fn skips_records_without_id_or_title() {
        let records = assemble(
            r#"<r>
            <object class="Page"><property name="title">No id</property></object>
            <object class="Page"><id name="id">p2</id></object>
            <object class="Page"><id name="id">p3</id><property name="title">Kept</property></object>
            </r>"#,
            &AttachmentGroups::default(),
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "p3");
    }

    #[test]
    fn output_follows_type_order_then_document_order() {
        let records = assemble(
            r#"<r>
            <object class="CustomContentEntityObject"><id name="id">c1</id><property name="title">C</property></object>
            <object class="Blogpost"><id name="id">b1</id><property name="title">B</property></object>
            <object class="Page"><id name="id">p2</id><property name="title">P2</property></object>
            <object class="Page"><id name="id">p1</id><property name="title">P1</property></object>
            </r>"#,
            &AttachmentGroups::default(),
        );
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p1", "b1", "c1"]);
    }

    #[test]
    fn version_and_dates() {
        let records = assemble(
            r#"<r>
            <object class="Page">
                <id name="id">p1</id>
                <property name="title">Versioned</property>
                <property name="version">7</property>
                <property name="creationDate">2023-05-01 09:00:00.000</property>
                <property name="lastModificationDate">2024-02-03 10:11:12.000</property>
            </object>
            <object class="Page">
                <id name="id">p2</id>
                <property name="title">Broken version</property>
                <property name="version">seven</property>
            </object>
            </r>"#,
            &AttachmentGroups::default(),
        );
        assert_eq!(records[0].version, 7);
        assert_eq!(records[0].created_at.as_deref(), Some("2023-05-01 09:00:00.000"));
        assert_eq!(records[0].modified_at.as_deref(), Some("2024-02-03 10:11:12.000"));
        assert_eq!(records[1].version, 0);
    }

    #[test]
    fn parent_from_collection_ref_or_property() {
        let records = assemble(
            r#"<r>
            <object class="Page">
                <id name="id">p1</id>
                <property name="title">Child A</property>
                <collection name="parent"><ref class="Page"><id name="id">root</id></ref></collection>
            </object>
            <object class="Page">
                <id name="id">p2</id>
                <property name="title">Child B</property>
                <property name="parent" class="Page"><id name="id">root</id></property>
            </object>
            </r>"#,
            &AttachmentGroups::default(),
        );
        assert_eq!(records[0].parent_id.as_deref(), Some("root"));
        assert_eq!(records[1].parent_id.as_deref(), Some("root"));
    }

    #[test]
    fn labels_preserve_order_and_duplicates() {
        let records = assemble(
            r#"<r>
            <object class="Label"><id name="id">L1</id><property name="name">one</property></object>
            <object class="Label"><id name="id">L2</id><property name="name">two</property></object>
            <object class="Labelling">
                <id name="id">X</id>
                <property name="label" class="Label"><id name="id">L2</id></property>
            </object>
            <object class="Page">
                <id name="id">p1</id>
                <property name="title">Labelled</property>
                <collection name="labellings">
                    <object class="Labelling"><ref name="label" class="Label"><id name="id">L1</id></ref></object>
                    <object class="Labelling"><ref name="label" class="Label"><id name="id">L1</id></ref></object>
                    <object class="Labelling"><ref name="label" class="Label"><id name="id">unknown</id></ref></object>
                    <element class="Labelling"><id name="id">X</id></element>
                </collection>
            </object>
            </r>"#,
            &AttachmentGroups::default(),
        );
        assert_eq!(records[0].labels, vec!["one", "one", "two"]);
    }

    #[test]
    fn attachments_attached_by_page_id() {
        let mut groups = AttachmentGroups::default();
        groups.push(
            "p1",
            AttachmentRecord {
                id: "a1".to_string(),
                filename: "diagram.png".to_string(),
                filesize: 10,
                content_type: "image/png".to_string(),
                author: None,
                created_at: String::new(),
                filepath: None,
            },
        );

        let records = assemble(
            r#"<r>
            <object class="Page"><id name="id">p1</id><property name="title">With</property></object>
            <object class="Page"><id name="id">p2</id><property name="title">Without</property></object>
            </r>"#,
            &groups,
        );
        assert_eq!(records[0].attachments.len(), 1);
        assert_eq!(records[0].attachments[0].id, "a1");
        assert!(records[1].attachments.is_empty());
    }
}

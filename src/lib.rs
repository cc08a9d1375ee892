//! confluence-export: Confluence XML export to JSON conversion
//!
//! A Confluence space export is a flat list of typed `<object>` records
//! (pages, users, attachments, labels, content properties) that point at
//! each other through id references. This crate turns it into a
//! denormalized JSON document with one record per content item and the
//! related entities resolved inline:
//!
//! 1. **Load** -- Parse the whole document into an element tree, tolerating
//!    malformed markup, and group every `object` by its `class`
//! 2. **Index** -- Build lookup tables for users, body content, labels,
//!    labellings and content properties
//! 3. **Attachments** -- Resolve each attachment's page, author, size and
//!    media type; optionally restore the binary from the export layout
//!    (`<page>/<attachment>/1`) into `<page>/<attachment>/<filename>`
//! 4. **Content** -- Assemble pages, blog posts and custom content with their
//!    creators, body text, labels, parent and attachments
//! 5. **Output** -- Write the records as one pretty-printed JSON array
//!
//! # Key Modules
//!
//! - [`parser`] -- Lenient XML tree builder with BZ2 support
//! - [`objects`] -- Class buckets and typed accessors over `object` records
//! - [`index`] -- Reference lookup tables
//! - [`attachments`] -- Attachment resolution, grouping and restore
//! - [`content`] -- Content assembly and markup-to-text reduction
//! - [`output`] -- JSON serialization
//! - [`convert`] -- The pipeline driver
//! - [`models`] -- Output record types
//! - [`stats`] -- Thread-safe counters for the run summary
//! - [`config`] -- Constants
//!
//! # Example Usage
//!
//! ```bash
//! # Convert only
//! confluence-export entities.xml -o space.json
//!
//! # Convert and restore attachments
//! confluence-export entities.xml -a export/attachments -r restored/ --debug
//! ```

pub mod attachments;
pub mod config;
pub mod content;
pub mod convert;
pub mod index;
pub mod models;
pub mod objects;
pub mod output;
pub mod parser;
pub mod stats;

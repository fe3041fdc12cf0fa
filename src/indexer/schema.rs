//! Tantivy schema definition for the artifact index
//!
//! Fields:
//! - uinfo: unique document key, used for replace/delete
//! - group_id, artifact_id, version, packaging, classifier, extension, sha1:
//!   untokenized + stored, the targets of exact and prefix matching
//! - file_name, name, description, size, last_modified, flags: stored only
//! - prefix, goals: plugin metadata (full detail level)
//! - classnames: stored class list; class_simple: lower-cased simple names
//!   for class search (full detail level)

use tantivy::schema::*;

use crate::error::Result;
use crate::model::ArtifactRecord;

pub const UINFO: &str = "uinfo";
pub const GROUP_ID: &str = "group_id";
pub const ARTIFACT_ID: &str = "artifact_id";
pub const VERSION: &str = "version";
pub const PACKAGING: &str = "packaging";
pub const CLASSIFIER: &str = "classifier";
pub const EXTENSION: &str = "extension";
pub const SHA1: &str = "sha1";
pub const FILE_NAME: &str = "file_name";
pub const SIZE: &str = "size";
pub const LAST_MODIFIED: &str = "last_modified";
pub const NAME: &str = "name";
pub const DESCRIPTION: &str = "description";
pub const SOURCES_EXISTS: &str = "sources_exists";
pub const JAVADOC_EXISTS: &str = "javadoc_exists";
pub const PREFIX: &str = "prefix";
pub const GOALS: &str = "goals";
pub const CLASSNAMES: &str = "classnames";
pub const CLASS_SIMPLE: &str = "class_simple";

/// Build the Tantivy schema for artifact indexing
pub fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();

    for name in [
        UINFO,
        GROUP_ID,
        ARTIFACT_ID,
        VERSION,
        PACKAGING,
        CLASSIFIER,
        EXTENSION,
        SHA1,
        PREFIX,
        GOALS,
    ] {
        schema_builder.add_text_field(name, STRING | STORED);
    }

    for name in [FILE_NAME, NAME, DESCRIPTION, CLASSNAMES] {
        schema_builder.add_text_field(name, TextOptions::default().set_stored());
    }
    schema_builder.add_text_field(CLASS_SIMPLE, STRING);

    for name in [SIZE, LAST_MODIFIED, SOURCES_EXISTS, JAVADOC_EXISTS] {
        schema_builder.add_u64_field(name, STORED);
    }

    schema_builder.build()
}

/// Resolved field handles
#[derive(Debug, Clone, Copy)]
pub struct ArtifactFields {
    pub uinfo: Field,
    pub group_id: Field,
    pub artifact_id: Field,
    pub version: Field,
    pub packaging: Field,
    pub classifier: Field,
    pub extension: Field,
    pub sha1: Field,
    pub file_name: Field,
    pub size: Field,
    pub last_modified: Field,
    pub name: Field,
    pub description: Field,
    pub sources_exists: Field,
    pub javadoc_exists: Field,
    pub prefix: Field,
    pub goals: Field,
    pub classnames: Field,
    pub class_simple: Field,
}

impl ArtifactFields {
    pub fn new(schema: &Schema) -> Result<Self> {
        Ok(Self {
            uinfo: schema.get_field(UINFO)?,
            group_id: schema.get_field(GROUP_ID)?,
            artifact_id: schema.get_field(ARTIFACT_ID)?,
            version: schema.get_field(VERSION)?,
            packaging: schema.get_field(PACKAGING)?,
            classifier: schema.get_field(CLASSIFIER)?,
            extension: schema.get_field(EXTENSION)?,
            sha1: schema.get_field(SHA1)?,
            file_name: schema.get_field(FILE_NAME)?,
            size: schema.get_field(SIZE)?,
            last_modified: schema.get_field(LAST_MODIFIED)?,
            name: schema.get_field(NAME)?,
            description: schema.get_field(DESCRIPTION)?,
            sources_exists: schema.get_field(SOURCES_EXISTS)?,
            javadoc_exists: schema.get_field(JAVADOC_EXISTS)?,
            prefix: schema.get_field(PREFIX)?,
            goals: schema.get_field(GOALS)?,
            classnames: schema.get_field(CLASSNAMES)?,
            class_simple: schema.get_field(CLASS_SIMPLE)?,
        })
    }

    pub fn to_document(&self, record: &ArtifactRecord) -> TantivyDocument {
        let mut doc = TantivyDocument::default();
        doc.add_text(self.uinfo, record.uinfo());
        doc.add_text(self.group_id, &record.group_id);
        doc.add_text(self.artifact_id, &record.artifact_id);
        doc.add_text(self.version, &record.version);
        doc.add_text(self.packaging, &record.packaging);
        if let Some(classifier) = &record.classifier {
            doc.add_text(self.classifier, classifier);
        }
        doc.add_text(self.extension, &record.extension);
        if let Some(sha1) = &record.sha1 {
            doc.add_text(self.sha1, sha1.to_ascii_lowercase());
        }
        doc.add_text(self.file_name, &record.file_name);
        doc.add_u64(self.size, record.size);
        doc.add_u64(self.last_modified, record.last_modified);
        if let Some(name) = &record.name {
            doc.add_text(self.name, name);
        }
        if let Some(description) = &record.description {
            doc.add_text(self.description, description);
        }
        doc.add_u64(self.sources_exists, record.sources_exists as u64);
        doc.add_u64(self.javadoc_exists, record.javadoc_exists as u64);
        if let Some(prefix) = &record.prefix {
            doc.add_text(self.prefix, prefix);
        }
        for goal in &record.goals {
            doc.add_text(self.goals, goal);
        }
        for classname in &record.classnames {
            doc.add_text(self.classnames, classname);
            doc.add_text(self.class_simple, simple_class_name(classname).to_lowercase());
        }
        doc
    }

    pub fn from_document(&self, doc: &TantivyDocument) -> ArtifactRecord {
        let text = |field: Field| -> Option<String> {
            doc.get_first(field).and_then(|v| v.as_str()).map(str::to_string)
        };
        let texts = |field: Field| -> Vec<String> {
            doc.get_all(field)
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect()
        };
        let number = |field: Field| doc.get_first(field).and_then(|v| v.as_u64()).unwrap_or(0);

        ArtifactRecord {
            group_id: text(self.group_id).unwrap_or_default(),
            artifact_id: text(self.artifact_id).unwrap_or_default(),
            version: text(self.version).unwrap_or_default(),
            classifier: text(self.classifier),
            packaging: text(self.packaging).unwrap_or_default(),
            extension: text(self.extension).unwrap_or_default(),
            file_name: text(self.file_name).unwrap_or_default(),
            size: number(self.size),
            last_modified: number(self.last_modified),
            sha1: text(self.sha1),
            name: text(self.name),
            description: text(self.description),
            sources_exists: number(self.sources_exists) != 0,
            javadoc_exists: number(self.javadoc_exists) != 0,
            prefix: text(self.prefix),
            goals: texts(self.goals),
            classnames: texts(self.classnames),
            deleted: false,
        }
    }
}

/// `org/acme/Widget` -> `Widget`
pub fn simple_class_name(classname: &str) -> &str {
    classname.rsplit(['/', '.']).next().unwrap_or(classname)
}

/// `org/acme/Widget` -> `org.acme`
pub fn package_name(classname: &str) -> String {
    match classname.rfind(['/', '.']) {
        Some(split) => classname[..split].trim_start_matches('/').replace('/', "."),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ArtifactKey;

    #[test]
    fn test_document_round_trip_keeps_multi_values() {
        let schema = build_schema();
        let fields = ArtifactFields::new(&schema).unwrap();

        let mut record = ArtifactRecord::new(&ArtifactKey::new("org.acme", "acme-maven-plugin", "1.2"), "maven-plugin", "jar");
        record.sha1 = Some("ABCDEF0123".to_string());
        record.prefix = Some("acme".to_string());
        record.goals = vec!["build".to_string(), "clean".to_string()];
        record.classnames = vec!["org/acme/BuildMojo".to_string()];
        record.sources_exists = true;

        let back = fields.from_document(&fields.to_document(&record));
        assert_eq!(back.goals, record.goals);
        assert_eq!(back.classnames, record.classnames);
        assert_eq!(back.sha1.as_deref(), Some("abcdef0123"));
        assert!(back.sources_exists && !back.javadoc_exists);
        assert!(back.classifier.is_none());
    }

    #[test]
    fn test_class_name_parts() {
        assert_eq!(simple_class_name("org/acme/Widget"), "Widget");
        assert_eq!(package_name("org/acme/Widget"), "org.acme");
        assert_eq!(package_name("/org/acme/Widget"), "org.acme");
        assert_eq!(package_name("Widget"), "");
    }
}

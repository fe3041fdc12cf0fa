//! Query construction
//!
//! Every searchable attribute maps to one schema field through `FIELD_TABLE`,
//! and every `MatchKind` maps to one matcher:
//! - Exact: a term query on the untokenized field
//! - Partial: a prefix match, i.e. the half-open range `[value, value + ∞)`
//! - Scored: exact (boosted) OR prefix, so whole-value hits rank first
//!
//! `find` queries AND the constrained fields together and OR the alternatives
//! given for one field. Canned searches each have their own builder.

use tantivy::query::{AllQuery, BooleanQuery, BoostQuery, Occur, Query, RegexQuery, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Term};

use crate::error::Result;
use crate::indexer::ArtifactFields;
use crate::model::{ClassifierMask, MatchKind, SearchExpression, SearchType};

const EXACT_BOOST: f32 = 4.0;
const SHA1_LENGTH: usize = 40;

pub const PACKAGING_POM: &str = "pom";
pub const PACKAGING_PLUGIN: &str = "maven-plugin";
pub const PACKAGING_ARCHETYPE: &str = "maven-archetype";

/// Attributes a query can constrain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchField {
    GroupId,
    ArtifactId,
    Version,
    Packaging,
    Classifier,
    Sha1,
    Prefix,
    ClassSimpleName,
}

type FieldSelector = fn(&ArtifactFields) -> Field;

/// Fixed attribute -> schema field mapping
static FIELD_TABLE: [(SearchField, FieldSelector); 8] = [
    (SearchField::GroupId, |f: &ArtifactFields| f.group_id),
    (SearchField::ArtifactId, |f: &ArtifactFields| f.artifact_id),
    (SearchField::Version, |f: &ArtifactFields| f.version),
    (SearchField::Packaging, |f: &ArtifactFields| f.packaging),
    (SearchField::Classifier, |f: &ArtifactFields| f.classifier),
    (SearchField::Sha1, |f: &ArtifactFields| f.sha1),
    (SearchField::Prefix, |f: &ArtifactFields| f.prefix),
    (SearchField::ClassSimpleName, |f: &ArtifactFields| f.class_simple),
];

/// Order in which `find` constrains fields
const FIND_FIELDS: [SearchField; 5] = [
    SearchField::GroupId,
    SearchField::ArtifactId,
    SearchField::Version,
    SearchField::Packaging,
    SearchField::Classifier,
];

fn schema_field(fields: &ArtifactFields, search_field: SearchField) -> Field {
    FIELD_TABLE
        .iter()
        .find(|(candidate, _)| *candidate == search_field)
        .map(|(_, select)| select(fields))
        .unwrap_or(fields.uinfo)
}

/// Escape regex metacharacters so the value matches literally.
fn escape_regex(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        if matches!(
            c,
            '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn exact(field: Field, value: &str) -> Box<dyn Query> {
    Box::new(TermQuery::new(
        Term::from_field_text(field, value),
        IndexRecordOption::Basic,
    ))
}

fn prefix(field: Field, value: &str) -> Result<Box<dyn Query>> {
    let pattern = format!("{}.*", escape_regex(value));
    Ok(Box::new(RegexQuery::from_pattern(&pattern, field)?))
}

fn scored(field: Field, value: &str) -> Result<Box<dyn Query>> {
    Ok(Box::new(BooleanQuery::new(vec![
        (Occur::Should, Box::new(BoostQuery::new(exact(field, value), EXACT_BOOST)) as Box<dyn Query>),
        (Occur::Should, prefix(field, value)?),
    ])))
}

/// Build the matcher for one expression against one attribute.
pub fn matcher(fields: &ArtifactFields, search_field: SearchField, expr: &SearchExpression) -> Result<Box<dyn Query>> {
    let field = schema_field(fields, search_field);
    match expr.kind {
        MatchKind::Exact => Ok(exact(field, &expr.value)),
        MatchKind::Partial => prefix(field, &expr.value),
        MatchKind::Scored => scored(field, &expr.value),
    }
}

/// Structured query: alternatives per attribute. Empty lists leave the
/// attribute unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindQuery {
    pub group_ids: Vec<SearchExpression>,
    pub artifact_ids: Vec<SearchExpression>,
    pub versions: Vec<SearchExpression>,
    pub packagings: Vec<SearchExpression>,
    pub classifiers: Vec<SearchExpression>,
}

impl FindQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// One optional expression per attribute.
    pub fn from_options(
        group_id: Option<SearchExpression>,
        artifact_id: Option<SearchExpression>,
        version: Option<SearchExpression>,
        packaging: Option<SearchExpression>,
    ) -> Self {
        Self {
            group_ids: group_id.into_iter().collect(),
            artifact_ids: artifact_id.into_iter().collect(),
            versions: version.into_iter().collect(),
            packagings: packaging.into_iter().collect(),
            classifiers: Vec::new(),
        }
    }

    pub fn group(mut self, expr: SearchExpression) -> Self {
        self.group_ids.push(expr);
        self
    }

    pub fn artifact(mut self, expr: SearchExpression) -> Self {
        self.artifact_ids.push(expr);
        self
    }

    pub fn version(mut self, expr: SearchExpression) -> Self {
        self.versions.push(expr);
        self
    }

    pub fn packaging(mut self, expr: SearchExpression) -> Self {
        self.packagings.push(expr);
        self
    }

    pub fn classifier(mut self, expr: SearchExpression) -> Self {
        self.classifiers.push(expr);
        self
    }

    fn expressions(&self, field: SearchField) -> &[SearchExpression] {
        match field {
            SearchField::GroupId => &self.group_ids,
            SearchField::ArtifactId => &self.artifact_ids,
            SearchField::Version => &self.versions,
            SearchField::Packaging => &self.packagings,
            SearchField::Classifier => &self.classifiers,
            _ => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        FIND_FIELDS.iter().all(|f| self.expressions(*f).is_empty())
    }
}

pub fn build_find_query(fields: &ArtifactFields, query: &FindQuery) -> Result<Box<dyn Query>> {
    if query.is_empty() {
        return Ok(Box::new(AllQuery));
    }

    let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
    for search_field in FIND_FIELDS {
        let alternatives = query.expressions(search_field);
        match alternatives {
            [] => {}
            [single] => clauses.push((Occur::Must, matcher(fields, search_field, single)?)),
            many => {
                let mut either: Vec<(Occur, Box<dyn Query>)> = Vec::with_capacity(many.len());
                for expr in many {
                    either.push((Occur::Should, matcher(fields, search_field, expr)?));
                }
                clauses.push((Occur::Must, Box::new(BooleanQuery::new(either))));
            }
        }
    }
    Ok(Box::new(BooleanQuery::new(clauses)))
}

/// Exact for a full 40-character checksum, prefix otherwise.
pub fn sha1_expression(term: &str) -> SearchExpression {
    let term = term.trim().to_ascii_lowercase();
    if term.len() == SHA1_LENGTH {
        SearchExpression::exact(term)
    } else {
        SearchExpression::partial(term)
    }
}

fn any_of(fields: &ArtifactFields, targets: &[SearchField], expr: &SearchExpression) -> Result<Box<dyn Query>> {
    let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::with_capacity(targets.len());
    for target in targets {
        clauses.push((Occur::Should, matcher(fields, *target, expr)?));
    }
    Ok(Box::new(BooleanQuery::new(clauses)))
}

fn with_packaging(fields: &ArtifactFields, packaging: &str, rest: Box<dyn Query>) -> Box<dyn Query> {
    Box::new(BooleanQuery::new(vec![
        (Occur::Must, exact(fields.packaging, packaging)),
        (Occur::Must, rest),
    ]))
}

fn group_search(fields: &ArtifactFields, term: &str) -> Result<Box<dyn Query>> {
    matcher(fields, SearchField::GroupId, &SearchExpression::scored(term))
}

fn artifact_search(fields: &ArtifactFields, term: &str) -> Result<Box<dyn Query>> {
    let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![
        (Occur::Should, matcher(fields, SearchField::GroupId, &SearchExpression::scored(term))?),
        (Occur::Should, matcher(fields, SearchField::ArtifactId, &SearchExpression::scored(term))?),
    ];
    if !term.is_empty() && term.chars().all(|c| c.is_ascii_hexdigit()) {
        clauses.push((Occur::Should, matcher(fields, SearchField::Sha1, &sha1_expression(term))?));
    }
    Ok(Box::new(BooleanQuery::new(clauses)))
}

fn parent_search(fields: &ArtifactFields, term: &str) -> Result<Box<dyn Query>> {
    let rest = any_of(fields, &[SearchField::GroupId, SearchField::ArtifactId], &SearchExpression::scored(term))?;
    Ok(with_packaging(fields, PACKAGING_POM, rest))
}

fn plugin_search(fields: &ArtifactFields, term: &str) -> Result<Box<dyn Query>> {
    let rest = any_of(
        fields,
        &[SearchField::GroupId, SearchField::ArtifactId, SearchField::Prefix],
        &SearchExpression::scored(term),
    )?;
    Ok(with_packaging(fields, PACKAGING_PLUGIN, rest))
}

fn archetype_search(fields: &ArtifactFields, term: &str) -> Result<Box<dyn Query>> {
    let rest = any_of(fields, &[SearchField::GroupId, SearchField::ArtifactId], &SearchExpression::scored(term))?;
    Ok(with_packaging(fields, PACKAGING_ARCHETYPE, rest))
}

fn packaging_search(fields: &ArtifactFields, term: &str) -> Result<Box<dyn Query>> {
    matcher(fields, SearchField::Packaging, &SearchExpression::exact(term))
}

fn sha1_search(fields: &ArtifactFields, term: &str) -> Result<Box<dyn Query>> {
    matcher(fields, SearchField::Sha1, &sha1_expression(term))
}

fn class_name_search(fields: &ArtifactFields, term: &str) -> Result<Box<dyn Query>> {
    matcher(
        fields,
        SearchField::ClassSimpleName,
        &SearchExpression::partial(term.to_lowercase()),
    )
}

/// Build the canned query for `search_type`, excluding the classifiers
/// `mask` does not ask for.
pub fn build_search_query(
    fields: &ArtifactFields,
    term: &str,
    search_type: SearchType,
    mask: ClassifierMask,
) -> Result<Box<dyn Query>> {
    let term = term.trim();
    let shape = match search_type {
        SearchType::Group => group_search(fields, term)?,
        SearchType::Artifact => artifact_search(fields, term)?,
        SearchType::Parent => parent_search(fields, term)?,
        SearchType::Plugin => plugin_search(fields, term)?,
        SearchType::Archetype => archetype_search(fields, term)?,
        SearchType::Packaging => packaging_search(fields, term)?,
        SearchType::Sha1 => sha1_search(fields, term)?,
        SearchType::ClassName => class_name_search(fields, term)?,
    };

    let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Must, shape)];
    for classifier in mask.excluded_classifiers() {
        clauses.push((Occur::MustNot, exact(fields.classifier, classifier)));
    }
    Ok(Box::new(BooleanQuery::new(clauses)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::schema::build_schema;

    #[test]
    fn test_escape_regex() {
        assert_eq!(escape_regex("org.acme"), "org\\.acme");
        assert_eq!(escape_regex("a+b(c)"), "a\\+b\\(c\\)");
        assert_eq!(escape_regex("plain-id_1"), "plain-id_1");
    }

    #[test]
    fn test_sha1_expression_kind() {
        let full = "a".repeat(40);
        assert_eq!(sha1_expression(&full).kind, MatchKind::Exact);
        assert_eq!(sha1_expression("ABCDEF0123").kind, MatchKind::Partial);
        assert_eq!(sha1_expression("ABCDEF0123").value, "abcdef0123");
    }

    #[test]
    fn test_every_field_is_mapped() {
        let fields = ArtifactFields::new(&build_schema()).unwrap();
        for (search_field, _) in FIELD_TABLE.iter() {
            assert_ne!(schema_field(&fields, *search_field), fields.uinfo);
        }
    }

    #[test]
    fn test_find_query_builder() {
        let query = FindQuery::new()
            .group(SearchExpression::exact("com.acme"))
            .version(SearchExpression::exact("1.0"))
            .version(SearchExpression::exact("2.0"));
        assert!(!query.is_empty());
        assert_eq!(query.versions.len(), 2);
        assert!(FindQuery::from_options(None, None, None, None).is_empty());

        let fields = ArtifactFields::new(&build_schema()).unwrap();
        assert!(build_find_query(&fields, &query).is_ok());
    }
}

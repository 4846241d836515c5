use crate::error::{Error, Result};
use crate::DocId;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

/// The indexed fields of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    TableOfContents,
    Infobox,
    Content,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Title, Field::TableOfContents, Field::Infobox, Field::Content];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::TableOfContents => "table_of_contents",
            Field::Infobox => "infobox",
            Field::Content => "content",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "title" => Ok(Field::Title),
            "table_of_contents" | "toc" => Ok(Field::TableOfContents),
            "infobox" => Ok(Field::Infobox),
            "content" => Ok(Field::Content),
            other => Err(Error::UnknownField(other.to_string())),
        }
    }
}

/// Which fields a query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldScope {
    One(Field),
    #[default]
    All,
}

impl FieldScope {
    pub fn fields(self) -> Vec<Field> {
        match self {
            FieldScope::One(field) => vec![field],
            FieldScope::All => Field::ALL.to_vec(),
        }
    }
}

impl From<Option<Field>> for FieldScope {
    fn from(field: Option<Field>) -> Self {
        field.map_or(FieldScope::All, FieldScope::One)
    }
}

/// One value per indexed field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerField<T> {
    pub title: T,
    pub table_of_contents: T,
    pub infobox: T,
    pub content: T,
}

impl<T> PerField<T> {
    pub fn get(&self, field: Field) -> &T {
        match field {
            Field::Title => &self.title,
            Field::TableOfContents => &self.table_of_contents,
            Field::Infobox => &self.infobox,
            Field::Content => &self.content,
        }
    }

    pub fn get_mut(&mut self, field: Field) -> &mut T {
        match field {
            Field::Title => &mut self.title,
            Field::TableOfContents => &mut self.table_of_contents,
            Field::Infobox => &mut self.infobox,
            Field::Content => &mut self.content,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &T)> {
        Field::ALL.into_iter().map(move |field| (field, self.get(field)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub table_of_contents: Vec<String>,
    pub infobox: String,
    pub content: String,
    /// Detected language codes, most likely first.
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Document {
    /// Text of one field as handed to the normalizer. Chapters are newline separated.
    pub fn field_text(&self, field: Field) -> Cow<'_, str> {
        match field {
            Field::Title => Cow::Borrowed(&self.title),
            Field::TableOfContents => Cow::Owned(self.table_of_contents.join("\n")),
            Field::Infobox => Cow::Borrowed(&self.infobox),
            Field::Content => Cow::Borrowed(&self.content),
        }
    }

    pub fn set_field_text(&mut self, field: Field, text: &str) {
        match field {
            Field::Title => self.title = text.to_string(),
            Field::TableOfContents => {
                self.table_of_contents = text
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect()
            }
            Field::Infobox => self.infobox = text.to_string(),
            Field::Content => self.content = text.to_string(),
        }
    }
}

/// Insertion payload; shape is validated before anything is indexed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub table_of_contents: Option<Vec<String>>,
    #[serde(default)]
    pub infobox: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl DocumentInput {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self { title: Some(title.into()), content: Some(content.into()), ..Self::default() }
    }

    pub fn with_infobox(mut self, infobox: impl Into<String>) -> Self {
        self.infobox = Some(infobox.into());
        self
    }

    pub fn with_chapters<I, S>(mut self, chapters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.table_of_contents = Some(chapters.into_iter().map(Into::into).collect());
        self
    }

    pub fn into_document(self) -> Result<Document> {
        let title = match self.title {
            Some(title) if !title.trim().is_empty() => title,
            Some(_) => return Err(Error::InvalidDocument("title is blank".into())),
            None => return Err(Error::InvalidDocument("missing field `title`".into())),
        };
        let content = self
            .content
            .ok_or_else(|| Error::InvalidDocument("missing field `content`".into()))?;
        Ok(Document {
            title,
            table_of_contents: self.table_of_contents.unwrap_or_default(),
            infobox: self.infobox.unwrap_or_default(),
            content,
            languages: self.languages,
            url: self.url,
        })
    }
}

/// Raw documents plus the id allocation policy: freed ids are reused last-freed-first,
/// otherwise ids grow monotonically.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentStore {
    documents: BTreeMap<DocId, Document>,
    freed_ids: Vec<DocId>,
    next_fresh_id: DocId,
}

impl DocumentStore {
    pub fn new() -> Self { Self::default() }

    pub fn allocate_id(&mut self) -> DocId {
        match self.freed_ids.pop() {
            Some(id) => id,
            None => {
                let id = self.next_fresh_id;
                self.next_fresh_id += 1;
                id
            }
        }
    }

    /// Stores `doc` under an id obtained from [`allocate_id`](Self::allocate_id).
    pub fn insert_with_id(&mut self, id: DocId, doc: Document) {
        if id >= self.next_fresh_id {
            self.next_fresh_id = id + 1;
        }
        self.freed_ids.retain(|freed| *freed != id);
        self.documents.insert(id, doc);
    }

    pub fn remove(&mut self, id: DocId) -> Option<Document> {
        let doc = self.documents.remove(&id)?;
        self.freed_ids.push(id);
        Some(doc)
    }

    pub fn get(&self, id: DocId) -> Option<&Document> { self.documents.get(&id) }

    pub fn get_mut(&mut self, id: DocId) -> Option<&mut Document> { self.documents.get_mut(&id) }

    pub fn contains(&self, id: DocId) -> bool { self.documents.contains_key(&id) }

    pub fn len(&self) -> usize { self.documents.len() }

    pub fn is_empty(&self) -> bool { self.documents.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (DocId, &Document)> {
        self.documents.iter().map(|(id, doc)| (*id, doc))
    }

    pub fn freed_ids(&self) -> &[DocId] { &self.freed_ids }

    pub fn next_fresh_id(&self) -> DocId { self.next_fresh_id }

    /// Every id ever issued that is not currently freed: `[0, next_fresh_id) - freed_ids`.
    pub fn universe(&self) -> BTreeSet<DocId> {
        let freed: HashSet<DocId> = self.freed_ids.iter().copied().collect();
        (0..self.next_fresh_id).filter(|id| !freed.contains(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_last_freed_id_first() {
        let mut store = DocumentStore::new();
        for _ in 0..4 {
            let id = store.allocate_id();
            store.insert_with_id(id, Document::default());
        }
        store.remove(1);
        store.remove(3);
        assert_eq!(store.allocate_id(), 3);
        assert_eq!(store.allocate_id(), 1);
        assert_eq!(store.allocate_id(), 4);
    }

    #[test]
    fn universe_excludes_freed_ids() {
        let mut store = DocumentStore::new();
        for _ in 0..3 {
            let id = store.allocate_id();
            store.insert_with_id(id, Document::default());
        }
        store.remove(0);
        assert_eq!(store.universe().into_iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn input_requires_title_and_content() {
        let missing_title = DocumentInput { content: Some("body".into()), ..DocumentInput::default() };
        assert!(matches!(missing_title.into_document(), Err(Error::InvalidDocument(_))));
        let missing_content = DocumentInput { title: Some("t".into()), ..DocumentInput::default() };
        assert!(matches!(missing_content.into_document(), Err(Error::InvalidDocument(_))));
        let doc = DocumentInput::new("t", "body").into_document().unwrap();
        assert!(doc.table_of_contents.is_empty());
    }

    #[test]
    fn parses_field_names() {
        assert_eq!("toc".parse::<Field>().unwrap(), Field::TableOfContents);
        assert_eq!("Content".parse::<Field>().unwrap(), Field::Content);
        assert!("body".parse::<Field>().is_err());
    }
}

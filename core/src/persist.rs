//! On-disk index layout: postings, norms and documents as bincode, the keyword set
//! and a small meta file as JSON. The set is written to a staging directory first and
//! then moved into place file by file, meta last.

use crate::document::DocumentStore;
use crate::error::{Error, Result};
use crate::index::{IndexState, InvertedIndex, Keywords, NormTable};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    pub num_docs: usize,
    pub saved_at: String,
}

#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

const POSTINGS: &str = "postings.bin";
const NORMS: &str = "norms.bin";
const DOCUMENTS: &str = "documents.bin";
const KEYWORDS: &str = "keywords.json";
const META: &str = "meta.json";

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn postings(&self) -> PathBuf { self.root.join(POSTINGS) }
    fn norms(&self) -> PathBuf { self.root.join(NORMS) }
    fn documents(&self) -> PathBuf { self.root.join(DOCUMENTS) }
    fn keywords(&self) -> PathBuf { self.root.join(KEYWORDS) }
    fn meta(&self) -> PathBuf { self.root.join(META) }
    fn staging(&self) -> PathBuf { self.root.join(".staging") }

    /// True when a complete index has been saved here.
    pub fn exists(&self) -> bool { self.meta().is_file() }
}

fn write_bincode<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

fn read_bincode<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(bincode::deserialize_from(reader)?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

pub fn save_state(paths: &IndexPaths, state: &IndexState) -> Result<()> {
    let staging = paths.staging();
    create_dir_all(&staging)?;
    write_bincode(&staging.join(POSTINGS), &state.index)?;
    write_bincode(&staging.join(NORMS), &state.norms)?;
    write_bincode(&staging.join(DOCUMENTS), &state.docs)?;
    write_json(&staging.join(KEYWORDS), &state.keywords)?;
    let meta = MetaFile {
        version: FORMAT_VERSION,
        num_docs: state.num_docs(),
        saved_at: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
    };
    write_json(&staging.join(META), &meta)?;

    for name in [POSTINGS, NORMS, DOCUMENTS, KEYWORDS, META] {
        fs::rename(staging.join(name), paths.root.join(name))?;
    }
    fs::remove_dir(&staging)?;
    tracing::info!(root = %paths.root.display(), num_docs = meta.num_docs, "saved index");
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let meta: MetaFile = read_json(&paths.meta())?;
    if meta.version != FORMAT_VERSION {
        return Err(Error::IncompatibleIndex(meta.version));
    }
    Ok(meta)
}

pub fn load_keywords(paths: &IndexPaths) -> Result<Keywords> {
    read_json(&paths.keywords())
}

pub fn load_state(paths: &IndexPaths) -> Result<IndexState> {
    let meta = load_meta(paths)?;
    let index: InvertedIndex = read_bincode(&paths.postings())?;
    let norms: NormTable = read_bincode(&paths.norms())?;
    let docs: DocumentStore = read_bincode(&paths.documents())?;
    let keywords = load_keywords(paths)?;
    tracing::info!(root = %paths.root.display(), num_docs = meta.num_docs, saved_at = %meta.saved_at, "loaded index");
    Ok(IndexState { index, norms, docs, keywords })
}

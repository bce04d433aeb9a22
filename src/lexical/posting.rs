//! Postings and posting lists.

use serde::{Deserialize, Serialize};

/// Occurrence of one term in one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// External document id.
    pub doc_id: String,

    /// Number of times the term appears in the document.
    pub term_frequency: u32,

    /// Word positions of each occurrence, when positions are stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positions: Option<Vec<u32>>,
}

/// The postings of a single term, sorted by ascending document id.
///
/// Sorting keeps lookups logarithmic and makes iteration order (and therefore
/// candidate generation) independent of insertion history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostingList {
    postings: Vec<Posting>,
}

impl PostingList {
    pub fn new() -> Self {
        PostingList {
            postings: Vec::new(),
        }
    }

    fn position_of(&self, doc_id: &str) -> std::result::Result<usize, usize> {
        self.postings
            .binary_search_by(|p| p.doc_id.as_str().cmp(doc_id))
    }

    /// Insert a posting, replacing any existing posting for the same document.
    pub fn insert(&mut self, posting: Posting) {
        match self.position_of(&posting.doc_id) {
            Ok(idx) => self.postings[idx] = posting,
            Err(idx) => self.postings.insert(idx, posting),
        }
    }

    /// Remove the posting for a document, returning it if present.
    pub fn remove(&mut self, doc_id: &str) -> Option<Posting> {
        match self.position_of(doc_id) {
            Ok(idx) => Some(self.postings.remove(idx)),
            Err(_) => None,
        }
    }

    /// Find the posting for a document.
    pub fn get(&self, doc_id: &str) -> Option<&Posting> {
        self.position_of(doc_id).ok().map(|idx| &self.postings[idx])
    }

    pub fn as_slice(&self) -> &[Posting] {
        &self.postings
    }

    pub fn iter(&self) -> impl Iterator<Item = &Posting> {
        self.postings.iter()
    }

    /// Number of postings (the term's document frequency).
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Restore ordering after bulk loading. Returns `false` on duplicate ids.
    pub(crate) fn normalize(&mut self) -> bool {
        self.postings.sort_by(|a, b| a.doc_id.cmp(&b.doc_id));
        self.postings.windows(2).all(|w| w[0].doc_id != w[1].doc_id)
    }
}

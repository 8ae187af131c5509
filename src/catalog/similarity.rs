//! Bag-of-words embeddings for the development backend.
//!
//! A stand-in for a model-backed embedding service: text is folded to
//! lowercase alphanumeric terms and compared by cosine similarity over
//! term counts.

use std::collections::BTreeMap;

use bookkeep_core::Book;

/// Sparse term-count vector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Embedding(BTreeMap<String, f64>);

impl Embedding {
    pub fn of(text: &str) -> Self {
        let mut terms = BTreeMap::new();
        for term in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.chars().count() > 1)
        {
            *terms.entry(term.to_lowercase()).or_insert(0.0) += 1.0;
        }
        Self(terms)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn norm(&self) -> f64 {
        self.0.values().map(|w| w * w).sum::<f64>().sqrt()
    }

    /// Cosine similarity in `[0, 1]`; 0 when either side is empty.
    pub fn cosine(&self, other: &Embedding) -> f64 {
        let (small, large) = if self.0.len() <= other.0.len() {
            (self, other)
        } else {
            (other, self)
        };
        let dot: f64 = small
            .0
            .iter()
            .filter_map(|(term, w)| large.0.get(term).map(|v| w * v))
            .sum();
        let denom = self.norm() * other.norm();
        if denom == 0.0 {
            0.0
        } else {
            dot / denom
        }
    }
}

/// Text a book is embedded from: title, description, author, category.
pub fn book_text(book: &Book) -> String {
    let mut parts = vec![book.title.clone()];
    if let Some(description) = book.description.as_deref().filter(|d| !d.trim().is_empty()) {
        parts.push(description.to_string());
    }
    if let Some(author) = &book.author_name {
        parts.push(format!("Author: {author}"));
    }
    if let Some(category) = &book.category_name {
        parts.push(format!("Category: {category}"));
    }
    parts.join(". ")
}

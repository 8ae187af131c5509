use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use bookkeep_core::local_time;
use bookkeep_core::{
    Author, AuthorCreate, Book, BookCreate, BookFilter, Category, CategoryCreate, EmbeddingUpdate,
    Page, PageRequest, RecomputeSummary, ScoredBook, SortDir,
};
use jiff::civil::DateTime;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::catalog::similarity::{book_text, Embedding};
use crate::catalog::{validate_author, validate_book, validate_category, Catalog};
use crate::error::{Error, Result};

struct BookRow {
    book: Book,
    embedding: Option<Embedding>,
}

#[derive(Default)]
struct Store {
    books: BTreeMap<u64, BookRow>,
    authors: BTreeMap<u64, Author>,
    categories: BTreeMap<u64, Category>,
    next_book: u64,
    next_author: u64,
    next_category: u64,
}

/// In-memory catalog
///
/// Ids are per-kind sequences starting at 1. Books copy the author and
/// category names at write time.
#[derive(Default)]
pub struct MemoryCatalog {
    store: RwLock<Store>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog preloaded with a handful of authors, categories, and books.
    pub async fn seeded() -> Result<Self> {
        let catalog = Self::new();
        catalog.seed().await?;
        Ok(catalog)
    }

    async fn seed(&self) -> Result<()> {
        let authors = [
            ("Rob Pike", "rob@example.com", "Co-creator of Go."),
            ("Steve Klabnik", "steve@example.com", "Long-time Rust community member."),
            ("Martin Kleppmann", "martin@example.com", "Researcher in distributed systems."),
        ];
        let mut author_ids = Vec::new();
        for (name, email, biography) in authors {
            let author = self
                .create_author(AuthorCreate {
                    name: name.to_string(),
                    email: email.to_string(),
                    biography: Some(biography.to_string()),
                })
                .await?;
            author_ids.push(author.id);
        }

        let categories = [
            ("Programming", "Languages and the craft of writing software"),
            ("Distributed Systems", "Data systems at scale"),
        ];
        let mut category_ids = Vec::new();
        for (name, description) in categories {
            let category = self
                .create_category(CategoryCreate {
                    name: name.to_string(),
                    description: Some(description.to_string()),
                })
                .await?;
            category_ids.push(category.id);
        }

        let books = [
            ("The Go Programming Language", "978-0134190440", "Concurrency and interfaces in Go.", 34.99, 2015, 12, 0, 0),
            ("The Rust Programming Language", "978-1718503106", "Ownership, borrowing and fearless concurrency in Rust.", 39.95, 2023, 7, 1, 0),
            ("Designing Data-Intensive Applications", "978-1449373320", "Replication, partitioning and consensus in distributed data systems.", 44.5, 2017, 3, 2, 1),
        ];
        for (title, isbn, description, price, year, stock, author, category) in books {
            self.create_book(BookCreate {
                title: title.to_string(),
                isbn: isbn.to_string(),
                description: Some(description.to_string()),
                price,
                publication_year: Some(year),
                stock_quantity: stock,
                pages: None,
                language: Some("English".to_string()),
                author_id: author_ids[author].clone(),
                category_id: category_ids[category].clone(),
            })
            .await?;
        }

        info!("Seeded catalog with {} books", books.len());
        Ok(())
    }
}

fn parse_id(kind: &'static str, id: &str) -> Result<u64> {
    id.trim().parse().map_err(|_| Error::not_found(kind, id))
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Comparable value of a sortable field.
#[derive(Debug, PartialEq, PartialOrd)]
enum Key {
    Missing,
    Number(f64),
    Time(DateTime),
    Text(String),
}

impl Key {
    fn text(value: &str) -> Self {
        Key::Text(value.to_lowercase())
    }

    fn id(value: &str) -> Self {
        value.parse().map_or_else(|_| Key::text(value), Key::Number)
    }

    fn time(value: Option<DateTime>) -> Self {
        value.map_or(Key::Missing, Key::Time)
    }
}

type KeyFn<T> = fn(&T) -> Key;

fn book_key(field: &str) -> Option<KeyFn<Book>> {
    let key: KeyFn<Book> = match field {
        "id" => |b| Key::id(&b.id),
        "title" => |b| Key::text(&b.title),
        "isbn" => |b| Key::text(&b.isbn),
        "price" => |b| Key::Number(b.price),
        "publicationYear" => |b| b.publication_year.map_or(Key::Missing, |y| Key::Number(y.into())),
        "stockQuantity" => |b| Key::Number(b.stock_quantity.into()),
        "pages" => |b| b.pages.map_or(Key::Missing, |p| Key::Number(p.into())),
        "authorName" => |b| b.author_name.as_deref().map_or(Key::Missing, Key::text),
        "categoryName" => |b| b.category_name.as_deref().map_or(Key::Missing, Key::text),
        "createdAt" => |b| Key::time(b.created_at),
        "updatedAt" => |b| Key::time(b.updated_at),
        _ => return None,
    };
    Some(key)
}

fn author_key(field: &str) -> Option<KeyFn<Author>> {
    let key: KeyFn<Author> = match field {
        "id" => |a| Key::id(&a.id),
        "name" => |a| Key::text(&a.name),
        "email" => |a| Key::text(&a.email),
        "createdAt" => |a| Key::time(a.created_at),
        "updatedAt" => |a| Key::time(a.updated_at),
        _ => return None,
    };
    Some(key)
}

fn category_key(field: &str) -> Option<KeyFn<Category>> {
    let key: KeyFn<Category> = match field {
        "id" => |c| Key::id(&c.id),
        "name" => |c| Key::text(&c.name),
        "booksCount" => |c| c.books_count.map_or(Key::Missing, |n| Key::Number(n.into())),
        "createdAt" => |c| Key::time(c.created_at),
        "updatedAt" => |c| Key::time(c.updated_at),
        _ => return None,
    };
    Some(key)
}

/// Stable sort by the requested field; unknown fields are rejected.
fn sort<T>(items: &mut [T], paging: &PageRequest, key_for: fn(&str) -> Option<KeyFn<T>>) -> Result<()> {
    let key = key_for(&paging.sort_by)
        .ok_or_else(|| Error::BadRequest(format!("Unknown sort property: {}", paging.sort_by)))?;
    items.sort_by(|a, b| {
        let order = key(a).partial_cmp(&key(b)).unwrap_or(Ordering::Equal);
        match paging.sort_dir {
            SortDir::Asc => order,
            SortDir::Desc => order.reverse(),
        }
    });
    Ok(())
}

fn paginate<T>(items: Vec<T>, paging: &PageRequest) -> Page<T> {
    let size = paging.size.max(1);
    let total = items.len() as u64;
    let start = paging.page as usize * size as usize;
    let items = items.into_iter().skip(start).take(size as usize).collect();
    Page::new(items, total, paging.page, size)
}

fn matches_book(book: &Book, filter: &BookFilter) -> bool {
    if let Some(title) = filter.title.as_deref().filter(|t| !t.is_empty()) {
        if !contains_ignore_case(&book.title, title) {
            return false;
        }
    }
    if let Some(author_id) = &filter.author_id {
        if book.author_id.as_ref() != Some(author_id) {
            return false;
        }
    }
    if let Some(category_id) = &filter.category_id {
        if book.category_id.as_ref() != Some(category_id) {
            return false;
        }
    }
    if filter.min_price.is_some_and(|min| book.price < min) {
        return false;
    }
    if filter.max_price.is_some_and(|max| book.price > max) {
        return false;
    }
    if filter.stock_threshold.is_some_and(|limit| book.stock_quantity > limit) {
        return false;
    }
    true
}

impl Store {
    fn author_name(&self, id: &str) -> Result<String> {
        let key = parse_id("Author", id)?;
        self.authors
            .get(&key)
            .map(|a| a.name.clone())
            .ok_or_else(|| Error::not_found("Author", id))
    }

    fn category_name(&self, id: &str) -> Result<String> {
        let key = parse_id("Category", id)?;
        self.categories
            .get(&key)
            .map(|c| c.name.clone())
            .ok_or_else(|| Error::not_found("Category", id))
    }

    fn books_in(&self, category_id: &str) -> u32 {
        self.books
            .values()
            .filter(|row| row.book.category_id.as_deref() == Some(category_id))
            .count() as u32
    }

    fn with_count(&self, mut category: Category) -> Category {
        category.books_count = Some(self.books_in(&category.id));
        category
    }

    fn categories_matching(&self, name: Option<&str>) -> Vec<Category> {
        self.categories
            .values()
            .filter(|c| name.map_or(true, |n| contains_ignore_case(&c.name, n)))
            .map(|c| self.with_count(c.clone()))
            .collect()
    }

    /// Write the denormalized names from the referenced records.
    fn fill_book(&self, book: &mut Book, dto: BookCreate) -> Result<()> {
        let author_name = self.author_name(&dto.author_id)?;
        let category_name = self.category_name(&dto.category_id)?;

        book.title = dto.title.trim().to_string();
        book.isbn = dto.isbn.trim().to_string();
        book.description = dto.description;
        book.price = dto.price;
        book.publication_year = dto.publication_year;
        book.stock_quantity = dto.stock_quantity;
        book.pages = dto.pages;
        book.language = dto.language;
        book.author_id = Some(dto.author_id);
        book.author_name = Some(author_name);
        book.category_id = Some(dto.category_id);
        book.category_name = Some(category_name);
        Ok(())
    }

    fn book_row(&self, id: &str) -> Result<&BookRow> {
        let key = parse_id("Book", id)?;
        self.books.get(&key).ok_or_else(|| Error::not_found("Book", id))
    }

    /// Re-copy an author or category name into every book that refers to it.
    fn rename_in_books(&mut self, author: Option<(&str, &str)>, category: Option<(&str, &str)>) {
        for row in self.books.values_mut() {
            if let Some((id, name)) = author {
                if row.book.author_id.as_deref() == Some(id) {
                    row.book.author_name = Some(name.to_string());
                }
            }
            if let Some((id, name)) = category {
                if row.book.category_id.as_deref() == Some(id) {
                    row.book.category_name = Some(name.to_string());
                }
            }
        }
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn list_books(&self, paging: &PageRequest, filter: &BookFilter) -> Result<Page<Book>> {
        let store = self.store.read().await;
        let mut books: Vec<Book> = store
            .books
            .values()
            .map(|row| &row.book)
            .filter(|book| matches_book(book, filter))
            .cloned()
            .collect();
        sort(&mut books, paging, book_key)?;
        Ok(paginate(books, paging))
    }

    async fn search_books(&self, title: &str) -> Result<Vec<Book>> {
        let store = self.store.read().await;
        Ok(store
            .books
            .values()
            .filter(|row| contains_ignore_case(&row.book.title, title))
            .map(|row| row.book.clone())
            .collect())
    }

    async fn get_book(&self, id: &str) -> Result<Book> {
        let store = self.store.read().await;
        Ok(store.book_row(id)?.book.clone())
    }

    async fn create_book(&self, dto: BookCreate) -> Result<Book> {
        validate_book(&dto)?;
        let mut store = self.store.write().await;

        let now = local_time::now();
        let mut book = Book {
            id: String::new(),
            title: String::new(),
            isbn: String::new(),
            description: None,
            price: 0.0,
            publication_year: None,
            stock_quantity: 0,
            pages: None,
            language: None,
            author_id: None,
            author_name: None,
            category_id: None,
            category_name: None,
            created_at: Some(now),
            updated_at: Some(now),
        };
        store.fill_book(&mut book, dto)?;

        store.next_book += 1;
        let key = store.next_book;
        book.id = key.to_string();
        store.books.insert(
            key,
            BookRow {
                book: book.clone(),
                embedding: None,
            },
        );

        debug!("Created book {} ({})", book.id, book.title);
        Ok(book)
    }

    async fn update_book(&self, id: &str, dto: BookCreate) -> Result<Book> {
        validate_book(&dto)?;
        let mut store = self.store.write().await;
        let mut book = store.book_row(id)?.book.clone();
        store.fill_book(&mut book, dto)?;
        book.updated_at = Some(local_time::now());

        let key = parse_id("Book", id)?;
        // Text changed; the old embedding no longer describes the book.
        store.books.insert(
            key,
            BookRow {
                book: book.clone(),
                embedding: None,
            },
        );
        Ok(book)
    }

    async fn delete_book(&self, id: &str) -> Result<()> {
        let key = parse_id("Book", id)?;
        let mut store = self.store.write().await;
        store
            .books
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("Book", id))
    }

    async fn list_authors(&self, paging: &PageRequest, name: Option<&str>) -> Result<Page<Author>> {
        let store = self.store.read().await;
        let mut authors: Vec<Author> = store
            .authors
            .values()
            .filter(|a| name.map_or(true, |n| contains_ignore_case(&a.name, n)))
            .cloned()
            .collect();
        sort(&mut authors, paging, author_key)?;
        Ok(paginate(authors, paging))
    }

    async fn search_authors(&self, name: &str) -> Result<Vec<Author>> {
        let store = self.store.read().await;
        Ok(store
            .authors
            .values()
            .filter(|a| contains_ignore_case(&a.name, name))
            .cloned()
            .collect())
    }

    async fn get_author(&self, id: &str) -> Result<Author> {
        let key = parse_id("Author", id)?;
        let store = self.store.read().await;
        store
            .authors
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::not_found("Author", id))
    }

    async fn create_author(&self, dto: AuthorCreate) -> Result<Author> {
        validate_author(&dto)?;
        let mut store = self.store.write().await;

        store.next_author += 1;
        let key = store.next_author;
        let now = local_time::now();
        let author = Author {
            id: key.to_string(),
            name: dto.name.trim().to_string(),
            email: dto.email.trim().to_string(),
            biography: dto.biography,
            created_at: Some(now),
            updated_at: Some(now),
        };
        store.authors.insert(key, author.clone());

        debug!("Created author {} ({})", author.id, author.name);
        Ok(author)
    }

    async fn update_author(&self, id: &str, dto: AuthorCreate) -> Result<Author> {
        validate_author(&dto)?;
        let key = parse_id("Author", id)?;
        let mut store = self.store.write().await;
        let author = store
            .authors
            .get_mut(&key)
            .ok_or_else(|| Error::not_found("Author", id))?;

        author.name = dto.name.trim().to_string();
        author.email = dto.email.trim().to_string();
        author.biography = dto.biography;
        author.updated_at = Some(local_time::now());
        let author = author.clone();

        store.rename_in_books(Some((&author.id, &author.name)), None);
        Ok(author)
    }

    async fn delete_author(&self, id: &str) -> Result<()> {
        let key = parse_id("Author", id)?;
        let mut store = self.store.write().await;
        if !store.authors.contains_key(&key) {
            return Err(Error::not_found("Author", id));
        }
        if store.books.values().any(|row| row.book.author_id.as_deref() == Some(id)) {
            return Err(Error::BadRequest(format!("Author {id} still has books")));
        }
        store.authors.remove(&key);
        Ok(())
    }

    async fn list_categories(&self, paging: &PageRequest, name: Option<&str>) -> Result<Vec<Category>> {
        let store = self.store.read().await;
        let mut categories = store.categories_matching(name);
        sort(&mut categories, paging, category_key)?;
        Ok(categories)
    }

    async fn search_categories(&self, name: &str) -> Result<Vec<Category>> {
        let store = self.store.read().await;
        Ok(store.categories_matching(Some(name)))
    }

    async fn get_category(&self, id: &str) -> Result<Category> {
        let key = parse_id("Category", id)?;
        let store = self.store.read().await;
        let category = store
            .categories
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::not_found("Category", id))?;
        Ok(store.with_count(category))
    }

    async fn create_category(&self, dto: CategoryCreate) -> Result<Category> {
        validate_category(&dto)?;
        let mut store = self.store.write().await;

        store.next_category += 1;
        let key = store.next_category;
        let now = local_time::now();
        let category = Category {
            id: key.to_string(),
            name: dto.name.trim().to_string(),
            description: dto.description,
            books_count: Some(0),
            created_at: Some(now),
            updated_at: Some(now),
        };
        store.categories.insert(key, category.clone());

        debug!("Created category {} ({})", category.id, category.name);
        Ok(category)
    }

    async fn update_category(&self, id: &str, dto: CategoryCreate) -> Result<Category> {
        validate_category(&dto)?;
        let key = parse_id("Category", id)?;
        let mut store = self.store.write().await;
        let category = store
            .categories
            .get_mut(&key)
            .ok_or_else(|| Error::not_found("Category", id))?;

        category.name = dto.name.trim().to_string();
        category.description = dto.description;
        category.updated_at = Some(local_time::now());
        let category = category.clone();

        store.rename_in_books(None, Some((&category.id, &category.name)));
        Ok(store.with_count(category))
    }

    async fn delete_category(&self, id: &str) -> Result<()> {
        let key = parse_id("Category", id)?;
        let mut store = self.store.write().await;
        if !store.categories.contains_key(&key) {
            return Err(Error::not_found("Category", id));
        }
        if store.books_in(id) > 0 {
            return Err(Error::BadRequest(format!("Category {id} still has books")));
        }
        store.categories.remove(&key);
        Ok(())
    }

    async fn recommendations(&self, book_id: &str, size: usize) -> Result<Vec<ScoredBook>> {
        let store = self.store.read().await;
        let target = store.book_row(book_id)?;
        let embedding = target.embedding.as_ref().ok_or_else(|| {
            Error::BadRequest(format!(
                "Book {book_id} has no embedding; recompute embeddings first"
            ))
        })?;

        let candidates = store
            .books
            .values()
            .filter(|row| row.book.id != target.book.id);
        Ok(rank(candidates, embedding, size))
    }

    async fn semantic_search(&self, query: &str, size: usize) -> Result<Vec<ScoredBook>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::BadRequest("Query must not be empty".to_string()));
        }
        let embedding = Embedding::of(query);
        let store = self.store.read().await;
        Ok(rank(store.books.values(), &embedding, size))
    }

    async fn recompute_embeddings(&self, force: bool) -> Result<RecomputeSummary> {
        let mut store = self.store.write().await;
        let total = store.books.len() as u32;
        let mut updated = 0;
        for row in store.books.values_mut() {
            if row.embedding.is_some() && !force {
                continue;
            }
            row.embedding = Some(Embedding::of(&book_text(&row.book)));
            updated += 1;
        }

        info!("Recomputed embeddings for {} of {} books", updated, total);
        Ok(RecomputeSummary {
            updated,
            total,
            message: format!("Successfully computed embeddings for {updated} books"),
        })
    }

    async fn update_book_embedding(&self, book_id: &str) -> Result<EmbeddingUpdate> {
        let key = parse_id("Book", book_id)?;
        let mut store = self.store.write().await;
        let row = store
            .books
            .get_mut(&key)
            .ok_or_else(|| Error::not_found("Book", book_id))?;
        row.embedding = Some(Embedding::of(&book_text(&row.book)));

        Ok(EmbeddingUpdate {
            book_id: row.book.id.clone(),
            ok: Some(true),
            message: Some("Embedding updated successfully".to_string()),
        })
    }
}

/// Embedded candidates by descending similarity, at most `size`.
fn rank<'a>(
    candidates: impl Iterator<Item = &'a BookRow>,
    query: &Embedding,
    size: usize,
) -> Vec<ScoredBook> {
    let mut scored: Vec<ScoredBook> = candidates
        .filter_map(|row| {
            let embedding = row.embedding.as_ref()?;
            Some(ScoredBook {
                book_id: row.book.id.clone(),
                title: row.book.title.clone(),
                score: query.cosine(embedding),
            })
        })
        .collect();
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(size);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paging(page: u32, size: u32, sort_by: &str, sort_dir: SortDir) -> PageRequest {
        PageRequest {
            page,
            size,
            sort_by: sort_by.to_string(),
            sort_dir,
        }
    }

    fn book(title: &str, price: f64, stock: u32, author_id: &str, category_id: &str) -> BookCreate {
        BookCreate {
            title: title.to_string(),
            isbn: format!("isbn-{title}"),
            description: None,
            price,
            publication_year: None,
            stock_quantity: stock,
            pages: None,
            language: None,
            author_id: author_id.to_string(),
            category_id: category_id.to_string(),
        }
    }

    async fn catalog_with_refs() -> MemoryCatalog {
        let catalog = MemoryCatalog::new();
        catalog
            .create_author(AuthorCreate {
                name: "Rob Pike".into(),
                email: "rob@example.com".into(),
                biography: None,
            })
            .await
            .unwrap();
        catalog
            .create_category(CategoryCreate {
                name: "Programming".into(),
                description: None,
            })
            .await
            .unwrap();
        catalog
    }

    #[tokio::test]
    async fn create_book_copies_names() {
        let catalog = catalog_with_refs().await;

        let created = catalog.create_book(book("Go", 10.0, 1, "1", "1")).await.unwrap();

        assert_eq!(created.id, "1");
        assert_eq!(created.author_name.as_deref(), Some("Rob Pike"));
        assert_eq!(created.category_name.as_deref(), Some("Programming"));
        assert_eq!(catalog.get_book("1").await.unwrap(), created);
    }

    #[tokio::test]
    async fn create_book_with_unknown_author_is_not_found() {
        let catalog = catalog_with_refs().await;

        let err = catalog.create_book(book("Go", 10.0, 1, "7", "1")).await.unwrap_err();

        assert!(matches!(err, Error::NotFound { kind: "Author", .. }));
    }

    #[tokio::test]
    async fn list_sorts_filters_and_pages() {
        let catalog = catalog_with_refs().await;
        for (title, price, stock) in [("Go", 30.0, 2), ("Ada", 10.0, 8), ("Rust", 20.0, 0)] {
            catalog.create_book(book(title, price, stock, "1", "1")).await.unwrap();
        }

        let page = catalog
            .list_books(&paging(0, 2, "title", SortDir::Asc), &BookFilter::default())
            .await
            .unwrap();
        let titles: Vec<_> = page.items.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, ["Ada", "Go"]);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.total_elements, 3);

        let under_25 = catalog
            .list_books(&paging(0, 10, "price", SortDir::Desc), &BookFilter {
                max_price: Some(25.0),
                ..Default::default()
            })
            .await
            .unwrap();
        let titles: Vec<_> = under_25.items.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, ["Rust", "Ada"]);

        let low_stock = catalog
            .list_books(&paging(0, 10, "id", SortDir::Asc), &BookFilter {
                stock_threshold: Some(5),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(low_stock.total_elements, 2);

        // The threshold itself still counts as low stock.
        let at_threshold = catalog
            .list_books(&paging(0, 10, "stockQuantity", SortDir::Asc), &BookFilter {
                stock_threshold: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        let titles: Vec<_> = at_threshold.items.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, ["Rust", "Go"]);
    }

    #[tokio::test]
    async fn unknown_sort_field_is_rejected() {
        let catalog = MemoryCatalog::new();

        let err = catalog
            .list_authors(&paging(0, 10, "shoeSize", SortDir::Asc), None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[tokio::test]
    async fn renaming_author_updates_books() {
        let catalog = catalog_with_refs().await;
        catalog.create_book(book("Go", 10.0, 1, "1", "1")).await.unwrap();

        catalog
            .update_author("1", AuthorCreate {
                name: "R. Pike".into(),
                email: "rob@example.com".into(),
                biography: None,
            })
            .await
            .unwrap();

        let book = catalog.get_book("1").await.unwrap();
        assert_eq!(book.author_name.as_deref(), Some("R. Pike"));
    }

    #[tokio::test]
    async fn category_with_books_cannot_be_deleted() {
        let catalog = catalog_with_refs().await;
        catalog.create_book(book("Go", 10.0, 1, "1", "1")).await.unwrap();

        assert_eq!(catalog.get_category("1").await.unwrap().books_count, Some(1));
        assert!(matches!(catalog.delete_category("1").await, Err(Error::BadRequest(_))));

        catalog.delete_book("1").await.unwrap();
        catalog.delete_category("1").await.unwrap();
        assert!(matches!(catalog.delete_category("1").await, Err(Error::NotFound { .. })));
    }

    #[tokio::test]
    async fn recommendations_need_embeddings() {
        let catalog = MemoryCatalog::seeded().await.unwrap();

        let err = catalog.recommendations("1", 6).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));

        let summary = catalog.recompute_embeddings(false).await.unwrap();
        assert_eq!(summary.updated, 3);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.message, "Successfully computed embeddings for 3 books");

        let again = catalog.recompute_embeddings(false).await.unwrap();
        assert_eq!(again.updated, 0);

        // Go and Rust share the Programming category and "concurrency".
        let similar = catalog.recommendations("1", 6).await.unwrap();
        assert_eq!(similar.len(), 2);
        assert_eq!(similar[0].book_id, "2");
        assert!(similar.iter().all(|s| s.book_id != "1"));
    }

    #[tokio::test]
    async fn semantic_search_ranks_best_match_first() {
        let catalog = MemoryCatalog::seeded().await.unwrap();
        catalog.recompute_embeddings(true).await.unwrap();

        let hits = catalog.semantic_search("distributed consensus", 1).await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Designing Data-Intensive Applications");
        assert!(hits[0].score > 0.0);
    }

    #[tokio::test]
    async fn single_embedding_update() {
        let catalog = MemoryCatalog::seeded().await.unwrap();

        let update = catalog.update_book_embedding("2").await.unwrap();
        assert_eq!(update.book_id, "2");
        assert_eq!(update.ok, Some(true));

        let hits = catalog.semantic_search("ownership borrowing", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(matches!(
            catalog.update_book_embedding("99").await,
            Err(Error::NotFound { .. })
        ));
    }
}

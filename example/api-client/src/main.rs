//! Client example for bookkeep
//!
//! Walks through the bookstore API with a `Session`: creates an author, a
//! category and a book, pages through the lists, asks the AI endpoints for
//! similar books, then cleans up.
//!
//! Usage:
//!   bookkeep serve &
//!   cargo run -p api-client [--url http://localhost:8080/api]

use bookkeep::{Config, Session};
use bookkeep_core::{AuthorCreate, BookCreate, CategoryCreate, SortDir};

const DEFAULT_URL: &str = "http://localhost:8080/api";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let base_url = std::env::args()
        .nth(1)
        .filter(|arg| !arg.starts_with('-'))
        .or_else(|| {
            std::env::args()
                .skip_while(|arg| arg != "--url")
                .nth(1)
        })
        .unwrap_or_else(|| DEFAULT_URL.to_string());

    println!("Bookkeep API Client Demo");
    println!("========================\n");
    println!("Connecting to: {}\n", base_url);

    let config = Config {
        base_url,
        ..Config::default()
    };
    let session = Session::new(&config)?;

    // 1. Create an author and a category
    println!("1. Creating an author and a category...\n");
    let author = session
        .authors()
        .mutations()
        .create(&AuthorCreate {
            name: "Ada Lovelace".to_string(),
            email: "ada@lovelace.dev".to_string(),
            biography: Some("Wrote the first published algorithm.".to_string()),
        })
        .await?;
    println!("   Author #{}: {} <{}>", author.id, author.name, author.email);

    let category = session
        .categories()
        .mutations()
        .create(&CategoryCreate {
            name: "Computing History".to_string(),
            description: None,
        })
        .await?;
    println!("   Category #{}: {}\n", category.id, category.name);

    // 2. Create a book
    println!("2. Creating a book...\n");
    let book = session
        .books()
        .mutations()
        .create(&BookCreate {
            title: "Notes on the Analytical Engine".to_string(),
            isbn: "978-0000000001".to_string(),
            description: Some("Commentary on Babbage's engine and its programs.".to_string()),
            price: 19.99,
            publication_year: Some(1843),
            stock_quantity: 5,
            pages: Some(66),
            language: Some("English".to_string()),
            author_id: author.id.clone(),
            category_id: category.id.clone(),
        })
        .await?;
    println!("   Book #{}: {}\n", book.id, book.title);

    // 3. List books sorted by title
    println!("3. Listing books by title...\n");
    let books = session.books();
    books
        .set_params(books.params().with_sort("title", SortDir::Asc))
        .await?;
    let state = books.state();
    if let Some(error) = &state.error {
        println!("   Listing failed: {}", error);
    }
    println!(
        "   {} book(s), page {}/{}:\n",
        state.total_elements,
        state.current_page + 1,
        state.total_pages.max(1)
    );
    for book in &state.items {
        println!(
            "   - {} by {} ({:.2})",
            book.title,
            book.author_name.as_deref().unwrap_or("unknown"),
            book.price
        );
    }
    println!();

    // 4. Ask for similar books
    println!("4. Computing embeddings and recommendations...\n");
    let summary = session.ai().recompute_embeddings(false).await?;
    println!("   {}", summary.message);
    match session.ai().recommendations(&book.id, 3).await {
        Ok(hits) if hits.is_empty() => println!("   No similar books yet."),
        Ok(hits) => {
            for hit in hits {
                println!("   - {} (score {:.3})", hit.title, hit.score);
            }
        }
        Err(e) => println!("   Recommendations unavailable: {}", e.message),
    }
    println!();

    // 5. Clean up
    println!("5. Cleaning up...\n");
    session.books().mutations().delete(&book.id).await?;
    session.categories().mutations().delete(&category.id).await?;
    session.authors().mutations().delete(&author.id).await?;
    println!("   Removed book, category and author.");

    session.close();
    println!("\nDone!");
    Ok(())
}

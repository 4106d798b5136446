use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures::StreamExt;
use hashbrown::HashMap;
use lazy_collect::{
    AllBatch, BatchBuilder, BatchUncached, Collected, Identifiable, Identity, LazyFieldItem, Page,
    PageLoad, Preloaded, Result, States, WHOLE_ITEM,
};

const DELAY_MS: u64 = 50;

/// Books whose ids are cheap to list, their content is fetched in batches
mod cheap_ids {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub struct BookContent {
        pub id: Identity,
        pub name: String,
    }

    pub static FETCHES: AtomicUsize = AtomicUsize::new(0);

    async fn load_contents(ids: Vec<Identity>) -> Result<HashMap<Identity, BookContent>> {
        FETCHES.fetch_add(1, Ordering::SeqCst);
        // simulated load delay
        tokio::time::sleep(Duration::from_millis(10 + ids.len() as u64)).await;

        Ok(ids
            .into_iter()
            .map(|id| {
                let content = BookContent {
                    id: id.clone(),
                    name: "Some Name".to_string(),
                };
                (id, content)
            })
            .collect())
    }

    pub type ContentHandler = Arc<dyn Collected<BookContent> + Send + Sync>;

    pub fn content_handler() -> ContentHandler {
        Arc::new(BatchBuilder::new(load_contents).delay_ms(10).build())
    }

    pub struct BatchBook {
        pub id: Identity,
        contents: ContentHandler,
    }

    impl BatchBook {
        pub fn new(id: &Identity, contents: &ContentHandler) -> Self {
            BatchBook {
                id: id.clone(),
                contents: Arc::clone(contents),
            }
        }

        pub fn name(&self) -> Option<String> {
            self.contents.get(&self.id).map(|content| content.name)
        }
    }
}

/// Books whose ids are only known by walking the collection
mod expensive_ids {
    use super::*;

    #[derive(Clone)]
    pub struct Book(Arc<BookInner>);

    pub struct BookInner {
        name: String,
        fields: LazyFieldItem<Vec<String>>,
    }

    impl Book {
        pub fn new(id: Identity, name: &str) -> Self {
            Book(Arc::new(BookInner {
                name: name.to_string(),
                fields: LazyFieldItem::new(id, Arc::clone(book_states())),
            }))
        }

        pub fn name(&self) -> &str {
            &self.0.name
        }

        pub fn pages(&self) -> Option<Vec<String>> {
            self.0.fields.wait_for("pages")
        }

        pub fn fields(&self) -> &LazyFieldItem<Vec<String>> {
            &self.0.fields
        }
    }

    impl Identifiable for Book {
        fn id(&self) -> Identity {
            self.0.fields.id()
        }
    }

    fn book_states() -> &'static Arc<States<Vec<String>>> {
        static STATES: OnceLock<Arc<States<Vec<String>>>> = OnceLock::new();

        STATES.get_or_init(|| {
            Arc::new(States::new().state("pages", |_id: Identity| async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(vec!["Lorem ipsum dolor sit amet".to_string()])
            }))
        })
    }

    pub struct BookPages {
        pub calls: AtomicUsize,
    }

    impl PageLoad for BookPages {
        type Item = Book;
        type Filter = ();
        type Options = ();
        type Cursor = String;

        async fn load_page(
            &self,
            _filter: Option<&()>,
            _options: Option<&()>,
            _cursor: Option<String>,
        ) -> Result<Page<Book, String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;

            Ok(Page::last(
                [1, 2, 3]
                    .into_iter()
                    .map(|id| Book::new(Identity::from(id), "Test"))
                    .collect(),
            ))
        }
    }

    async fn load_books(ids: Vec<Identity>) -> Result<HashMap<Identity, Book>> {
        tokio::time::sleep(Duration::from_millis(10 + ids.len() as u64)).await;

        Ok(ids
            .into_iter()
            .map(|id| (id.clone(), Book::new(id, "Test")))
            .collect())
    }

    pub fn collection() -> AllBatch<BookPages, impl lazy_collect::Loader<Book>> {
        AllBatch::new(
            BookPages {
                calls: AtomicUsize::new(0),
            },
            BatchUncached::builder(load_books).delay_ms(10).build_uncached(),
        )
    }
}

#[tokio::test(start_paused = true)]
async fn empty_preloaded_collection() {
    let contents = cheap_ids::content_handler();
    let collection = Preloaded::new(Vec::<i64>::new(), |id| cheap_ids::BatchBook::new(id, &contents));

    assert_eq!(collection.get_all().count(), 0);
}

#[tokio::test(start_paused = true)]
async fn preloaded_books_fill_in_their_names() {
    let contents = cheap_ids::content_handler();
    let collection = Preloaded::new(["42", "44", "45"], |id| cheap_ids::BatchBook::new(id, &contents));

    for book in collection.get_all() {
        assert_eq!(book.name(), None, "name is initially unset for {}", book.id);
    }

    tokio::time::sleep(Duration::from_millis(40)).await;

    for book in collection.get_all() {
        assert_eq!(book.name().as_deref(), Some("Some Name"));
    }
    assert_eq!(collection.get(&Identity::from("42")).unwrap().id, Identity::from("42"));
}

#[tokio::test(start_paused = true)]
async fn numeric_and_string_ids_are_different_books() {
    let contents = cheap_ids::content_handler();
    let number = cheap_ids::BatchBook::new(&Identity::from(42), &contents);
    let string = cheap_ids::BatchBook::new(&Identity::from("42"), &contents);

    assert_eq!(number.name(), None);
    tokio::time::sleep(Duration::from_millis(40)).await;

    assert_eq!(number.name().as_deref(), Some("Some Name"));
    // asking for the string id only starts now
    assert_eq!(string.name(), None);
}

#[tokio::test(start_paused = true)]
async fn many_books_fill_in_together() {
    let before = cheap_ids::FETCHES.load(Ordering::SeqCst);
    let contents = cheap_ids::content_handler();
    let books: Vec<_> = (0..20)
        .map(|i| cheap_ids::BatchBook::new(&Identity::from(1000 + i), &contents))
        .collect();

    assert!(books.iter().all(|book| book.name().is_none()));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(books.iter().all(|book| book.name().is_some()));
    // other tests share the counter
    assert!(cheap_ids::FETCHES.load(Ordering::SeqCst) >= before + 1);
}

#[tokio::test(start_paused = true)]
async fn walk_collection_as_a_stream() {
    let collection = expensive_ids::collection();
    let mut books = Box::pin(collection.get_all_iterable(None, None));
    let mut retained = Vec::new();

    while let Some(book) = books.next().await {
        let book = book.unwrap();

        assert_eq!(book.name(), "Test", "name is immediately available");
        assert_eq!(book.pages(), None, "pages are not immediately available");
        retained.push(book);
    }
    assert_eq!(retained.len(), 3);

    tokio::time::sleep(Duration::from_millis(DELAY_MS)).await;

    for book in &retained {
        assert!(book.pages().unwrap()[0].starts_with("Lorem ipsum"));
    }
}

#[tokio::test(start_paused = true)]
async fn walk_collection_at_once() {
    let collection = expensive_ids::collection();

    let retained = collection.get_all(None, None).await.unwrap();
    assert_eq!(retained.len(), 3);
    assert_eq!(collection.walker().pages().calls.load(Ordering::SeqCst), 1);

    for book in &retained {
        assert_eq!(book.name(), "Test");
        assert_eq!(book.pages(), None);
    }

    tokio::time::sleep(Duration::from_millis(DELAY_MS)).await;

    for book in &retained {
        assert!(book.pages().unwrap()[0].starts_with("Lorem ipsum"));
    }

    // walked books are retained for point lookups
    assert!(collection.get(&Identity::from(2)).is_some());
}

#[tokio::test(start_paused = true)]
async fn load_a_single_book() {
    let collection = expensive_ids::collection();

    assert!(collection.get(&Identity::from(1)).is_none(), "book is initially unset");

    tokio::time::sleep(Duration::from_millis(DELAY_MS)).await;

    let book = collection.get(&Identity::from(1)).expect("book is eventually set");
    assert_eq!(book.id(), Identity::from(1));
    assert_eq!(book.name(), "Test");
    assert!(book.fields().state(WHOLE_ITEM).is_absent());
}

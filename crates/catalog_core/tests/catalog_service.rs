use catalog_core::db::migrations::latest_version;
use catalog_core::db::{open_store_in_memory, MEMORY_ADDRESS};
use catalog_core::{Book, BookPatch, CatalogService, RepoError};
use rusqlite::Connection;
use std::sync::Arc;
use std::thread;

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn service_covers_full_book_lifecycle() {
    let service = CatalogService::open(MEMORY_ADDRESS).unwrap();

    let created = service
        .create(&Book::new("1", "The Hobbit", ["Tolkien"], 1))
        .unwrap();
    assert_eq!(created.n_copies, 1);
    let merged = service
        .create(&Book::new("1", "Ignored", ["Ignored"], 2))
        .unwrap();
    assert_eq!(merged.n_copies, 3);

    let patch = BookPatch {
        title: Some("The Hobbit, Annotated".to_string()),
        ..BookPatch::default()
    };
    assert_eq!(service.update("1", &patch).unwrap(), 1);
    assert_eq!(service.get("1").unwrap().title, "The Hobbit, Annotated");

    let hits = service.search("annotated tolkien", -1, -1).unwrap();
    assert_eq!(hits.len(), 1);

    assert_eq!(service.remove("1").unwrap(), 1);
    assert!(matches!(service.get("1"), Err(RepoError::NotFound(_))));

    service.close().unwrap();
}

#[test]
fn service_wraps_an_existing_store() {
    let store = open_store_in_memory().unwrap();
    let service = CatalogService::new(store).unwrap();
    assert!(service.search("", -1, -1).unwrap().is_empty());
    service.close().unwrap();
}

#[test]
fn service_open_rejects_unreachable_address() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nope").join("catalog.sqlite3");

    let err = CatalogService::open(path.to_str().unwrap()).unwrap_err();
    assert!(matches!(err, RepoError::Db(_)));
}

#[test]
fn service_open_verifies_schema_of_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.sqlite3");
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
            .unwrap();
    }

    // Version matches but the catalog tables were never created.
    let err = CatalogService::open(path.to_str().unwrap()).unwrap_err();
    assert!(matches!(err, RepoError::MissingRequiredTable("books")));
}

#[test]
fn one_service_is_shared_across_threads() {
    assert_send_sync::<CatalogService>();

    let service = Arc::new(CatalogService::open(MEMORY_ADDRESS).unwrap());
    let workers: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                for _ in 0..5 {
                    service
                        .create(&Book::new("shared", "Shared", ["Many"], 1))
                        .unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(service.get("shared").unwrap().n_copies, 40);
    assert_eq!(service.search("shared", -1, -1).unwrap().len(), 1);
    Arc::try_unwrap(service).unwrap().close().unwrap();
}

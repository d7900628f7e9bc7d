//! Search and single-row fetch behavior against a scripted backend.

mod common;

use common::MockDb;
use pgsift::{FromRow, Predicate, RowExt, SiftResult, select};
use std::sync::{Arc, Mutex};

#[allow(dead_code)]
#[derive(Debug)]
struct Site {
    id: i64,
    url: String,
    image: Option<String>,
}

impl FromRow for Site {
    fn from_row(row: &tokio_postgres::Row) -> SiftResult<Self> {
        Ok(Self {
            id: row.try_get_column("id")?,
            url: row.try_get_column("url")?,
            image: row.try_get_column("image")?,
        })
    }
}

#[tokio::test]
async fn search_on_empty_result_skips_the_count_query() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let db = MockDb::new(log.clone());

    let page = select("site")
        .fields(&["id", "url", "image"])
        .order_by_asc("site.id")
        .paginate(0, 10)
        .search::<Site>(&db)
        .await
        .unwrap();

    assert!(page.items.is_empty());
    assert_eq!(page.count, 0);
    assert_eq!(page.total_count, 0);
    assert_eq!(page.page_count, 0);

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 1, "count query must not be issued: {log:?}");
    assert_eq!(
        log[0],
        "SELECT id, url, image FROM site ORDER BY site.id ASC LIMIT 10 OFFSET 0"
    );
}

#[tokio::test]
async fn fetch_all_with_zero_rows_is_not_an_error() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let db = MockDb::new(log.clone());

    let sites: Vec<Site> = select("site")
        .fields(&["id", "url", "image"])
        .fetch_all(&db)
        .await
        .unwrap();
    assert!(sites.is_empty());
}

#[tokio::test]
async fn get_with_zero_rows_is_not_found() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let db = MockDb::new(log.clone());

    let err = select("site")
        .fields(&["id", "url", "image"])
        .filter(Predicate::equals("site.id", 7))
        .order_by_asc("site.id")
        .paginate(3, 5)
        .get::<Site>(&db)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    // The single-row fetch drops ordering and pagination.
    let log = log.lock().unwrap();
    assert_eq!(
        log[0],
        "SELECT id, url, image FROM site WHERE (site.id = $1)"
    );
}

#[tokio::test]
async fn malformed_predicate_never_reaches_the_backend() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let db = MockDb::new(log.clone());

    let err = select("site")
        .filter(Predicate::new(
            "site.id",
            pgsift::Operator::Equals,
            vec![1.into(), 2.into()],
        ))
        .search::<Site>(&db)
        .await
        .unwrap_err();
    assert!(err.is_arity());
    assert!(log.lock().unwrap().is_empty());
}

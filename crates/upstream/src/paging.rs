//! Page streams over cursor-token and offset paginated endpoints.

use std::future::Future;

use fleetsync_core::errors::UpstreamSystem;
use fleetsync_core::upstream::{PageStream, RawRecord};
use futures::stream::{self, StreamExt};

use crate::error::Result;

/// One page from a cursor-token endpoint.
#[derive(Debug, Default)]
pub struct TokenPage {
    pub records: Vec<RawRecord>,
    pub next_page_token: Option<String>,
}

struct Cursor<F> {
    fetch: F,
    token: Option<String>,
    fetched: usize,
    done: bool,
}

/// Follows `nextPageToken` until the upstream stops returning one or
/// `max_results` records were produced. The first error ends the stream.
pub fn token_pages<'a, F, Fut>(
    system: UpstreamSystem,
    max_results: usize,
    page_size: usize,
    fetch: F,
) -> PageStream<'a>
where
    F: FnMut(Option<String>, usize) -> Fut + Send + 'a,
    Fut: Future<Output = Result<TokenPage>> + Send + 'a,
{
    let cursor = Cursor {
        fetch,
        token: None,
        fetched: 0,
        done: false,
    };

    stream::unfold(cursor, move |mut cursor| async move {
        if cursor.done || cursor.fetched >= max_results {
            return None;
        }
        let size = page_size.min(max_results - cursor.fetched).max(1);
        match (cursor.fetch)(cursor.token.take(), size).await {
            Ok(page) => {
                let mut records = page.records;
                records.truncate(max_results - cursor.fetched);
                cursor.fetched += records.len();
                cursor.token = page.next_page_token.filter(|token| !token.is_empty());
                cursor.done = cursor.token.is_none() || records.is_empty();
                if records.is_empty() {
                    return None;
                }
                Some((Ok(records), cursor))
            }
            Err(err) => {
                cursor.done = true;
                Some((Err(err.into_core(system)), cursor))
            }
        }
    })
    .boxed()
}

/// Walks a skip/size endpoint until it returns an empty or short page.
pub fn offset_pages<'a, F, Fut>(
    system: UpstreamSystem,
    max_results: usize,
    page_size: usize,
    fetch: F,
) -> PageStream<'a>
where
    F: FnMut(usize, usize) -> Fut + Send + 'a,
    Fut: Future<Output = Result<Vec<RawRecord>>> + Send + 'a,
{
    let cursor = Cursor {
        fetch,
        token: None,
        fetched: 0,
        done: false,
    };

    stream::unfold(cursor, move |mut cursor| async move {
        if cursor.done || cursor.fetched >= max_results {
            return None;
        }
        let size = page_size.max(1);
        match (cursor.fetch)(cursor.fetched, size).await {
            Ok(mut records) => {
                cursor.done = records.len() < size;
                records.truncate(max_results - cursor.fetched);
                cursor.fetched += records.len();
                if records.is_empty() {
                    return None;
                }
                Some((Ok(records), cursor))
            }
            Err(err) => {
                cursor.done = true;
                Some((Err(err.into_core(system)), cursor))
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamError;
    use futures::TryStreamExt;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn records(range: std::ops::Range<usize>) -> Vec<RawRecord> {
        range.map(|i| json!({ "n": i })).collect()
    }

    #[tokio::test]
    async fn token_pages_follow_the_cursor_and_respect_the_limit() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_inner = Arc::clone(&seen);
        let pages = token_pages(UpstreamSystem::Directory, 250, 100, move |token, size| {
            seen_inner.lock().unwrap().push((token.clone(), size));
            async move {
                let start = token.map(|t| t.parse::<usize>().unwrap()).unwrap_or(0);
                Ok(TokenPage {
                    records: records(start..start + size),
                    next_page_token: Some((start + size).to_string()),
                })
            }
        });

        let collected: Vec<Vec<RawRecord>> = pages.try_collect().await.expect("pages");
        assert_eq!(collected.iter().map(Vec::len).collect::<Vec<_>>(), vec![100, 100, 50]);
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], (None, 100));
        assert_eq!(seen[2], (Some("200".to_string()), 50));
    }

    #[tokio::test]
    async fn offset_pages_stop_on_a_short_page() {
        let calls = Arc::new(Mutex::new(0usize));
        let calls_inner = Arc::clone(&calls);
        let pages = offset_pages(UpstreamSystem::AssetService, 10_000, 100, move |skip, size| {
            *calls_inner.lock().unwrap() += 1;
            async move {
                let end = (skip + size).min(230);
                Ok(records(skip..end))
            }
        });

        let collected: Vec<Vec<RawRecord>> = pages.try_collect().await.expect("pages");
        assert_eq!(collected.concat().len(), 230);
        assert_eq!(*calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn errors_end_the_stream_tagged_with_the_system() {
        let mut pages = offset_pages(UpstreamSystem::AssetService, 1_000, 10, |skip, size| async move {
            if skip == 0 {
                Ok(records(0..size))
            } else {
                Err(UpstreamError::api(503, "busy"))
            }
        });

        assert_eq!(pages.next().await.unwrap().unwrap().len(), 10);
        match pages.next().await {
            Some(Err(fleetsync_core::Error::Upstream { system, status, .. })) => {
                assert_eq!(system, UpstreamSystem::AssetService);
                assert_eq!(status, Some(503));
            }
            other => panic!("unexpected page: {:?}", other.map(|r| r.map(|v| v.len()))),
        }
        assert!(pages.next().await.is_none());
    }
}

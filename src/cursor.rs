//! Forward-only pagination over a page fetcher.
//!
//! A [`Cursor`] moves through three states:
//!
//! ```text
//! NotStarted --advance--> HasPage | Exhausted
//! HasPage    --advance--> HasPage | Exhausted
//! Exhausted  --advance--> Exhausted   (always returns false)
//! ```
//!
//! A fetch that returns no items, or a page without a continuation token,
//! ends the scan. The last loaded page stays readable after exhaustion.
//! Auxiliary sort vectors echoed by the service are concatenated across pages
//! in fetch order.
//!
//! A failed fetch leaves the cursor where it was: advancing again re-sends the
//! same continuation token.
//!
//! Flattening (`into_stream`, `into_iter_blocking`, `collect_all`) yields the
//! currently loaded page followed by every later page, lazily and without
//! re-fetching. Flattening an exhausted cursor yields nothing. A cursor is not
//! restartable; build a new one to rescan.

use crate::error::{DataApiError, Result};
use async_trait::async_trait;
use futures::stream::{self, Stream};
use std::collections::VecDeque;
use std::fmt;

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_state: Option<String>,
    pub sort_vector: Option<Vec<f32>>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_page_state: Option<String>) -> Self {
        Self { items, next_page_state, sort_vector: None }
    }

    pub fn with_sort_vector(mut self, sort_vector: Vec<f32>) -> Self {
        self.sort_vector = Some(sort_vector);
        self
    }
}

/// Source of pages for a cursor. `page_state` is `None` for the first page.
#[async_trait]
pub trait PageFetcher<T>: Send {
    async fn fetch(&mut self, page_state: Option<String>) -> Result<Page<T>>;

    fn fetch_blocking(&mut self, page_state: Option<String>) -> Result<Page<T>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    NotStarted,
    HasPage,
    Exhausted,
}

pub struct Cursor<T> {
    fetcher: Box<dyn PageFetcher<T>>,
    state: CursorState,
    current: Option<Vec<T>>,
    page_state: Option<String>,
    sort_vector: Vec<f32>,
    pages_fetched: usize,
}

impl<T> fmt::Debug for Cursor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("state", &self.state)
            .field("pages_fetched", &self.pages_fetched)
            .field("has_page_state", &self.page_state.is_some())
            .finish()
    }
}

impl<T: Send + 'static> Cursor<T> {
    pub fn new<F>(fetcher: F) -> Self
    where
        F: PageFetcher<T> + 'static,
    {
        Self {
            fetcher: Box::new(fetcher),
            state: CursorState::NotStarted,
            current: None,
            page_state: None,
            sort_vector: Vec::new(),
            pages_fetched: 0,
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Items of the loaded page. Fails until a page has been loaded.
    pub fn current(&self) -> Result<&[T]> {
        self.current
            .as_deref()
            .ok_or_else(|| DataApiError::usage("current() called before a page was loaded"))
    }

    /// Sort vectors echoed by the service, concatenated in fetch order.
    pub fn sort_vector(&self) -> &[f32] {
        &self.sort_vector
    }

    #[cfg(test)]
    pub(crate) fn page_state(&self) -> Option<&str> {
        self.page_state.as_deref()
    }

    /// Load the next page. Returns `false` once the scan is over.
    pub async fn advance(&mut self) -> Result<bool> {
        let Some(page_state) = self.next_request() else {
            return Ok(false);
        };
        let page = self.fetcher.fetch(page_state).await?;
        Ok(self.accept(page))
    }

    /// Blocking counterpart of [`Cursor::advance`].
    pub fn advance_blocking(&mut self) -> Result<bool> {
        let Some(page_state) = self.next_request() else {
            return Ok(false);
        };
        let page = self.fetcher.fetch_blocking(page_state)?;
        Ok(self.accept(page))
    }

    // `None` means no fetch should happen; `Some(state)` carries the token to send.
    // The token is only replaced by `accept`, so a failed fetch can be retried.
    fn next_request(&mut self) -> Option<Option<String>> {
        match self.state {
            CursorState::NotStarted => Some(None),
            CursorState::HasPage => match self.page_state.clone() {
                Some(token) => Some(Some(token)),
                None => {
                    self.state = CursorState::Exhausted;
                    None
                }
            },
            CursorState::Exhausted => None,
        }
    }

    fn accept(&mut self, page: Page<T>) -> bool {
        self.pages_fetched += 1;
        if let Some(vector) = page.sort_vector {
            self.sort_vector.extend(vector);
        }
        if page.items.is_empty() {
            self.state = CursorState::Exhausted;
            self.page_state = None;
            return false;
        }
        self.current = Some(page.items);
        self.page_state = page.next_page_state.filter(|token| !token.is_empty());
        self.state = CursorState::HasPage;
        true
    }

    // An exhausted cursor has nothing left to flatten; its last page stays
    // readable through `current()` only.
    fn take_current(&mut self) -> VecDeque<T> {
        if self.state == CursorState::Exhausted {
            return VecDeque::new();
        }
        self.current.take().map(VecDeque::from).unwrap_or_default()
    }

    /// Flatten into a stream of items, fetching pages on demand.
    pub fn into_stream(mut self) -> impl Stream<Item = Result<T>> + Send {
        let buffer = self.take_current();
        stream::unfold((self, buffer, false), |(mut cursor, mut buffer, failed)| async move {
            if failed {
                return None;
            }
            loop {
                if let Some(item) = buffer.pop_front() {
                    return Some((Ok(item), (cursor, buffer, false)));
                }
                match cursor.advance().await {
                    Ok(true) => buffer = cursor.take_current(),
                    Ok(false) => return None,
                    Err(err) => return Some((Err(err), (cursor, buffer, true))),
                }
            }
        })
    }

    /// Flatten into a blocking iterator, fetching pages on demand.
    pub fn into_iter_blocking(mut self) -> CursorIter<T> {
        let buffer = self.take_current();
        CursorIter { cursor: self, buffer, failed: false }
    }

    /// Drain every remaining page into one vector.
    pub async fn collect_all(mut self) -> Result<Vec<T>> {
        let mut items: Vec<T> = self.take_current().into();
        while self.advance().await? {
            items.extend(self.take_current());
        }
        Ok(items)
    }

    pub fn collect_all_blocking(self) -> Result<Vec<T>> {
        self.into_iter_blocking().collect()
    }
}

/// Blocking iterator over a cursor's items. Stops after the first error.
pub struct CursorIter<T> {
    cursor: Cursor<T>,
    buffer: VecDeque<T>,
    failed: bool,
}

impl<T: Send + 'static> CursorIter<T> {
    /// Sort vectors accumulated so far.
    pub fn sort_vector(&self) -> &[f32] {
        self.cursor.sort_vector()
    }
}

impl<T: Send + 'static> Iterator for CursorIter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            match self.cursor.advance_blocking() {
                Ok(true) => self.buffer = self.cursor.take_current(),
                Ok(false) => return None,
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

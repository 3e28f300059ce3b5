//! Sequential page-cursor aggregation over the executor
//!
//! Two listing conventions are supported: zero-based `page`/`size` with a
//! total page count, and `skip`/`take` with an end-of-list flag.

use super::constants::paging;
use super::error::ApiError;
use super::executor::RequestExecutor;
use super::request::RequestDescriptor;
use log::{debug, warn};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// How the next page is addressed and how the last page is recognised
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorStrategy {
    /// Zero-based page index. Stops once `page + 1 >= total_pages_field`.
    PageSize {
        page_param: String,
        size_param: String,
        total_pages_field: String,
    },
    /// Offset paging. A missing end-of-list flag counts as the end.
    SkipTake {
        skip_param: String,
        take_param: String,
        end_of_list_field: String,
    },
}

impl CursorStrategy {
    /// `page`/`size` with `totalPages`
    pub fn page_size() -> Self {
        CursorStrategy::PageSize {
            page_param: paging::PAGE.to_string(),
            size_param: paging::SIZE.to_string(),
            total_pages_field: paging::TOTAL_PAGES.to_string(),
        }
    }

    /// `skip`/`take` with `isEndOfListReached`
    pub fn skip_take() -> Self {
        CursorStrategy::SkipTake {
            skip_param: paging::SKIP.to_string(),
            take_param: paging::TAKE.to_string(),
            end_of_list_field: paging::END_OF_LIST.to_string(),
        }
    }
}

/// Where the items of one page live in the response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemExtractor {
    /// Items are the array under this top-level key.
    Key(String),
    /// Deprecated: the first array-valued top-level field, whatever its name.
    FirstList,
}

impl ItemExtractor {
    pub fn key(key: impl Into<String>) -> Self {
        ItemExtractor::Key(key.into())
    }

    /// Items of one page, or `None` when the response has no usable collection.
    pub fn extract(&self, response: &Value) -> Option<Vec<Value>> {
        let object = response.as_object()?;
        match self {
            ItemExtractor::Key(key) => object.get(key)?.as_array().cloned(),
            ItemExtractor::FirstList => {
                let found = object.iter().find_map(|(key, value)| value.as_array().map(|items| (key, items)));
                if let Some((key, _)) = found {
                    warn!(
                        "Guessing page items from first list field '{}'; configure an explicit item key",
                        key
                    );
                }
                found.map(|(_, items)| items.clone())
            }
        }
    }
}

impl RequestExecutor {
    /// Fetch every page of a listing and concatenate the items in arrival order
    pub async fn fetch_all(
        &self,
        base: RequestDescriptor,
        page_size: u32,
        strategy: &CursorStrategy,
        extractor: &ItemExtractor,
    ) -> Result<Vec<Value>, ApiError> {
        self.fetch_all_with_cancel(base, page_size, strategy, extractor, &CancellationToken::new())
            .await
    }

    pub async fn fetch_all_with_cancel(
        &self,
        base: RequestDescriptor,
        page_size: u32,
        strategy: &CursorStrategy,
        extractor: &ItemExtractor,
        cancel: &CancellationToken,
    ) -> Result<Vec<Value>, ApiError> {
        if page_size == 0 {
            return Err(ApiError::InvalidRequest("page size must be positive".to_string()));
        }

        let mut items = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let descriptor = match strategy {
                CursorStrategy::PageSize {
                    page_param,
                    size_param,
                    ..
                } => base
                    .clone()
                    .with_query(page_param.as_str(), cursor)
                    .with_query(size_param.as_str(), page_size),
                CursorStrategy::SkipTake {
                    skip_param,
                    take_param,
                    ..
                } => base
                    .clone()
                    .with_query(skip_param.as_str(), cursor)
                    .with_query(take_param.as_str(), page_size),
            };

            let response = self.execute_with_cancel(descriptor, cancel).await?;

            let Some(page_items) = extractor.extract(&response) else {
                let malformed = ApiError::MalformedResponse(format!(
                    "no item collection in page at cursor {} of {}",
                    cursor,
                    base.target()
                ));
                warn!("{}; stopping pagination with {} items", malformed, items.len());
                break;
            };

            let received = page_items.len();
            items.extend(page_items);
            debug!("{}: cursor {} returned {} items", base.target(), cursor, received);

            match strategy {
                CursorStrategy::PageSize {
                    total_pages_field, ..
                } => match response.get(total_pages_field).and_then(Value::as_u64) {
                    Some(total_pages) if cursor + 1 >= total_pages => break,
                    Some(_) => {}
                    None if received == 0 => break,
                    None => {}
                },
                CursorStrategy::SkipTake {
                    end_of_list_field, ..
                } => {
                    let end = response
                        .get(end_of_list_field)
                        .and_then(Value::as_bool)
                        .unwrap_or(true);
                    if end {
                        break;
                    }
                }
            }

            cursor += match strategy {
                CursorStrategy::PageSize { .. } => 1,
                CursorStrategy::SkipTake { .. } => u64::from(page_size),
            };
        }

        Ok(items)
    }
}

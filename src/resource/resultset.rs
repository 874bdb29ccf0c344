//! Result Set
//!
//! A lazily materialized window (`offset`, `limit`) over a paginated remote
//! collection. Nothing is fetched until data is needed: `len`, `at`, `iter`,
//! `get` and `filter` materialize once and reuse the cached items afterwards.
//! Slicing never touches the original; it returns a new, still lazy set over
//! the narrower window.

use super::manager::{Query, ResourceManager};
use super::object::{Resource, ResourceId};
use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::ops::{Bound, RangeBounds};
use tokio::sync::OnceCell;

/// Largest page the Redmine API serves per request
pub const MAX_PAGE_SIZE: usize = 100;

pub struct ResultSet {
    manager: ResourceManager,
    /// `None` for sets built from already fetched items
    query: Option<Query>,
    offset: usize,
    /// 0 means the server's default page
    limit: usize,
    items: OnceCell<Vec<Resource>>,
}

impl ResultSet {
    pub(crate) fn remote(manager: ResourceManager, query: Query) -> Self {
        Self {
            manager,
            query: Some(query),
            offset: 0,
            limit: 0,
            items: OnceCell::new(),
        }
    }

    pub(crate) fn materialized(manager: ResourceManager, items: Vec<Resource>) -> Self {
        Self {
            manager,
            query: None,
            offset: 0,
            limit: 0,
            items: OnceCell::from(items),
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn resource_type(&self) -> &str {
        self.manager.resource_name()
    }

    pub fn is_materialized(&self) -> bool {
        self.items.initialized()
    }

    pub(crate) fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    async fn materialize(&self) -> Result<&[Resource]> {
        self.items
            .get_or_try_init(|| self.fetch())
            .await
            .map(Vec::as_slice)
    }

    async fn fetch(&self) -> Result<Vec<Resource>> {
        let Some(query) = &self.query else {
            return Ok(Vec::new());
        };

        if self.limit == 0 {
            return self.manager.fetch_page(query, self.offset, None).await;
        }

        let mut items: Vec<Resource> = Vec::new();
        let mut seen: HashSet<ResourceId> = HashSet::new();
        let mut offset = self.offset;

        while items.len() < self.limit {
            let page_size = (self.limit - items.len()).min(MAX_PAGE_SIZE);
            let page = self.manager.fetch_page(query, offset, Some(page_size)).await?;
            let received = page.len();
            let before = items.len();

            for resource in page {
                if items.len() >= self.limit {
                    break;
                }
                if let Some(id) = resource.id() {
                    if !seen.insert(id) {
                        continue;
                    }
                }
                items.push(resource);
            }

            // Short or oversized pages, or pages with nothing new, mean the
            // endpoint does not honour offset/limit
            if received != page_size || items.len() == before {
                break;
            }
            offset += received;
        }

        tracing::debug!(
            "{}: materialized {} items (offset={}, limit={})",
            self.resource_type(),
            items.len(),
            self.offset,
            self.limit
        );
        Ok(items)
    }

    /// Number of resources in this window
    pub async fn len(&self) -> Result<usize> {
        Ok(self.materialize().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.materialize().await?.is_empty())
    }

    /// Resource at `index` within this window
    pub async fn at(&self, index: usize) -> Result<&Resource> {
        let items = self.materialize().await?;
        items.get(index).ok_or_else(|| Error::IndexOutOfRange {
            resource: self.resource_type().to_string(),
            index,
            len: items.len(),
        })
    }

    /// Iterate the window; repeated calls reuse the materialized items
    pub async fn iter(&self) -> Result<std::slice::Iter<'_, Resource>> {
        Ok(self.materialize().await?.iter())
    }

    pub async fn to_vec(&self) -> Result<Vec<Resource>> {
        Ok(self.materialize().await?.to_vec())
    }

    /// New result set over `range` of this window
    ///
    /// `slice(1..3)` gives `offset 1, limit 2`; `slice(..200)` gives
    /// `offset 0, limit 200`. Remote sets fetch the new window when they are
    /// materialized; local sets slice their items in memory.
    pub fn slice(&self, range: impl RangeBounds<usize>) -> ResultSet {
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s.saturating_add(1),
            Bound::Unbounded => 0,
        };
        let stop = match range.end_bound() {
            Bound::Included(&e) => Some(e.saturating_add(1)),
            Bound::Excluded(&e) => Some(e),
            Bound::Unbounded => None,
        };

        let (offset, limit) = window(self.offset, self.limit, start, stop);
        // limit 0 would read as "server default"; a closed empty window fetches nothing
        let empty_window = limit == 0 && (stop.is_some() || self.limit > 0);

        match &self.query {
            Some(_) if empty_window => ResultSet {
                manager: self.manager.clone(),
                query: None,
                offset,
                limit,
                items: OnceCell::from(Vec::new()),
            },
            Some(query) => ResultSet {
                manager: self.manager.clone(),
                query: Some(query.clone()),
                offset,
                limit,
                items: OnceCell::new(),
            },
            None => {
                let items: Vec<Resource> = self
                    .items
                    .get()
                    .map(|items| {
                        let end = stop.unwrap_or(items.len()).min(items.len());
                        items[start.min(end)..end].to_vec()
                    })
                    .unwrap_or_default();
                ResultSet {
                    manager: self.manager.clone(),
                    query: None,
                    offset,
                    limit,
                    items: OnceCell::from(items),
                }
            }
        }
    }

    /// Resource whose id equals `id`, or `None`
    pub async fn get(&self, id: impl Into<ResourceId>) -> Result<Option<&Resource>> {
        let id = id.into();
        let items = self.materialize().await?;
        Ok(items.iter().find(|r| matches_id(r, &id)))
    }

    /// Materialized subset whose ids appear in `ids` (a JSON array), in this set's order
    pub async fn filter(&self, ids: &Value) -> Result<ResultSet> {
        let Value::Array(raw_ids) = ids else {
            return Err(Error::FilterParam {
                found: ids.to_string(),
            });
        };
        let wanted = raw_ids
            .iter()
            .map(|v| {
                ResourceId::from_value(v).ok_or_else(|| Error::FilterParam {
                    found: ids.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let items = self.materialize().await?;
        let selected = items
            .iter()
            .filter(|r| wanted.iter().any(|id| matches_id(r, id)))
            .cloned()
            .collect();

        Ok(ResultSet::materialized(self.manager.clone(), selected))
    }
}

fn matches_id(resource: &Resource, id: &ResourceId) -> bool {
    resource
        .attr(&resource.descriptor().id_field)
        .is_some_and(|v| id.matches(v))
}

/// Compose a child window `[start, stop)` onto a parent window
pub(crate) fn window(
    parent_offset: usize,
    parent_limit: usize,
    start: usize,
    stop: Option<usize>,
) -> (usize, usize) {
    let offset = parent_offset.saturating_add(start);
    let limit = match (stop, parent_limit) {
        (Some(stop), 0) => stop.saturating_sub(start),
        (Some(stop), parent) => stop.min(parent).saturating_sub(start),
        (None, 0) => 0,
        (None, parent) => parent.saturating_sub(start),
    };
    (offset, limit)
}

impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<rmine::ResultSet object with {} resources>",
            self.manager.descriptor().class_name
        )
    }
}

impl fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSet")
            .field("resource", &self.resource_type())
            .field("path", &self.query().map(|q| q.path.as_str()))
            .field("offset", &self.offset)
            .field("limit", &self.limit)
            .field("materialized", &self.is_materialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockTransport;
    use crate::api::Redmine;
    use serde_json::json;
    use std::sync::Arc;

    fn projects() -> Vec<Value> {
        vec![
            json!({"name": "Foo", "identifier": "foo", "id": 1}),
            json!({"name": "Bar", "identifier": "bar", "id": 2}),
            json!({"name": "Baz", "identifier": "baz", "id": 3}),
        ]
    }

    fn client(transport: MockTransport) -> (Redmine, Arc<MockTransport>) {
        let transport = Arc::new(transport);
        (Redmine::with_transport(transport.clone()), transport)
    }

    #[test]
    fn test_window_arithmetic() {
        assert_eq!(window(0, 0, 1, Some(3)), (1, 2));
        assert_eq!(window(0, 0, 0, Some(200)), (0, 200));
        assert_eq!(window(0, 0, 5, None), (5, 0));
        assert_eq!(window(10, 20, 5, Some(50)), (15, 15));
        assert_eq!(window(10, 20, 5, None), (15, 15));
        assert_eq!(window(0, 0, 4, Some(2)), (4, 0));
    }

    #[tokio::test]
    async fn test_no_request_until_materialized() {
        let (client, transport) = client(MockTransport::new().respond(
            "GET",
            "/projects.json",
            200,
            Some(json!({"projects": projects()})),
        ));
        let set = client.manager("project").unwrap().all(Default::default()).unwrap();
        let sliced = set.slice(1..3);
        assert!(!set.is_materialized());
        assert!(transport.calls().is_empty());

        assert_eq!(set.len().await.unwrap(), 3);
        assert_eq!(set.iter().await.unwrap().count(), 3);
        assert_eq!(transport.calls().len(), 1);
        assert!(!sliced.is_materialized());
    }

    #[tokio::test]
    async fn test_empty_window_fetches_nothing() {
        let (client, transport) = client(MockTransport::new());
        let set = client.manager("project").unwrap().all(Default::default()).unwrap();
        let empty = set.slice(3..3);
        assert_eq!(empty.len().await.unwrap(), 0);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_large_limit_is_paged() {
        let page: Vec<Value> = (1..=100).map(|id| json!({"id": id})).collect();
        let tail: Vec<Value> = (101..=150).map(|id| json!({"id": id})).collect();
        let (client, transport) = client(
            MockTransport::new()
                .respond("GET", "/issues.json", 200, Some(json!({"issues": page})))
                .respond("GET", "/issues.json", 200, Some(json!({"issues": tail}))),
        );

        let issues = client
            .manager("issue")
            .unwrap()
            .all(Default::default())
            .unwrap()
            .slice(..250);
        assert_eq!(issues.len().await.unwrap(), 150);

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].query_value("offset"), Some("0"));
        assert_eq!(calls[0].query_value("limit"), Some("100"));
        assert_eq!(calls[1].query_value("offset"), Some("100"));
        assert_eq!(calls[1].query_value("limit"), Some("100"));
    }

    #[tokio::test]
    async fn test_oversized_page_is_truncated_to_window() {
        let journals: Vec<Value> = (1..=5).map(|id| json!({"id": id})).collect();
        let (client, transport) = client(MockTransport::new().respond(
            "GET",
            "/issues/5.json",
            200,
            Some(json!({"issue": {"id": 5, "journals": journals}})),
        ));

        let mut filters = serde_json::Map::new();
        filters.insert("issue_id".to_string(), json!(5));
        let journals = client
            .manager("issue_journal")
            .unwrap()
            .filter(filters)
            .unwrap()
            .slice(0..2);

        assert_eq!(journals.len().await.unwrap(), 2);
        assert_eq!(journals.at(1).await.unwrap().int_attr("id"), Some(2));
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_endpoint_ignoring_offset_stops_on_repeated_page() {
        let page: Vec<Value> = (1..=100).map(|id| json!({"id": id})).collect();
        let (client, transport) = client(MockTransport::new().respond(
            "GET",
            "/roles.json",
            200,
            Some(json!({"roles": page})),
        ));

        let roles = client
            .manager("role")
            .unwrap()
            .all(Default::default())
            .unwrap()
            .slice(..250);

        assert_eq!(roles.len().await.unwrap(), 100);
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_local_set_slices_in_memory() {
        let (client, transport) = client(MockTransport::new());
        let set = client
            .manager("project")
            .unwrap()
            .to_resource_set(projects())
            .unwrap();

        let sliced = set.slice(1..);
        assert!(sliced.is_materialized());
        assert_eq!(sliced.len().await.unwrap(), 2);
        assert_eq!(sliced.at(0).await.unwrap().int_attr("id"), Some(2));
        assert_eq!(set.slice(5..9).len().await.unwrap(), 0);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_filter_rejects_non_sequence_ids() {
        let (client, _) = client(MockTransport::new());
        let set = client
            .manager("project")
            .unwrap()
            .to_resource_set(projects())
            .unwrap();
        assert!(matches!(
            set.filter(&json!(1)).await,
            Err(Error::FilterParam { .. })
        ));
        assert!(matches!(
            set.filter(&json!([{"id": 1}])).await,
            Err(Error::FilterParam { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_by_string_identifier() {
        let (client, _) = client(MockTransport::new());
        let pages = client
            .manager("wiki_page")
            .unwrap()
            .to_resource_set(vec![json!({"title": "Start"}), json!({"title": "Install"})])
            .unwrap();
        assert!(pages.get("Install").await.unwrap().is_some());
        assert!(pages.get("Missing").await.unwrap().is_none());
    }

    #[test]
    fn test_display_does_not_materialize() {
        let (client, transport) = client(MockTransport::new());
        let set = client.manager("issue").unwrap().all(Default::default()).unwrap();
        assert_eq!(set.to_string(), "<rmine::ResultSet object with Issue resources>");
        assert!(transport.calls().is_empty());
    }
}

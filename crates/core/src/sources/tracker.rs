//! The Project Zero issue tracker.
//!
//! The tracker's listing page embeds an XSRF token that must accompany every
//! API call. Issues are then pulled with paginated `ListIssues` queries
//! sorted by ascending id, so folding them in order leaves the newest id at
//! the front of the recency list.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{FeedSource, RunContext};
use crate::assemble::{ItemHooks, assemble};
use crate::fetch::Request;
use crate::item::{FeedItem, FeedMeta};
use crate::state::{Policy, TrackedRecord};
use crate::{FeedgenError, Result};

pub const TRACKER_STATE_KEY: &str = "projectzero";

const DEFAULT_BASE: &str = "https://bugs.chromium.org";
const PROJECT: &str = "project-zero";
const PAGE_SIZE: u64 = 1000;
const TOKEN_MARKER: &str = "'token': '";

/// The subset of a tracker issue the feed needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerIssue {
    pub local_id: u64,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub opened_timestamp: i64,
    #[serde(default)]
    pub owner_ref: OwnerRef,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerRef {
    #[serde(default)]
    pub display_name: String,
}

impl TrackedRecord for TrackerIssue {
    type Key = u64;

    fn key(&self) -> u64 {
        self.local_id
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListIssuesQuery<'a> {
    project_names: [&'a str; 1],
    query: &'a str,
    canned_query: u32,
    sort_spec: &'a str,
    pagination: Pagination,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Pagination {
    #[serde(skip_serializing_if = "is_zero")]
    start: u64,
    max_items: u64,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListIssuesResponse {
    #[serde(default)]
    total_results: u64,
    #[serde(default)]
    issues: Vec<TrackerIssue>,
}

/// Newly disclosed tracker issues, most recent discovery first.
#[derive(Debug, Clone)]
pub struct TrackerSource {
    base: String,
    capacity: usize,
    hooks: ItemHooks,
}

impl TrackerSource {
    pub fn new(hooks: ItemHooks) -> Self {
        Self { base: DEFAULT_BASE.to_string(), capacity: crate::state::DEFAULT_RECENT_CAPACITY, hooks }
    }

    pub fn with_base_url(mut self, base: &str) -> Self {
        self.base = base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    fn listing_url(&self) -> String {
        format!("{}/p/{}/issues/list?q=&can=1&sort=-id", self.base, PROJECT)
    }

    fn api_url(&self) -> String {
        format!("{}/prpc/monorail.Issues/ListIssues", self.base)
    }

    fn issue_url(&self, id: u64) -> String {
        format!("{}/p/{}/issues/detail?id={}", self.base, PROJECT, id)
    }

    async fn xsrf_token(&self, ctx: &RunContext<'_>) -> Result<String> {
        let page = ctx.fetcher.fetch(&Request::get(self.listing_url())).await?;
        extract_token(&page)
    }

    async fn query_page(&self, ctx: &RunContext<'_>, token: &str, start: u64) -> Result<ListIssuesResponse> {
        let query = ListIssuesQuery {
            project_names: [PROJECT],
            query: "",
            canned_query: 1,
            sort_spec: "id",
            pagination: Pagination { start, max_items: PAGE_SIZE },
        };
        let body = serde_json::to_string(&query).map_err(|e| FeedgenError::Serialization(e.to_string()))?;
        let request = Request::post_json(self.api_url(), body)
            .header("X-Xsrf-Token", token)
            .header("Origin", self.base.clone());

        let raw = ctx.fetcher.fetch(&request).await?;
        parse_response(&raw)
    }

    async fn all_issues(&self, ctx: &RunContext<'_>) -> Result<Vec<TrackerIssue>> {
        let token = self.xsrf_token(ctx).await?;
        let mut issues = Vec::new();
        let mut start = 0;

        loop {
            let page = self.query_page(ctx, &token, start).await?;
            let fetched = page.issues.len();
            issues.extend(page.issues);
            start += PAGE_SIZE;
            tracing::debug!(fetched, total = page.total_results, "fetched tracker page");

            if fetched == 0 || start >= page.total_results {
                break;
            }
        }
        Ok(issues)
    }
}

fn extract_token(page: &str) -> Result<String> {
    let (_, rest) = page
        .split_once(TOKEN_MARKER)
        .ok_or_else(|| FeedgenError::UnexpectedResponse("unable to retrieve XSRF token for the tracker".to_string()))?;
    let token = rest.split('\'').next().unwrap_or_default();
    if token.is_empty() {
        return Err(FeedgenError::UnexpectedResponse("empty XSRF token".to_string()));
    }
    Ok(token.to_string())
}

/// The API prefixes its JSON with one junk line.
fn parse_response(raw: &str) -> Result<ListIssuesResponse> {
    let (_, json) = raw
        .split_once('\n')
        .ok_or_else(|| FeedgenError::UnexpectedResponse("tracker response is missing its prefix line".to_string()))?;
    serde_json::from_str(json).map_err(|e| FeedgenError::UnexpectedResponse(format!("tracker response: {}", e)))
}

#[async_trait]
impl FeedSource for TrackerSource {
    fn name(&self) -> &str {
        "p0"
    }

    fn meta(&self) -> FeedMeta {
        FeedMeta { title: "Project Zero Bug Tracker".to_string(), link: self.listing_url(), description: String::new() }
    }

    async fn produce_items(&self, ctx: &RunContext<'_>) -> Result<Vec<FeedItem>> {
        let store = ctx.require_store(self.name())?;
        let issues = self.all_issues(ctx).await?;

        let policy = Policy::RecencyBounded { capacity: self.capacity };
        let result = store.reconcile(TRACKER_STATE_KEY, issues, policy, ctx.now)?;
        for id in &result.discovered {
            if let Some(entry) = result.state.get(id) {
                tracing::info!(id, summary = %entry.record.summary, "new tracker issue");
            }
        }

        let candidates = result
            .entries()
            .map(|entry| {
                let issue = &entry.record;
                FeedItem {
                    title: issue.summary.clone(),
                    link: self.issue_url(issue.local_id),
                    author: issue.owner_ref.display_name.clone(),
                    id: issue.local_id.to_string(),
                    description: issue.summary.clone(),
                    content: issue.summary.clone(),
                    created: OffsetDateTime::from_unix_timestamp(issue.opened_timestamp).ok(),
                    updated: Some(entry.observed),
                }
            })
            .collect();

        Ok(assemble(candidates, &self.hooks))
    }
}

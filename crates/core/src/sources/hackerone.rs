//! HackerOne hacktivity.
//!
//! One GraphQL query returns the latest hacktivity items. Only disclosed
//! reports become feed items; nothing is persisted between runs.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::{FeedSource, RunContext};
use crate::assemble::{ItemHooks, assemble};
use crate::fetch::Request;
use crate::item::{FeedItem, FeedMeta};
use crate::{FeedgenError, Result};

const DEFAULT_BASE: &str = "https://hackerone.com";
const PAGE_SIZE: u32 = 25;
const DISCLOSED: &str = "Disclosed";
const HACKTIVITY_PATH: &str = "/hacktivity?querystring=&filter=type:public&order_direction=DESC&order_field=latest_disclosable_activity_at&followed_only=false";

const HACKTIVITY_QUERY: &str = r#"query HacktivityPageQuery($querystring: String, $secureOrderBy: FiltersHacktivityItemFilterOrder, $where: FiltersHacktivityItemFilterInput, $count: Int) {
  hacktivity_items(first: $count, query: $querystring, secure_order_by: $secureOrderBy, where: $where) {
    edges {
      node {
        __typename
        ... on Disclosed {
          reporter { username }
          team { name }
          report { id title url }
          latest_disclosable_activity_at
          total_awarded_amount
          severity_rating
          currency
        }
      }
    }
  }
}"#;

#[derive(Debug, Deserialize)]
struct HacktivityResponse {
    data: Option<HacktivityData>,
}

#[derive(Debug, Deserialize)]
struct HacktivityData {
    hacktivity_items: Option<HacktivityConnection>,
}

#[derive(Debug, Deserialize)]
struct HacktivityConnection {
    edges: Option<Vec<HacktivityEdge>>,
}

#[derive(Debug, Deserialize)]
struct HacktivityEdge {
    node: Option<HacktivityNode>,
}

#[derive(Debug, Deserialize)]
struct HacktivityNode {
    #[serde(rename = "__typename")]
    typename: String,
    reporter: Option<Reporter>,
    team: Option<Team>,
    report: Option<Report>,
    severity_rating: Option<String>,
    total_awarded_amount: Option<f64>,
    currency: Option<String>,
    latest_disclosable_activity_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Reporter {
    #[serde(default)]
    username: String,
}

#[derive(Debug, Deserialize)]
struct Team {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct Report {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
}

impl HacktivityNode {
    fn title(&self) -> String {
        let team = self.team.as_ref().map(|t| t.name.as_str()).unwrap_or_default();
        let severity = self.severity_rating.as_deref().unwrap_or_default();
        let report = self.report.as_ref().map(|r| r.title.as_str()).unwrap_or_default();
        let title = format!("[{}] {} - {}", team, severity, report);

        match self.total_awarded_amount {
            Some(bounty) if bounty > 0.0 => {
                format!("{} ({:.2}{})", title, bounty, self.currency.as_deref().unwrap_or_default())
            }
            _ => title,
        }
    }

    fn updated(&self) -> Option<OffsetDateTime> {
        let raw = self.latest_disclosable_activity_at.as_deref()?;
        match OffsetDateTime::parse(raw, &Rfc3339) {
            Ok(ts) => Some(ts),
            Err(e) => {
                tracing::warn!(value = raw, error = %e, "unparseable disclosure time");
                None
            }
        }
    }

    fn into_item(self) -> FeedItem {
        let title = self.title();
        let updated = self.updated();
        let author = self.reporter.map(|r| r.username).unwrap_or_default();
        let report = self.report.unwrap_or_default();

        FeedItem {
            title,
            link: report.url,
            author,
            id: report.id,
            description: String::new(),
            content: String::new(),
            created: None,
            updated,
        }
    }
}

/// Recently disclosed HackerOne reports.
#[derive(Debug, Clone)]
pub struct HackerOneSource {
    base: String,
    hooks: ItemHooks,
}

impl HackerOneSource {
    pub fn new(hooks: ItemHooks) -> Self {
        Self { base: DEFAULT_BASE.to_string(), hooks }
    }

    pub fn with_base_url(mut self, base: &str) -> Self {
        self.base = base.trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self) -> String {
        format!("{}/graphql", self.base)
    }

    fn query_body() -> Result<String> {
        let body = json!({
            "operationName": "HacktivityPageQuery",
            "variables": {
                "querystring": "",
                "where": { "report": { "disclosed_at": { "_is_null": false } } },
                "secureOrderBy": { "latest_disclosable_activity_at": { "_direction": "DESC" } },
                "count": PAGE_SIZE,
            },
            "query": HACKTIVITY_QUERY,
        });
        serde_json::to_string(&body).map_err(|e| FeedgenError::Serialization(e.to_string()))
    }
}

/// Disclosed reports of a hacktivity response, in response order.
fn parse_hacktivity(raw: &str) -> Result<Vec<FeedItem>> {
    let response: HacktivityResponse = serde_json::from_str(raw)
        .map_err(|e| FeedgenError::UnexpectedResponse(format!("HackerOne response: {}", e)))?;

    let edges = response
        .data
        .ok_or_else(|| FeedgenError::UnexpectedResponse("HackerOne response has no data".to_string()))?
        .hacktivity_items
        .ok_or_else(|| FeedgenError::UnexpectedResponse("HackerOne response has no hacktivity_items".to_string()))?
        .edges
        .ok_or_else(|| FeedgenError::UnexpectedResponse("HackerOne response has no edges".to_string()))?;

    let mut items = Vec::new();
    for edge in edges {
        let node = edge
            .node
            .ok_or_else(|| FeedgenError::UnexpectedResponse("HackerOne edge is missing its node".to_string()))?;
        if node.typename == DISCLOSED {
            items.push(node.into_item());
        }
    }
    Ok(items)
}

#[async_trait]
impl FeedSource for HackerOneSource {
    fn name(&self) -> &str {
        "h1"
    }

    fn meta(&self) -> FeedMeta {
        FeedMeta {
            title: "HackerOne Recently Disclosed".to_string(),
            link: format!("{}{}", self.base, HACKTIVITY_PATH),
            description: String::new(),
        }
    }

    async fn produce_items(&self, ctx: &RunContext<'_>) -> Result<Vec<FeedItem>> {
        let request = Request::post_json(self.api_url(), Self::query_body()?).header("X-Auth-Token", "----");
        let raw = ctx.fetcher.fetch(&request).await?;
        Ok(assemble(parse_hacktivity(&raw)?, &self.hooks))
    }
}

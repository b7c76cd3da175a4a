pub mod assemble;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod formatters;
pub mod item;
pub mod link;
pub mod parse;
pub mod selector;
pub mod sources;
pub mod state;
pub mod store;
pub mod timestamp;

pub use assemble::{ItemFilter, ItemHooks, ItemModifier, ItemRules, assemble};
pub use error::{FeedgenError, Result};
pub use extract::{
    ExtractedRecord, Extraction, FieldIssue, FieldIssueKind, FieldKind, FieldMap, FieldName, FieldValue, ItemSelectors,
    extract,
};
#[cfg(feature = "fetch")]
pub use fetch::HttpFetcher;
pub use fetch::{FetchConfig, Fetcher, Method, Request, StaticFetcher};
pub use formatters::{OutputFormat, to_atom, to_json, to_rss};
pub use item::{Feed, FeedItem, FeedMeta};
pub use link::normalize_link;
pub use parse::{Document, Element};
pub use selector::{CompiledSelector, compile};
pub use sources::{
    CssConfig, CssSource, FeedSource, HackerOneSource, RcaSource, RssConfig, RssSource, RunContext, SourceConfig,
    SyzbotSource, TrackerSource, build_feed,
};
pub use state::{
    DEFAULT_RECENT_CAPACITY, KnownEntry, Policy, Reconciliation, ReconciliationState, TrackedRecord, reconcile,
};
pub use store::StateStore;
pub use timestamp::TimeFormat;

use crate::state::MergePolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Main configuration structure for the harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub output: OutputConfig,
}

/// Remote search endpoint and request pacing
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the search API
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Path appended to the base URL for the suggest call
    #[serde(rename = "endpoint-path", default = "default_endpoint_path")]
    pub endpoint_path: String,

    /// Per-request timeout (milliseconds)
    #[serde(rename = "timeout-ms", default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Extra attempts after a transient failure
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay; doubles on each retry (milliseconds)
    #[serde(rename = "retry-base-delay-ms", default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Maximum number of requests in flight at once
    #[serde(rename = "max-concurrent", default = "default_max_concurrent")]
    pub max_concurrent: u32,

    /// Sustained request rate ceiling
    #[serde(rename = "requests-per-second", default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Largest number of results the endpoint returns for one query (K)
    #[serde(rename = "result-cap", default = "default_result_cap")]
    pub result_cap: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            endpoint_path: default_endpoint_path(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            max_concurrent: default_max_concurrent(),
            requests_per_second: default_requests_per_second(),
            result_cap: default_result_cap(),
        }
    }
}

/// Where credentials live and how much each one may spend
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    /// Directory holding one `*.env` file per credential
    pub directory: PathBuf,

    /// File names to ignore inside the directory
    #[serde(default = "default_skip")]
    pub skip: Vec<String>,

    /// Requests allowed per credential before it is retired
    #[serde(default = "default_budget")]
    pub budget: u64,

    #[serde(rename = "api-key-var", default = "default_api_key_var")]
    pub api_key_var: String,

    #[serde(rename = "secret-key-var", default = "default_secret_key_var")]
    pub secret_key_var: String,
}

/// Enumeration behavior
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Symbols used to build query prefixes
    #[serde(default = "default_alphabet")]
    pub alphabet: String,

    /// Longest prefix the expansion phase will issue
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Pause between consecutive queries (milliseconds)
    #[serde(rename = "query-delay-ms", default = "default_query_delay_ms")]
    pub query_delay_ms: u64,

    /// Requests between snapshot checkpoints
    #[serde(rename = "checkpoint-interval", default = "default_checkpoint_interval")]
    pub checkpoint_interval: u64,

    /// Consecutive tail misses before a series is considered finished
    #[serde(rename = "miss-threshold", default = "default_miss_threshold")]
    pub miss_threshold: u32,

    /// How far past the known maximum the tail probe may go
    #[serde(rename = "tail-span", default = "default_tail_span")]
    pub tail_span: u32,

    /// Largest jump between known ordinals that the gap probe will fill;
    /// keys past a bigger jump are treated as outliers
    #[serde(rename = "gap-span", default = "default_gap_span")]
    pub gap_span: u32,

    /// Results requested for a single-key probe
    #[serde(rename = "probe-count", default = "default_probe_count")]
    pub probe_count: u32,

    /// Regions covered by the wide-prefix probe when nothing is known there
    #[serde(rename = "wide-regions", default = "default_wide_regions")]
    pub wide_regions: Vec<String>,

    /// Entity types combined with each region for wide probing
    #[serde(default = "default_kinds")]
    pub kinds: Vec<String>,

    /// Phases to run, in order
    #[serde(default = "default_phases")]
    pub phases: Vec<Phase>,

    #[serde(rename = "merge-policy", default)]
    pub merge_policy: MergePolicy,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            alphabet: default_alphabet(),
            max_depth: default_max_depth(),
            query_delay_ms: default_query_delay_ms(),
            checkpoint_interval: default_checkpoint_interval(),
            miss_threshold: default_miss_threshold(),
            tail_span: default_tail_span(),
            gap_span: default_gap_span(),
            probe_count: default_probe_count(),
            wide_regions: default_wide_regions(),
            kinds: default_kinds(),
            phases: default_phases(),
            merge_policy: MergePolicy::default(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the JSON snapshot used for checkpoints and the final result
    #[serde(rename = "snapshot-path")]
    pub snapshot_path: PathBuf,
}

/// One stage of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Breadth-first expansion of text prefixes
    Prefix,
    /// One query per region+type for regions with nothing known
    Wide,
    /// Ordinals above each series' known maximum
    Tail,
    /// Unknown ordinals below each series' known maximum
    Gap,
    /// Re-verification of entities known at run start
    Refresh,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Prefix => "prefix",
            Phase::Wide => "wide",
            Phase::Tail => "tail",
            Phase::Gap => "gap",
            Phase::Refresh => "refresh",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_base_url() -> String {
    "https://suggestions.dadata.ru/suggestions/api/4_1/rs".to_string()
}

fn default_endpoint_path() -> String {
    "suggest/court".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    200
}

fn default_max_concurrent() -> u32 {
    5
}

fn default_requests_per_second() -> u32 {
    20
}

fn default_result_cap() -> u32 {
    20
}

fn default_skip() -> Vec<String> {
    vec!["1.env".to_string()]
}

fn default_budget() -> u64 {
    9_500
}

fn default_api_key_var() -> String {
    "DADATA_API_KEY".to_string()
}

fn default_secret_key_var() -> String {
    "DADATA_SECRET_KEY".to_string()
}

fn default_alphabet() -> String {
    "АБВГДЕЁЖЗИЙКЛМНОПРСТУФХЦЧШЩЪЫЬЭЮЯ".to_string()
}

fn default_max_depth() -> u32 {
    3
}

fn default_query_delay_ms() -> u64 {
    20
}

fn default_checkpoint_interval() -> u64 {
    100
}

fn default_miss_threshold() -> u32 {
    20
}

fn default_tail_span() -> u32 {
    200
}

fn default_gap_span() -> u32 {
    1_000
}

fn default_probe_count() -> u32 {
    1
}

fn default_wide_regions() -> Vec<String> {
    (90..=99).map(|region| region.to_string()).collect()
}

fn default_kinds() -> Vec<String> {
    [
        "RS", "MS", "AS", "OS", "GV", "OV", "KV", "AV", "KJ", "AJ", "AA", "AO", "VS", "AI",
    ]
    .iter()
    .map(|kind| kind.to_string())
    .collect()
}

fn default_phases() -> Vec<Phase> {
    vec![Phase::Prefix, Phase::Wide, Phase::Tail, Phase::Gap]
}

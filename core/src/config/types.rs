use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Root directory for project records and run artifacts.
    /// Empty means `~/.overwatch`.
    #[serde(default)]
    pub data_dir: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub http_server: HttpServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "overwatch_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    true
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Process-wide cap on concurrently running pipelines.
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,

    /// Dispatch loop tick interval.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// After a cancel signal, how long a running external process may
    /// continue before it is forcibly terminated.
    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,
}

fn default_max_concurrent_runs() -> usize {
    1
}

fn default_tick_interval_ms() -> u64 {
    2000
}

fn default_cancel_grace_ms() -> u64 {
    5000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: default_max_concurrent_runs(),
            tick_interval_ms: default_tick_interval_ms(),
            cancel_grace_ms: default_cancel_grace_ms(),
        }
    }
}

/// Binary name and invocation timeout for one external tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    pub bin: String,
    pub timeout_secs: u64,
}

impl ToolConfig {
    fn new(bin: &str, timeout_secs: u64) -> Self {
        Self {
            bin: bin.to_string(),
            timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_subfinder")]
    pub subfinder: ToolConfig,
    #[serde(default = "default_assetfinder")]
    pub assetfinder: ToolConfig,
    #[serde(default = "default_dnsx")]
    pub dnsx: ToolConfig,
    #[serde(default = "default_httpx")]
    pub httpx: ToolConfig,
    #[serde(default = "default_naabu")]
    pub naabu: ToolConfig,
    #[serde(default = "default_gowitness")]
    pub gowitness: ToolConfig,
    #[serde(default = "default_nuclei")]
    pub nuclei: ToolConfig,

    /// Fixed top-N port set scanned per live host.
    #[serde(default = "default_top_ports")]
    pub top_ports: u16,

    /// Severity filter for the vulnerability scanner.
    #[serde(default = "default_severities")]
    pub vuln_severities: Vec<String>,

    /// Tool-level request rate limit for the vulnerability scanner.
    #[serde(default = "default_vuln_rate_limit")]
    pub vuln_rate_limit: u32,

    /// Tool-level template concurrency for the vulnerability scanner.
    #[serde(default = "default_vuln_concurrency")]
    pub vuln_concurrency: u32,

    /// Visual capture is skipped when live-HTTP count reaches this bound.
    #[serde(default = "default_screenshot_max_hosts")]
    pub screenshot_max_hosts: usize,
}

fn default_subfinder() -> ToolConfig {
    ToolConfig::new("subfinder", 600)
}

fn default_assetfinder() -> ToolConfig {
    ToolConfig::new("assetfinder", 600)
}

fn default_dnsx() -> ToolConfig {
    ToolConfig::new("dnsx", 300)
}

fn default_httpx() -> ToolConfig {
    ToolConfig::new("httpx", 600)
}

fn default_naabu() -> ToolConfig {
    ToolConfig::new("naabu", 900)
}

fn default_gowitness() -> ToolConfig {
    ToolConfig::new("gowitness", 600)
}

fn default_nuclei() -> ToolConfig {
    ToolConfig::new("nuclei", 3600)
}

fn default_top_ports() -> u16 {
    100
}

fn default_severities() -> Vec<String> {
    vec![
        "critical".to_string(),
        "high".to_string(),
        "medium".to_string(),
    ]
}

fn default_vuln_rate_limit() -> u32 {
    150
}

fn default_vuln_concurrency() -> u32 {
    25
}

fn default_screenshot_max_hosts() -> usize {
    100
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            subfinder: default_subfinder(),
            assetfinder: default_assetfinder(),
            dnsx: default_dnsx(),
            httpx: default_httpx(),
            naabu: default_naabu(),
            gowitness: default_gowitness(),
            nuclei: default_nuclei(),
            top_ports: default_top_ports(),
            vuln_severities: default_severities(),
            vuln_rate_limit: default_vuln_rate_limit(),
            vuln_concurrency: default_vuln_concurrency(),
            screenshot_max_hosts: default_screenshot_max_hosts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
}

fn default_http_host() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    8080
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_http_host(),
            port: default_http_port(),
        }
    }
}

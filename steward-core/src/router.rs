//! Intent router — decides whether input needs the language model at all.
//!
//! Classification walks a prioritized rule list (first match wins). Rules
//! are data-driven: built-in defaults cover English and Chinese phrasings,
//! and user rules from [`RouterConfig`] are consulted first. System queries
//! are the fast path — they map to a deterministic local answer with no
//! model round-trip.

use crate::config::{IntentRuleConfig, RouterConfig};
use crate::error::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// The coarse intent classes the router distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Chat,
    SystemQuery,
    FileOperation,
    ShellCommand,
    ComplexTask,
}

impl std::fmt::Display for IntentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntentKind::Chat => write!(f, "chat"),
            IntentKind::SystemQuery => write!(f, "system_query"),
            IntentKind::FileOperation => write!(f, "file_operation"),
            IntentKind::ShellCommand => write!(f, "shell_command"),
            IntentKind::ComplexTask => write!(f, "complex_task"),
        }
    }
}

/// Deterministic system data a fast-path query can fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Cpu,
    Memory,
    Disk,
    Process,
    Time,
    Path,
    Env,
    Network,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Cpu => "cpu",
            QueryType::Memory => "memory",
            QueryType::Disk => "disk",
            QueryType::Process => "process",
            QueryType::Time => "time",
            QueryType::Path => "path",
            QueryType::Env => "env",
            QueryType::Network => "network",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cpu" => Some(Self::Cpu),
            "memory" => Some(Self::Memory),
            "disk" => Some(Self::Disk),
            "process" => Some(Self::Process),
            "time" => Some(Self::Time),
            "path" => Some(Self::Path),
            "env" => Some(Self::Env),
            "network" => Some(Self::Network),
            _ => None,
        }
    }
}

/// The kind of file operation detected in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOp {
    Read,
    Write,
    Delete,
    List,
}

/// The router's classification of one input.
#[derive(Debug, Clone)]
pub struct IntentResult {
    pub kind: IntentKind,
    pub confidence: f64,
    pub needs_llm: bool,
    /// Set for system queries.
    pub query_type: Option<QueryType>,
    /// Set for file operations when a path could be extracted.
    pub path: Option<String>,
    /// Set for file operations.
    pub file_op: Option<FileOp>,
}

impl IntentResult {
    fn new(kind: IntentKind, confidence: f64, needs_llm: bool) -> Self {
        Self {
            kind,
            confidence,
            needs_llm,
            query_type: None,
            path: None,
            file_op: None,
        }
    }
}

/// One prioritized classification rule.
struct IntentRule {
    kind: IntentKind,
    patterns: Vec<Regex>,
    needs_llm: bool,
    query_type: Option<QueryType>,
    file_op: Option<FileOp>,
}

impl IntentRule {
    fn matches(&self, input: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(input))
    }
}

/// The intent router.
pub struct IntentRouter {
    rules: Vec<IntentRule>,
    quoted_path: Regex,
    dotted_token: Regex,
    short_input_threshold: usize,
}

impl IntentRouter {
    pub fn new(config: &RouterConfig) -> Result<Self, ConfigError> {
        let mut rules = Vec::new();
        for custom in &config.custom_rules {
            rules.push(Self::compile_custom(custom)?);
        }
        rules.extend(Self::builtin_rules()?);

        Ok(Self {
            rules,
            quoted_path: compile(r#"["'`]([^"'`]+)["'`]"#)?,
            dotted_token: compile(r"(\S+\.[A-Za-z0-9]{1,8})(\s|$)")?,
            short_input_threshold: config.short_input_threshold,
        })
    }

    /// Classify raw input. First matching rule wins; inputs matching nothing
    /// fall back by length.
    pub fn detect(&self, input: &str) -> IntentResult {
        let trimmed = input.trim();

        for rule in &self.rules {
            if rule.matches(trimmed) {
                let mut result = IntentResult::new(rule.kind, 0.9, rule.needs_llm);
                result.query_type = rule.query_type;
                result.file_op = rule.file_op;
                if rule.kind == IntentKind::FileOperation {
                    result.path = self.extract_path(trimmed);
                }
                return result;
            }
        }

        if trimmed.chars().count() < self.short_input_threshold {
            IntentResult::new(IntentKind::Chat, 0.5, true)
        } else {
            IntentResult::new(IntentKind::ComplexTask, 0.5, true)
        }
    }

    /// True only for system queries answerable without the model.
    pub fn is_fast_path(&self, intent: &IntentResult) -> bool {
        intent.kind == IntentKind::SystemQuery && !intent.needs_llm
    }

    /// Pull a likely path out of the input: a quoted string, or the first
    /// token carrying a dot extension.
    fn extract_path(&self, input: &str) -> Option<String> {
        if let Some(caps) = self.quoted_path.captures(input) {
            return Some(caps[1].to_string());
        }
        self.dotted_token
            .captures(input)
            .map(|caps| caps[1].trim_end_matches([',', '.', ';', '?']).to_string())
    }

    fn compile_custom(rule: &IntentRuleConfig) -> Result<IntentRule, ConfigError> {
        let kind = match rule.intent.as_str() {
            "chat" => IntentKind::Chat,
            "system_query" => IntentKind::SystemQuery,
            "file_operation" => IntentKind::FileOperation,
            "shell_command" => IntentKind::ShellCommand,
            "complex_task" => IntentKind::ComplexTask,
            other => {
                return Err(ConfigError::Invalid {
                    message: format!("unknown intent '{other}' in router rule"),
                })
            }
        };
        let patterns = rule
            .patterns
            .iter()
            .map(|p| compile(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(IntentRule {
            kind,
            patterns,
            needs_llm: matches!(
                kind,
                IntentKind::Chat | IntentKind::ShellCommand | IntentKind::ComplexTask
            ),
            query_type: rule.query_type.as_deref().and_then(QueryType::parse),
            file_op: None,
        })
    }

    /// The built-in rule list, highest priority first.
    fn builtin_rules() -> Result<Vec<IntentRule>, ConfigError> {
        let mut rules = Vec::new();

        // 1. Chat greetings and small talk.
        rules.push(IntentRule {
            kind: IntentKind::Chat,
            patterns: vec![
                compile(r"(?i)^\s*(hi|hello|hey|yo|howdy|你好|您好|嗨)\b")?,
                compile(r"(?i)who\s+are\s+you|你是谁")?,
                compile(r"(?i)^\s*(thanks|thank\s+you|谢谢|多谢)")?,
                compile(r"(?i)^\s*(help|帮助|帮帮我)\s*$")?,
            ],
            needs_llm: true,
            query_type: None,
            file_op: None,
        });

        // 2. System query families, one rule per query type.
        let families: &[(QueryType, &str)] = &[
            (QueryType::Cpu, r"(?i)\bcpu\b|processor|load\s+average|处理器|负载"),
            (
                QueryType::Memory,
                r"(?i)\bmemory\b|\bram\b|内存|剩余内存",
            ),
            (
                QueryType::Disk,
                r"(?i)\bdisk\b|disk\s+space|storage\s+left|磁盘|硬盘",
            ),
            (
                QueryType::Process,
                r"(?i)\bprocess(es)?\b|running\s+tasks|进程",
            ),
            (
                QueryType::Time,
                r"(?i)what\s+time|current\s+(time|date)|today'?s\s+date|几点|时间|日期|今天",
            ),
            (
                QueryType::Path,
                r"(?i)current\s+(dir|directory|path)|working\s+directory|\bcwd\b|当前目录|工作目录|当前路径",
            ),
            (
                QueryType::Env,
                r"(?i)env(ironment)?\s+variable|\$[A-Z_]+\b|环境变量",
            ),
            (
                QueryType::Network,
                r"(?i)\bip\s+address\b|network\s+(info|status)|hostname|网络|IP地址",
            ),
        ];
        for (query_type, pattern) in families {
            rules.push(IntentRule {
                kind: IntentKind::SystemQuery,
                patterns: vec![compile(pattern)?],
                needs_llm: false,
                query_type: Some(*query_type),
                file_op: None,
            });
        }

        // 3. File operation families. Delete before read/write so that
        // "delete the file" does not match a broader pattern first.
        let file_ops: &[(FileOp, &str)] = &[
            (
                FileOp::Delete,
                r"(?i)\b(delete|remove|rm)\b.*\b(file|directory|folder)\b|删除.*文件",
            ),
            (
                FileOp::Write,
                r"(?i)\b(write|save|create)\b.*\bfile\b|写入.*文件|创建.*文件|保存.*文件",
            ),
            (
                FileOp::Read,
                r"(?i)\b(read|open|show|cat|view)\b.*\b(file|content)\b|读取.*文件|查看.*文件|打开.*文件",
            ),
            (
                FileOp::List,
                r"(?i)\blist\b.*\b(files|directory|folder)\b|show\s+files|列出.*文件|目录.*文件",
            ),
        ];
        for (file_op, pattern) in file_ops {
            rules.push(IntentRule {
                kind: IntentKind::FileOperation,
                patterns: vec![compile(pattern)?],
                needs_llm: false,
                query_type: None,
                file_op: Some(*file_op),
            });
        }

        // 4. Shell command prefixes and the bare `word -flag` shape.
        rules.push(IntentRule {
            kind: IntentKind::ShellCommand,
            patterns: vec![
                compile(r"(?i)^\s*(run|exec|execute|执行|运行)\b")?,
                compile(r"^\s*[a-zA-Z][\w.-]*\s+--?[a-zA-Z]")?,
            ],
            needs_llm: true,
            query_type: None,
            file_op: None,
        });

        // 5. Complex-task sequencing indicators.
        rules.push(IntentRule {
            kind: IntentKind::ComplexTask,
            patterns: vec![compile(
                r"(?i)\bthen\b|\bafter\s+that\b|\bif\b.*\belse\b|\bloop\b|\bbatch\b|automate|monitor|schedule|每当|然后|接着|如果|否则|循环|批量|自动化|监控|定时",
            )?],
            needs_llm: true,
            query_type: None,
            file_op: None,
        });

        Ok(rules)
    }
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::Invalid {
        message: format!("invalid router pattern '{pattern}': {e}"),
    })
}

/// TTL memoization of fast-path query answers.
///
/// Constantly-changing data (time) gets a zero TTL; volatile system data a
/// couple of seconds; near-static data the full five seconds.
pub struct QueryCache {
    entries: HashMap<QueryType, (String, Instant)>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    fn ttl(query_type: QueryType) -> Duration {
        match query_type {
            QueryType::Time => Duration::ZERO,
            QueryType::Cpu | QueryType::Memory | QueryType::Process | QueryType::Network => {
                Duration::from_secs(2)
            }
            QueryType::Disk | QueryType::Path | QueryType::Env => Duration::from_secs(5),
        }
    }

    pub fn get(&self, query_type: QueryType) -> Option<&str> {
        let (value, stored_at) = self.entries.get(&query_type)?;
        if stored_at.elapsed() < Self::ttl(query_type) {
            Some(value.as_str())
        } else {
            None
        }
    }

    pub fn put(&mut self, query_type: QueryType, value: impl Into<String>) {
        self.entries.insert(query_type, (value.into(), Instant::now()));
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

/// A tool candidate for keyword-scored matching.
#[derive(Debug, Clone)]
pub struct ToolCandidate {
    pub name: String,
    pub keywords: Vec<String>,
    pub examples: Vec<String>,
}

/// Keyword-scored matcher for slash-command aliasing and fuzzy tool lookup.
///
/// Scores candidates by keyword substring hits, example-string overlap, and
/// token-overlap ratio; the best candidate wins only above the configured
/// threshold, otherwise the caller defers to the model.
pub struct ToolMatcher {
    candidates: Vec<ToolCandidate>,
    threshold: f64,
}

impl ToolMatcher {
    pub fn new(candidates: Vec<ToolCandidate>, threshold: f64) -> Self {
        Self {
            candidates,
            threshold,
        }
    }

    /// The best-scoring candidate at or above the threshold.
    pub fn best_match(&self, input: &str) -> Option<(&ToolCandidate, f64)> {
        let scored = self
            .candidates
            .iter()
            .map(|c| (c, self.score(input, c)))
            .max_by(|a, b| a.1.total_cmp(&b.1))?;
        (scored.1 >= self.threshold).then_some(scored)
    }

    fn score(&self, input: &str, candidate: &ToolCandidate) -> f64 {
        let lower = input.to_lowercase();
        let input_tokens: Vec<&str> = lower.split_whitespace().collect();
        if input_tokens.is_empty() {
            return 0.0;
        }

        // Keyword substring hits.
        let keyword_score = if candidate.keywords.is_empty() {
            0.0
        } else {
            let hits = candidate
                .keywords
                .iter()
                .filter(|k| lower.contains(&k.to_lowercase()))
                .count();
            hits as f64 / candidate.keywords.len() as f64
        };

        // Best example-string token overlap.
        let example_score = candidate
            .examples
            .iter()
            .map(|example| {
                let example_lower = example.to_lowercase();
                let example_tokens: Vec<&str> = example_lower.split_whitespace().collect();
                if example_tokens.is_empty() {
                    return 0.0;
                }
                let shared = input_tokens
                    .iter()
                    .filter(|t| example_tokens.contains(t))
                    .count();
                shared as f64 / example_tokens.len() as f64
            })
            .fold(0.0, f64::max);

        // Overall token-overlap ratio against everything the candidate names.
        let vocab: Vec<String> = candidate
            .keywords
            .iter()
            .chain(candidate.examples.iter())
            .flat_map(|s| s.to_lowercase().split_whitespace().map(String::from).collect::<Vec<_>>())
            .collect();
        let overlap = input_tokens
            .iter()
            .filter(|t| vocab.iter().any(|v| v == *t))
            .count() as f64
            / input_tokens.len() as f64;

        keyword_score * 0.5 + example_score * 0.3 + overlap * 0.2
    }
}

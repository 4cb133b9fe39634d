//! Domain tag inference.
//!
//! Defines the [`TaggingCapability`] trait and its implementations:
//! - **[`RuleBasedTagger`]**: deterministic keyword matching against the
//!   curated lists in [`keywords_for`]. Pure and total.
//! - **[`GeminiTagger`]**: asks the Gemini `generateContent` API to pick tags
//!   from the closed vocabulary.
//!
//! # Fallback Contract
//!
//! [`infer_tags`] never fails. A capability call is bounded by a timeout and
//! may be retried once for transient errors. When the call fails, times out,
//! or yields no in-vocabulary tags, the rule-based result is used instead and
//! the outcome reports [`ProcessingMethod::RuleBased`].
//!
//! # Capability Selection
//!
//! Use [`create_capability`] to build the capability named by the
//! configuration:
//!
//! ```rust
//! # use compliance_copilot::config::TaggingConfig;
//! # use compliance_copilot::tagging::create_capability;
//! let mut config = TaggingConfig::default();
//! config.provider = "rules".to_string();
//! let capability = create_capability(&config).unwrap();
//! assert_eq!(capability.name(), "rules");
//! ```

pub mod gemini;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{gemini_api_key, TaggingConfig};
use crate::error::CapabilityError;
use crate::models::{Domain, ProcessingMethod};

pub use gemini::GeminiTagger;

/// A pluggable source of domain tags.
#[async_trait]
pub trait TaggingCapability: Send + Sync {
    /// Short identifier used in logs (e.g. `"rules"`, `"gemini"`).
    fn name(&self) -> &str;

    /// The processing method reported when this capability's tags are used.
    fn method(&self) -> ProcessingMethod;

    /// Tag `text` using only labels from `vocabulary`.
    ///
    /// Implementations may return labels outside the vocabulary or in any
    /// case; [`infer_tags`] normalizes and filters them.
    async fn tag(&self, text: &str, vocabulary: &[Domain]) -> Result<Vec<String>, CapabilityError>;
}

/// Tags chosen for one chunk and the path that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagOutcome {
    pub tags: Vec<Domain>,
    pub method: ProcessingMethod,
}

impl TagOutcome {
    fn rules(text: &str) -> Self {
        Self {
            tags: rule_based_tags(text),
            method: ProcessingMethod::RuleBased,
        }
    }
}

// ============ Rule-based tagging ============

/// Curated keywords and phrases per domain, lowercase.
pub fn keywords_for(domain: Domain) -> &'static [&'static str] {
    match domain {
        Domain::Finance => &[
            "finance", "financial", "financial statement", "budget", "revenue", "tax",
            "taxation", "investment", "funding", "expenditure", "expense", "accounting",
            "audit", "banking", "credit", "loan", "payment", "profit", "income", "fiscal",
            "monetary", "treasury", "invoice", "dividend",
        ],
        Domain::Technology => &[
            "technology", "digital", "software", "hardware", "computer", "database",
            "network", "cybersecurity", "cyber security", "cloud", "encryption",
            "algorithm", "machine learning", "artificial intelligence", "ai",
            "blockchain", "api", "automation", "information technology",
        ],
        Domain::Healthcare => &[
            "health", "healthcare", "medical", "hospital", "patient", "disease",
            "treatment", "medicine", "clinical", "diagnosis", "therapy",
            "pharmaceutical", "vaccine", "surgery", "nursing", "mental health",
            "epidemiology", "telemedicine",
        ],
        Domain::Environment => &[
            "environment", "environmental", "climate", "carbon", "emission",
            "sustainability", "sustainable", "renewable", "pollution", "ecosystem",
            "biodiversity", "conservation", "solar", "recycling", "greenhouse",
            "global warming", "carbon footprint", "waste",
        ],
        Domain::Infrastructure => &[
            "infrastructure", "construction", "transport", "transportation", "road",
            "bridge", "highway", "railway", "public works", "utilities", "sewage",
            "water supply", "power grid", "telecommunications", "housing", "facility",
            "facilities",
        ],
        Domain::Legal => &[
            "legal", "law", "regulation", "regulatory", "legislation", "statute",
            "court", "judge", "attorney", "lawyer", "contract", "agreement", "liability",
            "jurisdiction", "enforcement", "penalty", "sanction", "litigation",
            "compliance",
        ],
        Domain::Education => &[
            "education", "school", "university", "college", "student", "teacher",
            "curriculum", "academic", "training", "certification", "degree",
            "scholarship", "literacy", "pedagogy",
        ],
        Domain::Government => &[
            "government", "administration", "bureaucracy", "civil service", "municipal",
            "federal", "ministry", "election", "democracy", "citizen", "public sector",
            "public service", "parliament", "legislature", "agency",
        ],
    }
}

/// Deterministic keyword tagging. Returns domains in vocabulary order.
pub fn rule_based_tags(text: &str) -> Vec<Domain> {
    let lowered = text.to_lowercase();
    Domain::ALL
        .iter()
        .copied()
        .filter(|d| keywords_for(*d).iter().any(|k| contains_keyword(&lowered, k)))
        .collect()
}

/// Word-boundary match that tolerates a plural `s`/`es` suffix.
fn contains_keyword(haystack: &str, keyword: &str) -> bool {
    haystack.match_indices(keyword).any(|(pos, _)| {
        let starts_word = haystack[..pos]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        if !starts_word {
            return false;
        }
        let after = &haystack[pos + keyword.len()..];
        ["", "s", "es"].iter().any(|suffix| {
            after.strip_prefix(suffix).is_some_and(|rest| {
                rest.chars().next().map_or(true, |c| !c.is_alphanumeric())
            })
        })
    })
}

/// The deterministic capability: keyword rules exposed through the trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedTagger;

#[async_trait]
impl TaggingCapability for RuleBasedTagger {
    fn name(&self) -> &str {
        "rules"
    }

    fn method(&self) -> ProcessingMethod {
        ProcessingMethod::RuleBased
    }

    async fn tag(&self, text: &str, vocabulary: &[Domain]) -> Result<Vec<String>, CapabilityError> {
        Ok(rule_based_tags(text)
            .into_iter()
            .filter(|d| vocabulary.contains(d))
            .map(|d| d.as_str().to_string())
            .collect())
    }
}

// ============ Inference with fallback ============

/// Map raw labels onto the closed vocabulary, dropping unknowns and duplicates
/// while keeping first-seen order.
pub fn normalize_tags(raw: &[String]) -> Vec<Domain> {
    let mut tags = Vec::new();
    for label in raw {
        match label.parse::<Domain>() {
            Ok(domain) if !tags.contains(&domain) => tags.push(domain),
            Ok(_) => {}
            Err(_) => debug!(label = %label, "discarding out-of-vocabulary tag"),
        }
    }
    tags
}

/// Infer tags for one chunk. Falls back to keyword rules on any capability
/// failure or empty result; never returns an error.
pub async fn infer_tags(
    text: &str,
    capability: Option<&dyn TaggingCapability>,
    timeout: Duration,
    max_retries: u32,
) -> TagOutcome {
    let Some(capability) = capability else {
        return TagOutcome::rules(text);
    };

    match call_with_retry(capability, text, timeout, max_retries).await {
        Ok(raw) => {
            let tags = normalize_tags(&raw);
            if tags.is_empty() {
                debug!(
                    capability = capability.name(),
                    "no in-vocabulary tags returned; using rules"
                );
                TagOutcome::rules(text)
            } else {
                TagOutcome {
                    tags,
                    method: capability.method(),
                }
            }
        }
        Err(e) => {
            warn!(
                capability = capability.name(),
                error = %e,
                "tagging capability failed; falling back to rules"
            );
            TagOutcome::rules(text)
        }
    }
}

async fn call_with_retry(
    capability: &dyn TaggingCapability,
    text: &str,
    timeout: Duration,
    max_retries: u32,
) -> Result<Vec<String>, CapabilityError> {
    let mut last_err = CapabilityError::Unavailable("no attempt made".to_string());

    for attempt in 0..=max_retries {
        if attempt > 0 {
            debug!(capability = capability.name(), attempt, "retrying tagging call");
        }
        let err = match tokio::time::timeout(timeout, capability.tag(text, &Domain::ALL)).await {
            Ok(Ok(raw)) => return Ok(raw),
            Ok(Err(e)) => e,
            Err(_) => CapabilityError::Timeout(timeout.as_secs()),
        };
        if !err.is_retryable() {
            return Err(err);
        }
        last_err = err;
    }

    Err(last_err)
}

/// Holds the configured capability and its call limits for a pipeline run.
pub struct TagInferencer {
    capability: Box<dyn TaggingCapability>,
    timeout: Duration,
    max_retries: u32,
}

impl TagInferencer {
    pub fn new(capability: Box<dyn TaggingCapability>, timeout: Duration, max_retries: u32) -> Self {
        Self {
            capability,
            timeout,
            max_retries: max_retries.min(1),
        }
    }

    /// Keyword rules only; no external calls.
    pub fn rule_based() -> Self {
        Self::new(Box::new(RuleBasedTagger), Duration::from_secs(1), 0)
    }

    pub fn from_config(config: &TaggingConfig) -> Result<Self> {
        Ok(Self::new(
            create_capability(config)?,
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        ))
    }

    pub fn capability_name(&self) -> &str {
        self.capability.name()
    }

    pub async fn infer(&self, text: &str) -> TagOutcome {
        infer_tags(text, Some(self.capability.as_ref()), self.timeout, self.max_retries).await
    }
}

/// Build the capability selected by `config.provider`.
pub fn create_capability(config: &TaggingConfig) -> Result<Box<dyn TaggingCapability>> {
    match config.resolved_provider() {
        "rules" => Ok(Box::new(RuleBasedTagger)),
        "gemini" => {
            let api_key = gemini_api_key()
                .ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY environment variable not set"))?;
            Ok(Box::new(GeminiTagger::new(config, api_key)?))
        }
        other => anyhow::bail!("Unknown tagging provider: {}", other),
    }
}

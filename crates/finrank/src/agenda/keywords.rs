//! Offline keyword classifier.

use async_trait::async_trait;

use super::AgendaService;
use crate::error::AgendaError;
use crate::models::AuthorPaper;

/// Returned when no topic keyword matches.
pub const FALLBACK_AGENDA: &str = "Finance Research";

/// Topics and their keywords, in tie-break order.
const TOPICS: &[(&str, &[&str])] = &[
    (
        "Asset Pricing and Returns",
        &["return", "risk premium", "asset pricing", "equity premium", "expected return", "factor"],
    ),
    (
        "Corporate Finance and Investment",
        &["corporate", "firm", "investment", "capital structure", "dividend", "financing"],
    ),
    ("Banking and Credit Markets", &["bank", "credit", "loan", "lending", "financial institution"]),
    ("ESG and Climate Finance", &["esg", "climate", "green", "sustainable", "environmental", "carbon"]),
    (
        "Market Microstructure and Trading",
        &["liquidity", "trading", "market microstructure", "bid", "spread", "high frequency"],
    ),
    ("Behavioral Finance", &["investor sentiment", "behavioral", "bias", "retail investor", "attention"]),
    ("Fintech and Innovation", &["fintech", "technology", "digital", "blockchain", "crypto", "innovation"]),
    ("International Finance", &["international", "exchange rate", "currency", "global", "cross country"]),
    (
        "Household Finance",
        &["household", "consumer", "mortgage", "retirement", "saving", "personal finance"],
    ),
    ("Derivatives and Options", &["option", "derivative", "volatility", "futures", "hedging"]),
    (
        "Monetary Policy and Macro",
        &["monetary policy", "federal reserve", "interest rate", "inflation", "central bank"],
    ),
    ("Private Equity and VC", &["private equity", "venture capital", "startup", "ipo", "vc"]),
    ("Real Estate Finance", &["real estate", "housing", "property", "mortgage market"]),
    ("Risk Management", &["risk management", "systemic risk", "financial stability", "regulation"]),
];

/// Classifies by counting which topic keywords occur in titles and abstracts.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordAgendaService;

impl KeywordAgendaService {
    /// Classify papers without any I/O.
    #[must_use]
    pub fn classify(papers: &[AuthorPaper]) -> &'static str {
        let text = papers
            .iter()
            .map(|p| format!("{} {}", p.title, p.abstract_text.as_deref().unwrap_or_default()))
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        let mut best: Option<(&'static str, usize)> = None;
        for (topic, keywords) in TOPICS {
            let score = keywords.iter().filter(|kw| text.contains(**kw)).count();
            if score > 0 && best.is_none_or(|(_, top)| score > top) {
                best = Some((*topic, score));
            }
        }
        best.map_or(FALLBACK_AGENDA, |(topic, _)| topic)
    }
}

#[async_trait]
impl AgendaService for KeywordAgendaService {
    fn name(&self) -> &'static str {
        "keywords"
    }

    async fn summarize(&self, _author: &str, papers: &[AuthorPaper]) -> Result<String, AgendaError> {
        Ok(Self::classify(papers).to_string())
    }
}

//! Post Table Schema
//! Column names the loader requires and the semantic type each is coerced to.

/// Semantic type a source column is coerced to at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Timestamp,
    Numeric,
    Count,
    Flag,
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn spec(name: &'static str, kind: ColumnKind) -> ColumnSpec {
    ColumnSpec { name, kind }
}

pub const POST_ID: &str = "post_id";
pub const PLATFORM: &str = "platform";
pub const MONTH: &str = "month";
pub const WEEKDAY: &str = "weekday";
pub const COUNTRY: &str = "country";
pub const CITY: &str = "city";
pub const TIMEZONE: &str = "timezone";
pub const FACTCHECK_VERDICT: &str = "factcheck_verdict";
pub const MODEL_SIGNATURE: &str = "model_signature";
pub const SOURCE_TIMESTAMP: &str = "timestamp";
pub const DATE: &str = "date";
pub const DETECTED_SYNTHETIC_SCORE: &str = "detected_synthetic_score";
pub const SENTIMENT_SCORE: &str = "sentiment_score";
pub const TOXICITY_SCORE: &str = "toxicity_score";
pub const READABILITY_SCORE: &str = "readability_score";
pub const ENGAGEMENT: &str = "engagement";
pub const IS_MISINFORMATION: &str = "is_misinformation";
pub const AUTHOR_FOLLOWERS: &str = "author_followers";
pub const AUTHOR_VERIFIED: &str = "author_verified";

// Derived columns
pub const DETECTED_AI: &str = "detected_AI";
pub const TOTAL_POSITIVITY: &str = "total_positivity";
pub const COUNTRY_FOLLOWER_RANK: &str = "country_follower_count_rank";

/// Every column the analysis reads from the source CSV, in output order.
/// Source files usually carry more columns (ids, language, hashtags and
/// other metadata); no question reads them, so they are not required and
/// are dropped on load.
pub const REQUIRED_COLUMNS: [ColumnSpec; 18] = [
    spec(POST_ID, ColumnKind::Text),
    spec(PLATFORM, ColumnKind::Text),
    spec(SOURCE_TIMESTAMP, ColumnKind::Timestamp),
    spec(MONTH, ColumnKind::Text),
    spec(WEEKDAY, ColumnKind::Text),
    spec(COUNTRY, ColumnKind::Text),
    spec(CITY, ColumnKind::Text),
    spec(TIMEZONE, ColumnKind::Text),
    spec(AUTHOR_FOLLOWERS, ColumnKind::Count),
    spec(AUTHOR_VERIFIED, ColumnKind::Flag),
    spec(ENGAGEMENT, ColumnKind::Numeric),
    spec(SENTIMENT_SCORE, ColumnKind::Numeric),
    spec(TOXICITY_SCORE, ColumnKind::Numeric),
    spec(READABILITY_SCORE, ColumnKind::Numeric),
    spec(DETECTED_SYNTHETIC_SCORE, ColumnKind::Numeric),
    spec(MODEL_SIGNATURE, ColumnKind::Text),
    spec(IS_MISINFORMATION, ColumnKind::Flag),
    spec(FACTCHECK_VERDICT, ColumnKind::Text),
];

/// Name a required source column carries once loaded.
pub fn output_name(source: &str) -> &str {
    if source == SOURCE_TIMESTAMP {
        DATE
    } else {
        source
    }
}

/// Required columns absent from `present`, in catalogue order.
pub fn missing_columns<'a, I>(present: I) -> Vec<&'static str>
where
    I: IntoIterator<Item = &'a str>,
{
    let present: Vec<&str> = present.into_iter().collect();
    REQUIRED_COLUMNS
        .iter()
        .filter(|spec| !present.contains(&spec.name))
        .map(|spec| spec.name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_is_renamed_to_date() {
        assert_eq!(output_name("timestamp"), "date");
        assert_eq!(output_name("platform"), "platform");
    }

    #[test]
    fn missing_columns_reports_every_absent_name() {
        let present = ["post_id", "platform", "timestamp", "country"];
        let missing = missing_columns(present);
        assert!(missing.contains(&"city"));
        assert!(missing.contains(&"detected_synthetic_score"));
        assert!(!missing.contains(&"post_id"));
        assert_eq!(missing.len(), REQUIRED_COLUMNS.len() - present.len());
    }

    #[test]
    fn order_does_not_matter() {
        let mut names: Vec<&str> = REQUIRED_COLUMNS.iter().map(|s| s.name).collect();
        names.reverse();
        assert!(missing_columns(names).is_empty());
    }
}

//! Analysis Questions
//! The fixed set of questions asked of every posts table. Each one runs on
//! its own; a failing question is recorded and the rest still run.

use super::engine::{Aggregation, QueryEngine, QueryError};
use crate::config::AnalysisConfig;
use crate::data::schema::*;
use crate::report::{Answer, Finding, Section};
use crate::stats::{ChiSquareTest, Crosstab, StatsError};
use polars::prelude::*;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum QuestionError {
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Stats(#[from] StatsError),
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

type Run = fn(&DataFrame, &AnalysisConfig) -> Result<Answer, QuestionError>;

pub struct Question {
    pub id: &'static str,
    pub section: Section,
    pub text: &'static str,
    run: Run,
}

impl Question {
    pub fn ask(&self, df: &DataFrame, config: &AnalysisConfig) -> Finding {
        debug!("Running question {}", self.id);
        let outcome = (self.run)(df, config).map_err(|e| {
            warn!("Question {} failed: {}", self.id, e);
            e.to_string()
        });
        Finding {
            id: self.id,
            section: self.section,
            question: self.text,
            outcome,
        }
    }
}

pub const QUESTIONS: &[Question] = &[
    Question {
        id: "detected_ai_share",
        section: Section::Initial,
        text: "What share of posts is detected as AI generated?",
        run: detected_ai_share,
    },
    Question {
        id: "mean_positivity",
        section: Section::Initial,
        text: "What is the mean total positivity of all posts?",
        run: mean_positivity,
    },
    Question {
        id: "positivity_by_detected_ai",
        section: Section::Initial,
        text: "Mean total positivity of AI and non-AI posts",
        run: positivity_by_detected_ai,
    },
    Question {
        id: "misinformation_by_platform",
        section: Section::Initial,
        text: "Misinformation distribution within each platform",
        run: misinformation_by_platform,
    },
    Question {
        id: "detected_ai_by_platform",
        section: Section::Initial,
        text: "AI detection distribution within each platform",
        run: detected_ai_by_platform,
    },
    Question {
        id: "high_dss_by_platform",
        section: Section::Initial,
        text: "Posts above the DSS threshold per platform",
        run: high_dss_by_platform,
    },
    Question {
        id: "misinformation_share",
        section: Section::Initial,
        text: "What share of posts is misinformation?",
        run: misinformation_share,
    },
    Question {
        id: "misinformation_by_country",
        section: Section::Slicing,
        text: "Misinformation posts per country",
        run: misinformation_by_country,
    },
    Question {
        id: "engagement_by_misinformation",
        section: Section::Slicing,
        text: "Mean engagement of misinformation and factual posts",
        run: engagement_by_misinformation,
    },
    Question {
        id: "detected_ai_among_false_verdicts",
        section: Section::Slicing,
        text: "AI detection among misinformation posts with a false fact-check verdict",
        run: detected_ai_among_false_verdicts,
    },
    Question {
        id: "ai_posts_by_city",
        section: Section::Slicing,
        text: "AI-detected posts per country and city",
        run: ai_posts_by_city,
    },
    Question {
        id: "dss_by_verification",
        section: Section::Slicing,
        text: "Mean DSS of verified and unverified authors",
        run: dss_by_verification,
    },
    Question {
        id: "followers_by_country",
        section: Section::Slicing,
        text: "Mean author followers per country",
        run: followers_by_country,
    },
    Question {
        id: "misinformative_top_posts",
        section: Section::Slicing,
        text: "Countries whose top ranked posts are all misinformation",
        run: misinformative_top_posts,
    },
    Question {
        id: "detected_ai_among_top_posts",
        section: Section::Slicing,
        text: "AI detection among the top ranked posts of each country",
        run: detected_ai_among_top_posts,
    },
    Question {
        id: "engaging_cities",
        section: Section::Slicing,
        text: "Mean engagement of highly engaging posts in matching cities",
        run: engaging_cities,
    },
    Question {
        id: "followers_engagement_breakdown",
        section: Section::Slicing,
        text: "Mean followers and engagement per country, city and AI detection",
        run: followers_engagement_breakdown,
    },
    Question {
        id: "crosstab_model_signature",
        section: Section::Advanced,
        text: "Model signature vs AI detection (share of posts)",
        run: crosstab_model_signature,
    },
    Question {
        id: "chi_square_model_signature",
        section: Section::Advanced,
        text: "Is AI detection independent of the model signature?",
        run: chi_square_model_signature,
    },
    Question {
        id: "crosstab_misinformation",
        section: Section::Advanced,
        text: "Misinformation vs AI detection (share of posts)",
        run: crosstab_misinformation,
    },
    Question {
        id: "chi_square_misinformation",
        section: Section::Advanced,
        text: "Is AI detection independent of misinformation?",
        run: chi_square_misinformation,
    },
    Question {
        id: "dss_by_month",
        section: Section::Charts,
        text: "Mean DSS per month",
        run: dss_by_month,
    },
    Question {
        id: "toxicity_by_platform",
        section: Section::Charts,
        text: "Mean toxicity per platform",
        run: toxicity_by_platform,
    },
];

/// Ask every question in order.
pub fn run_all(df: &DataFrame, config: &AnalysisConfig) -> Vec<Finding> {
    let findings: Vec<Finding> = QUESTIONS.iter().map(|q| q.ask(df, config)).collect();
    let failed = findings.iter().filter(|f| f.outcome.is_err()).count();
    if failed > 0 {
        warn!("{} of {} questions failed", failed, findings.len());
    }
    findings
}

fn pattern(text: &str) -> Result<Regex, QuestionError> {
    Ok(Regex::new(text).map_err(QueryError::from)?)
}

fn top_posts(df: &DataFrame, config: &AnalysisConfig) -> Result<DataFrame, QueryError> {
    QueryEngine::filter(
        df,
        col(COUNTRY_FOLLOWER_RANK).lt_eq(lit(config.top_rank)),
    )
}

fn detected_ai_share(df: &DataFrame, _: &AnalysisConfig) -> Result<Answer, QuestionError> {
    Ok(Answer::Table(QueryEngine::value_counts(df, DETECTED_AI)?))
}

fn mean_positivity(df: &DataFrame, _: &AnalysisConfig) -> Result<Answer, QuestionError> {
    Ok(Answer::Value(QueryEngine::mean(df, TOTAL_POSITIVITY)?))
}

fn positivity_by_detected_ai(df: &DataFrame, _: &AnalysisConfig) -> Result<Answer, QuestionError> {
    Ok(Answer::Table(QueryEngine::grouped_mean(
        df,
        &[DETECTED_AI],
        TOTAL_POSITIVITY,
    )?))
}

fn misinformation_by_platform(df: &DataFrame, _: &AnalysisConfig) -> Result<Answer, QuestionError> {
    Ok(Answer::Table(QueryEngine::grouped_value_counts(
        df,
        PLATFORM,
        IS_MISINFORMATION,
    )?))
}

fn detected_ai_by_platform(df: &DataFrame, _: &AnalysisConfig) -> Result<Answer, QuestionError> {
    Ok(Answer::Table(QueryEngine::grouped_value_counts(
        df,
        PLATFORM,
        DETECTED_AI,
    )?))
}

fn high_dss_by_platform(df: &DataFrame, config: &AnalysisConfig) -> Result<Answer, QuestionError> {
    let above = QueryEngine::filter(
        df,
        col(DETECTED_SYNTHETIC_SCORE).gt(lit(config.ai_threshold)),
    )?;
    Ok(Answer::Table(QueryEngine::grouped_count(
        &above,
        &[PLATFORM],
        POST_ID,
    )?))
}

fn misinformation_share(df: &DataFrame, _: &AnalysisConfig) -> Result<Answer, QuestionError> {
    Ok(Answer::Fraction(QueryEngine::proportion(
        df,
        col(IS_MISINFORMATION),
    )?))
}

fn misinformation_by_country(df: &DataFrame, _: &AnalysisConfig) -> Result<Answer, QuestionError> {
    let misinformation = QueryEngine::filter(df, col(IS_MISINFORMATION))?;
    Ok(Answer::Table(QueryEngine::grouped_count(
        &misinformation,
        &[COUNTRY],
        POST_ID,
    )?))
}

fn engagement_by_misinformation(df: &DataFrame, _: &AnalysisConfig) -> Result<Answer, QuestionError> {
    let subset = QueryEngine::select(df, &[POST_ID, IS_MISINFORMATION, ENGAGEMENT])?;
    Ok(Answer::Table(QueryEngine::grouped_mean(
        &subset,
        &[IS_MISINFORMATION],
        ENGAGEMENT,
    )?))
}

fn detected_ai_among_false_verdicts(
    df: &DataFrame,
    config: &AnalysisConfig,
) -> Result<Answer, QuestionError> {
    let subset = QueryEngine::select(
        df,
        &[POST_ID, FACTCHECK_VERDICT, IS_MISINFORMATION, DETECTED_AI],
    )?;
    let verdict = pattern(&config.verdict_pattern)?;
    let false_verdicts = QueryEngine::filter_matching(&subset, FACTCHECK_VERDICT, &verdict)?;
    let misinformation = QueryEngine::filter(&false_verdicts, col(IS_MISINFORMATION))?;
    Ok(Answer::Table(QueryEngine::value_counts(
        &misinformation,
        DETECTED_AI,
    )?))
}

fn ai_posts_by_city(df: &DataFrame, _: &AnalysisConfig) -> Result<Answer, QuestionError> {
    let detected = QueryEngine::filter(df, col(DETECTED_AI))?;
    Ok(Answer::Table(QueryEngine::grouped_count(
        &detected,
        &[COUNTRY, CITY],
        POST_ID,
    )?))
}

fn dss_by_verification(df: &DataFrame, _: &AnalysisConfig) -> Result<Answer, QuestionError> {
    Ok(Answer::Table(QueryEngine::grouped_mean(
        df,
        &[AUTHOR_VERIFIED],
        DETECTED_SYNTHETIC_SCORE,
    )?))
}

fn followers_by_country(df: &DataFrame, _: &AnalysisConfig) -> Result<Answer, QuestionError> {
    Ok(Answer::Table(QueryEngine::grouped_mean(
        df,
        &[COUNTRY],
        AUTHOR_FOLLOWERS,
    )?))
}

fn misinformative_top_posts(df: &DataFrame, config: &AnalysisConfig) -> Result<Answer, QuestionError> {
    let top = top_posts(df, config)?;
    Ok(Answer::Table(QueryEngine::groups_with_mean(
        &top,
        COUNTRY,
        IS_MISINFORMATION,
        1.0,
    )?))
}

fn detected_ai_among_top_posts(
    df: &DataFrame,
    config: &AnalysisConfig,
) -> Result<Answer, QuestionError> {
    let top = top_posts(df, config)?;
    Ok(Answer::Table(QueryEngine::value_counts(&top, DETECTED_AI)?))
}

fn engaging_cities(df: &DataFrame, config: &AnalysisConfig) -> Result<Answer, QuestionError> {
    let city = pattern(&config.city_pattern)?;
    let matching = QueryEngine::filter_matching(df, CITY, &city)?;
    let engaging = QueryEngine::filter(
        &matching,
        col(ENGAGEMENT).gt(lit(config.engagement_threshold)),
    )?;
    Ok(Answer::Table(QueryEngine::grouped_mean(
        &engaging,
        &[CITY],
        ENGAGEMENT,
    )?))
}

fn followers_engagement_breakdown(
    df: &DataFrame,
    _: &AnalysisConfig,
) -> Result<Answer, QuestionError> {
    Ok(Answer::Table(QueryEngine::grouped_agg(
        df,
        &[COUNTRY, CITY, DETECTED_AI],
        &[
            (AUTHOR_FOLLOWERS, Aggregation::Mean),
            (ENGAGEMENT, Aggregation::Mean),
        ],
    )?))
}

fn crosstab(df: &DataFrame, row: &str) -> Result<Answer, QuestionError> {
    let table = Crosstab::from_columns(df, row, DETECTED_AI)?;
    Ok(Answer::Crosstab(table.normalized()?))
}

fn chi_square(df: &DataFrame, row: &str, config: &AnalysisConfig) -> Result<Answer, QuestionError> {
    let table = Crosstab::from_columns(df, row, DETECTED_AI)?;
    let result = ChiSquareTest::with_alpha(config.alpha).run(&table)?;
    Ok(Answer::ChiSquare(result))
}

fn crosstab_model_signature(df: &DataFrame, _: &AnalysisConfig) -> Result<Answer, QuestionError> {
    crosstab(df, MODEL_SIGNATURE)
}

fn chi_square_model_signature(df: &DataFrame, config: &AnalysisConfig) -> Result<Answer, QuestionError> {
    chi_square(df, MODEL_SIGNATURE, config)
}

fn crosstab_misinformation(df: &DataFrame, _: &AnalysisConfig) -> Result<Answer, QuestionError> {
    crosstab(df, IS_MISINFORMATION)
}

fn chi_square_misinformation(df: &DataFrame, config: &AnalysisConfig) -> Result<Answer, QuestionError> {
    chi_square(df, IS_MISINFORMATION, config)
}

fn dss_by_month(df: &DataFrame, _: &AnalysisConfig) -> Result<Answer, QuestionError> {
    Ok(Answer::Table(QueryEngine::grouped_mean(
        df,
        &[MONTH],
        DETECTED_SYNTHETIC_SCORE,
    )?))
}

fn toxicity_by_platform(df: &DataFrame, _: &AnalysisConfig) -> Result<Answer, QuestionError> {
    Ok(Answer::Table(QueryEngine::grouped_mean(
        df,
        &[PLATFORM],
        TOXICITY_SCORE,
    )?))
}

use thiserror::Error;

/// Reasons a session refuses to start
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("the plan has no sections to practice")]
    EmptyPlan,
}

/// Errors surfaced while editing or saving a plan
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("no score is selected; pick a score before saving a plan")]
    NoActiveScore,

    #[error("could not save plan '{plan_name}' for score '{score_id}': {source}")]
    Persistence {
        score_id: String,
        plan_name: String,
        #[source]
        source: StoreError,
    },

    #[error("could not load plans for score '{score_id}': {source}")]
    Load {
        score_id: String,
        #[source]
        source: StoreError,
    },

    #[error("could not load highlights for score '{score_id}': {source}")]
    Highlights {
        score_id: String,
        #[source]
        source: StoreError,
    },
}

/// Storage layer failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("malformed stored data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no plan with id {0}")]
    PlanNotFound(i64),

    #[error("plan '{0}' has no score id")]
    MissingScore(String),
}

/// Failure reported by a highlight focus implementation
#[derive(Debug, Error)]
#[error("highlight focus failed: {0}")]
pub struct FocusError(pub String);

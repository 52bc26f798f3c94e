use crate::{
    bank::{BankError, QuestionBank},
    models::{ConfusionGroup, Question},
    ports::QuestionSource,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

const BUILTIN_DATASET: &str = include_str!("../../data/flags.json");

#[derive(Debug, Deserialize)]
struct Dataset {
    questions: Vec<Question>,
    #[serde(default)]
    groups: Vec<ConfusionGroup>,
}

#[derive(Debug, Clone)]
pub enum JsonQuestionSource {
    Builtin,
    File(PathBuf),
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("couldn't read question file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed question dataset: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid question dataset: {0}")]
    Bank(#[from] BankError),
}

impl JsonQuestionSource {
    pub fn builtin() -> Self {
        Self::Builtin
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn parse(json: &str) -> Result<QuestionBank, SourceError> {
        let dataset: Dataset = serde_json::from_str(json)?;
        Ok(QuestionBank::new(dataset.questions, dataset.groups)?)
    }
}

#[async_trait]
impl QuestionSource for JsonQuestionSource {
    type Error = SourceError;

    async fn load(&self) -> Result<QuestionBank, Self::Error> {
        match self {
            JsonQuestionSource::Builtin => Self::parse(BUILTIN_DATASET),
            JsonQuestionSource::File(path) => {
                let json = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| SourceError::Io {
                        path: path.clone(),
                        source,
                    })?;
                Self::parse(&json)
            }
        }
    }
}

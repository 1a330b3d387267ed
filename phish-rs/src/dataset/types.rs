//! Labeled email records

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::classifier::Label;

/// Message language in the training corpus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Id,
    En,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::Id => "id",
            Language::En => "en",
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "id" => Ok(Language::Id),
            "en" => Ok(Language::En),
            other => Err(format!("unknown language code: {}", other)),
        }
    }
}

/// One labeled training message
#[derive(Debug, Clone, PartialEq)]
pub struct EmailRecord {
    pub date: String,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub language: Option<Language>,
    pub label: Label,
}

/// CSV row layout: `date,from,subject,body,lang,label`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct CsvRow {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

impl From<&EmailRecord> for CsvRow {
    fn from(record: &EmailRecord) -> Self {
        CsvRow {
            date: Some(record.date.clone()),
            from: Some(record.sender.clone()),
            subject: Some(record.subject.clone()),
            body: Some(record.body.clone()),
            lang: record.language.map(|l| l.code().to_string()),
            label: Some(record.label.dataset_name().to_string()),
        }
    }
}

use crate::model::wire_enum::wire_enum;
use chrono::NaiveDate;
use serde::{Serialize, Serializer};

wire_enum! {
    pub enum Gender {
        Male => "male",
        Female => "female",
    }
}

const DEFAULT_SOURCE: &str = "organic";

/// `POST /bots/users` 的参数。所有字段都会出现在请求体里（缺省为 null）。
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub id: i64,
    pub is_premium: bool,
    pub source: Option<String>,
    pub gender: Option<Gender>,
    pub born_at: Option<NaiveDate>,
}

impl NewUser {
    pub fn new(id: i64, is_premium: bool) -> Self {
        Self {
            id,
            is_premium,
            source: None,
            gender: None,
            born_at: None,
        }
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn gender(mut self, gender: Gender) -> Self {
        self.gender = Some(gender);
        self
    }

    pub fn born_at(mut self, born_at: NaiveDate) -> Self {
        self.born_at = Some(born_at);
        self
    }

    pub(crate) fn to_params(&self) -> NewUserParams<'_> {
        let source = self
            .source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SOURCE);
        NewUserParams {
            id: self.id,
            is_premium: self.is_premium,
            source,
            gender: self.gender,
            born_at: self.born_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewUserParams<'a> {
    id: i64,
    is_premium: bool,
    source: &'a str,
    gender: Option<Gender>,
    #[serde(serialize_with = "serialize_date")]
    born_at: Option<NaiveDate>,
}

/// `PATCH /bots/users` 的参数。未设置的可选字段不会出现在请求体里。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_premium: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_date"
    )]
    pub born_at: Option<NaiveDate>,
    pub is_updated: bool,
    pub is_accessed: bool,
}

impl UserUpdate {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

fn serialize_date<S: Serializer>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
    match date {
        Some(d) => serializer.collect_str(&d.format("%Y-%m-%d")),
        None => serializer.serialize_none(),
    }
}

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Answer to "Family History of Mental Illness"
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FamilyHistory {
    No,
    Yes,
}

impl FamilyHistory {
    pub const ALL: [FamilyHistory; 2] = [FamilyHistory::No, FamilyHistory::Yes];

    pub fn as_str(&self) -> &'static str {
        match self {
            FamilyHistory::No => "No",
            FamilyHistory::Yes => "Yes",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == value)
    }
}

/// Employer headcount bucket, ordered by threshold
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CompanySize {
    #[serde(rename = "1-5")]
    UpTo5,
    #[serde(rename = "6-25")]
    UpTo25,
    #[serde(rename = "26-100")]
    UpTo100,
    #[serde(rename = "100-500")]
    UpTo500,
    #[serde(rename = "500-1000")]
    UpTo1000,
    #[serde(rename = "More than 1000")]
    MoreThan1000,
}

impl CompanySize {
    pub const ALL: [CompanySize; 6] = [
        CompanySize::UpTo5,
        CompanySize::UpTo25,
        CompanySize::UpTo100,
        CompanySize::UpTo500,
        CompanySize::UpTo1000,
        CompanySize::MoreThan1000,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CompanySize::UpTo5 => "1-5",
            CompanySize::UpTo25 => "6-25",
            CompanySize::UpTo100 => "26-100",
            CompanySize::UpTo500 => "100-500",
            CompanySize::UpTo1000 => "500-1000",
            CompanySize::MoreThan1000 => "More than 1000",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == value)
    }
}

/// Age bracket, ascending
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgeGroup {
    #[serde(rename = "0-20")]
    Under21,
    #[serde(rename = "21-30")]
    Twenties,
    #[serde(rename = "31-40")]
    Thirties,
    #[serde(rename = "41-65")]
    MidCareer,
    #[serde(rename = "66-100")]
    Senior,
}

impl AgeGroup {
    pub const ALL: [AgeGroup; 5] = [
        AgeGroup::Under21,
        AgeGroup::Twenties,
        AgeGroup::Thirties,
        AgeGroup::MidCareer,
        AgeGroup::Senior,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgeGroup::Under21 => "0-20",
            AgeGroup::Twenties => "21-30",
            AgeGroup::Thirties => "31-40",
            AgeGroup::MidCareer => "41-65",
            AgeGroup::Senior => "66-100",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == value)
    }

    /// Bracket an integer age the same way the survey export does.
    pub fn from_age(age: i32) -> Option<Self> {
        match age {
            0..=20 => Some(AgeGroup::Under21),
            21..=30 => Some(AgeGroup::Twenties),
            31..=40 => Some(AgeGroup::Thirties),
            41..=65 => Some(AgeGroup::MidCareer),
            66..=100 => Some(AgeGroup::Senior),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Gender {
    Male,
    Female,
    Undecided,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::Male, Gender::Female, Gender::Undecided];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Undecided => "Undecided",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == value)
    }
}

/// One respondent's answers, before an id has been assigned.
///
/// This is the shape accepted by the insert endpoints and produced by CSV
/// ingestion. Categorical answers that were left blank stay `None` so the
/// aggregations can leave them out of their denominators.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewSurveyRecord {
    #[serde(default)]
    pub family_history: Option<FamilyHistory>,
    #[serde(default)]
    pub company_size: Option<CompanySize>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub age: Option<i32>,
    #[serde(default)]
    pub age_group: Option<AgeGroup>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub sought_treatment: bool,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub prefer_anonymity: bool,
    #[serde(default)]
    pub rate_reaction_to_problems: Option<String>,
    #[serde(default)]
    pub negative_consequences: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub access_to_information: bool,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub insurance: bool,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub discuss_mental_health_problems: Option<String>,
    #[serde(default)]
    pub responsible_employer: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub disorder: bool,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub primarily_tech_employer: bool,
}

/// A stored respondent. The id is assigned by the store and never changes.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct SurveyRecord {
    pub id: u32,
    #[serde(flatten)]
    pub answers: NewSurveyRecord,
}

impl SurveyRecord {
    pub fn create(id: u32, answers: NewSurveyRecord) -> Self {
        SurveyRecord { id, answers }
    }
}

impl std::ops::Deref for SurveyRecord {
    type Target = NewSurveyRecord;

    fn deref(&self) -> &NewSurveyRecord {
        &self.answers
    }
}

// Survey exports encode booleans as 1/0; the dashboard client sends true/false
// and leaves unanswered questions as null.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    struct FlagVisitor;

    impl<'de> Visitor<'de> for FlagVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a boolean, 0/1, \"yes\"/\"no\" or null")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<bool, E> {
            Ok(v == 1)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<bool, E> {
            Ok(v == 1)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<bool, E> {
            Ok(v == 1.0)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<bool, E> {
            match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => Ok(true),
                "0" | "false" | "no" | "" => Ok(false),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }

        fn visit_none<E: de::Error>(self) -> Result<bool, E> {
            Ok(false)
        }

        fn visit_unit<E: de::Error>(self) -> Result<bool, E> {
            Ok(false)
        }

        fn visit_some<D2: Deserializer<'de>>(self, d: D2) -> Result<bool, D2::Error> {
            d.deserialize_any(FlagVisitor)
        }
    }

    deserializer.deserialize_any(FlagVisitor)
}

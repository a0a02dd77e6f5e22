use crate::record::SurveyRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The four dashboard dropdowns. `None` means "all".
///
/// Values are compared against the record's label exactly (case-sensitive),
/// so a value no record carries just produces an empty view.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub company_size: Option<String>,
    #[serde(default)]
    pub age_group: Option<String>,
}

impl FilterState {
    pub fn is_empty(&self) -> bool {
        self.year.is_none()
            && self.gender.is_none()
            && self.company_size.is_none()
            && self.age_group.is_none()
    }

    /// Treat blank strings and the dropdown's "all" entry as no constraint.
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.is_empty() && v != "all")
        }
        FilterState {
            year: clean(self.year),
            gender: clean(self.gender),
            company_size: clean(self.company_size),
            age_group: clean(self.age_group),
        }
    }

    pub fn matches(&self, record: &SurveyRecord) -> bool {
        field_matches(&self.year, record.year.as_deref())
            && field_matches(&self.gender, record.gender.map(|g| g.as_str()))
            && field_matches(&self.company_size, record.company_size.map(|c| c.as_str()))
            && field_matches(&self.age_group, record.age_group.map(|a| a.as_str()))
    }
}

fn field_matches(wanted: &Option<String>, actual: Option<&str>) -> bool {
    match wanted {
        None => true,
        Some(wanted) => actual == Some(wanted.as_str()),
    }
}

/// Narrow `records` to the ones matching every active constraint.
///
/// Always returns a fresh vector; `records` is left untouched.
pub fn apply(records: &[SurveyRecord], filter: &FilterState) -> Vec<SurveyRecord> {
    if filter.is_empty() {
        return records.to_vec();
    }
    records
        .iter()
        .filter(|record| filter.matches(record))
        .cloned()
        .collect()
}

/// Distinct values offered by each dropdown, sorted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub years: Vec<String>,
    pub genders: Vec<String>,
    pub company_sizes: Vec<String>,
    pub age_groups: Vec<String>,
}

impl FilterOptions {
    pub fn from_records(records: &[SurveyRecord]) -> Self {
        let mut years = BTreeSet::new();
        let mut genders = BTreeSet::new();
        let mut company_sizes = BTreeSet::new();
        let mut age_groups = BTreeSet::new();

        for record in records {
            if let Some(year) = record.year.as_deref().filter(|y| !y.is_empty()) {
                years.insert(year.to_string());
            }
            if let Some(gender) = record.gender {
                genders.insert(gender.as_str().to_string());
            }
            if let Some(size) = record.company_size {
                company_sizes.insert(size.as_str().to_string());
            }
            if let Some(group) = record.age_group {
                age_groups.insert(group.as_str().to_string());
            }
        }

        FilterOptions {
            years: years.into_iter().collect(),
            genders: genders.into_iter().collect(),
            company_sizes: company_sizes.into_iter().collect(),
            age_groups: age_groups.into_iter().collect(),
        }
    }
}

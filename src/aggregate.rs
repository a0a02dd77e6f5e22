//! Grouping and percentage functions shared by every dashboard chart.
//!
//! All functions are pure over a slice of (already filtered) records. Records
//! with no value for a grouping field are left out of that grouping entirely,
//! including its denominator. Percentages are kept as unrounded `f64`; use
//! [`format_percentage`] or [`round_to`] only when presenting them.

use crate::record::{AgeGroup, CompanySize, FamilyHistory, Gender, SurveyRecord};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

lazy_static! {
    static ref FAMILY_HISTORY_DOMAIN: Vec<&'static str> =
        FamilyHistory::ALL.iter().map(|v| v.as_str()).collect();
    static ref COMPANY_SIZE_DOMAIN: Vec<&'static str> =
        CompanySize::ALL.iter().map(|v| v.as_str()).collect();
    static ref AGE_GROUP_DOMAIN: Vec<&'static str> =
        AgeGroup::ALL.iter().map(|v| v.as_str()).collect();
    static ref GENDER_DOMAIN: Vec<&'static str> = Gender::ALL.iter().map(|v| v.as_str()).collect();
}

static YES_NO: [&str; 2] = ["No", "Yes"];
static YES_NO_MAYBE: [&str; 3] = ["Yes", "No", "Maybe"];

/// A categorical field records can be grouped by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Dimension {
    FamilyHistory,
    CompanySize,
    Year,
    AgeGroup,
    Gender,
    SoughtTreatment,
    Location,
    Diagnosis,
    ResponsibleEmployer,
}

impl Dimension {
    pub fn label(&self) -> &'static str {
        match self {
            Dimension::FamilyHistory => "Family History of Mental Illness",
            Dimension::CompanySize => "Company Size",
            Dimension::Year => "Year",
            Dimension::AgeGroup => "Age Group",
            Dimension::Gender => "Gender",
            Dimension::SoughtTreatment => "Sought Treatment",
            Dimension::Location => "Location",
            Dimension::Diagnosis => "Diagnosis",
            Dimension::ResponsibleEmployer => "Responsible Employer",
        }
    }

    /// Fixed display order for closed domains, `None` for open ones.
    pub fn canonical_domain(&self) -> Option<&'static [&'static str]> {
        match self {
            Dimension::FamilyHistory => Some(FAMILY_HISTORY_DOMAIN.as_slice()),
            Dimension::CompanySize => Some(COMPANY_SIZE_DOMAIN.as_slice()),
            Dimension::AgeGroup => Some(AGE_GROUP_DOMAIN.as_slice()),
            Dimension::Gender => Some(GENDER_DOMAIN.as_slice()),
            Dimension::SoughtTreatment => Some(&YES_NO),
            Dimension::Diagnosis | Dimension::ResponsibleEmployer => Some(&YES_NO_MAYBE),
            Dimension::Year | Dimension::Location => None,
        }
    }

    /// The record's value for this dimension, or `None` when it is missing.
    ///
    /// Free-text answers outside a closed domain count as missing.
    pub fn value_of<'a>(&self, record: &'a SurveyRecord) -> Option<&'a str> {
        match self {
            Dimension::FamilyHistory => record.family_history.map(|v| v.as_str()),
            Dimension::CompanySize => record.company_size.map(|v| v.as_str()),
            Dimension::AgeGroup => record.age_group.map(|v| v.as_str()),
            Dimension::Gender => record.gender.map(|v| v.as_str()),
            Dimension::SoughtTreatment => Some(yes_no(record.sought_treatment)),
            Dimension::Year => non_blank(record.year.as_deref()),
            Dimension::Location => non_blank(record.location.as_deref()),
            Dimension::Diagnosis => in_domain(record.diagnosis.as_deref(), &YES_NO_MAYBE),
            Dimension::ResponsibleEmployer => {
                in_domain(record.responsible_employer.as_deref(), &YES_NO_MAYBE)
            }
        }
    }

    /// Every key this dimension can take for `records`: the canonical domain
    /// when there is one, otherwise the observed values sorted ascending.
    pub fn domain(&self, records: &[SurveyRecord]) -> Vec<String> {
        match self.canonical_domain() {
            Some(domain) => domain.iter().map(|k| k.to_string()).collect(),
            None => records
                .iter()
                .filter_map(|r| self.value_of(r))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn in_domain<'a>(value: Option<&'a str>, domain: &[&str]) -> Option<&'a str> {
    value.filter(|v| domain.contains(v))
}

/// A yes/no question asked of each record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Predicate {
    SoughtTreatment,
    FamilyHistory,
    Disorder,
    PreferAnonymity,
    Diagnosed,
    DiscussesProblems,
    ResponsibleEmployer,
    AnyOf(Vec<Predicate>),
}

impl Predicate {
    /// Sought treatment, family history or a disorder.
    pub fn mental_health_issue() -> Self {
        Predicate::AnyOf(vec![
            Predicate::SoughtTreatment,
            Predicate::FamilyHistory,
            Predicate::Disorder,
        ])
    }

    pub fn test(&self, record: &SurveyRecord) -> bool {
        match self {
            Predicate::SoughtTreatment => record.sought_treatment,
            Predicate::FamilyHistory => record.family_history == Some(FamilyHistory::Yes),
            Predicate::Disorder => record.disorder,
            Predicate::PreferAnonymity => record.prefer_anonymity,
            Predicate::Diagnosed => record.diagnosis.as_deref() == Some("Yes"),
            Predicate::DiscussesProblems => {
                record.discuss_mental_health_problems.as_deref() == Some("Yes")
            }
            Predicate::ResponsibleEmployer => record.responsible_employer.as_deref() == Some("Yes"),
            Predicate::AnyOf(parts) => parts.iter().any(|p| p.test(record)),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Predicate::SoughtTreatment => "Sought Treatment".to_string(),
            Predicate::FamilyHistory => "Family History".to_string(),
            Predicate::Disorder => "Disorder".to_string(),
            Predicate::PreferAnonymity => "Prefer Anonymity".to_string(),
            Predicate::Diagnosed => "Diagnosis".to_string(),
            Predicate::DiscussesProblems => "Discuss Problems".to_string(),
            Predicate::ResponsibleEmployer => "Responsible Employer".to_string(),
            Predicate::AnyOf(_) if *self == Predicate::mental_health_issue() => {
                "Mental Health Issues".to_string()
            }
            Predicate::AnyOf(parts) => parts
                .iter()
                .map(|p| p.label())
                .collect::<Vec<_>>()
                .join(" or "),
        }
    }
}

/// One key of a single-dimension grouping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub key: String,
    pub count: usize,
    pub percentage: f64,
}

/// Count records per value of `dimension`.
///
/// Percentages are relative to the records that have a value for the field,
/// not to every filtered record, so blank answers do not shrink the shares.
/// Closed domains come back in canonical order; open ones by descending count
/// with ties broken by key. Keys nobody answered are not emitted.
pub fn count_by(records: &[SurveyRecord], dimension: Dimension) -> Vec<Bucket> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        if let Some(key) = dimension.value_of(record) {
            *counts.entry(key).or_insert(0) += 1;
        }
    }

    let answered: usize = counts.values().sum();
    if answered == 0 {
        return Vec::new();
    }

    let ordered: Vec<(String, usize)> = match dimension.canonical_domain() {
        Some(domain) => domain
            .iter()
            .filter_map(|key| counts.get(key).map(|&count| (key.to_string(), count)))
            .collect(),
        None => {
            let mut entries: Vec<(String, usize)> = counts
                .into_iter()
                .map(|(key, count)| (key.to_string(), count))
                .collect();
            entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            entries
        }
    };

    ordered
        .into_iter()
        .map(|(key, count)| Bucket {
            key,
            count,
            percentage: ratio(count, answered),
        })
        .collect()
}

/// One combination of a two-way grouping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrossCell {
    pub row: String,
    pub column: String,
    pub count: usize,
    pub percentage: f64,
}

/// Two-way grouping with every combination present, zero counts included.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrossTab {
    pub rows: Dimension,
    pub columns: Dimension,
    pub row_keys: Vec<String>,
    pub column_keys: Vec<String>,
    /// Row-major: all columns of the first row key, then the next row key.
    pub cells: Vec<CrossCell>,
    pub total: usize,
}

impl CrossTab {
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn count(&self, row: &str, column: &str) -> usize {
        self.cells
            .iter()
            .find(|c| c.row == row && c.column == column)
            .map(|c| c.count)
            .unwrap_or(0)
    }

    pub fn row_total(&self, row: &str) -> usize {
        self.cells
            .iter()
            .filter(|c| c.row == row)
            .map(|c| c.count)
            .sum()
    }

    /// Rows that contain at least one record, each with its per-column counts.
    pub fn rows_with_data(&self) -> Vec<(String, Vec<usize>)> {
        self.row_keys
            .iter()
            .filter(|row| self.row_total(row) > 0)
            .map(|row| {
                let counts = self
                    .column_keys
                    .iter()
                    .map(|column| self.count(row, column))
                    .collect();
                (row.clone(), counts)
            })
            .collect()
    }

    pub fn max_count(&self) -> usize {
        self.cells.iter().map(|c| c.count).max().unwrap_or(0)
    }
}

/// Group by `rows` and `columns` at once.
///
/// Percentages are relative to the records having a value for both fields.
pub fn cross_tab(records: &[SurveyRecord], rows: Dimension, columns: Dimension) -> CrossTab {
    let row_keys = rows.domain(records);
    let column_keys = columns.domain(records);

    let mut counts: HashMap<(&str, &str), usize> = HashMap::new();
    let mut total = 0;
    for record in records {
        if let (Some(r), Some(c)) = (rows.value_of(record), columns.value_of(record)) {
            *counts.entry((r, c)).or_insert(0) += 1;
            total += 1;
        }
    }

    let mut cells = Vec::with_capacity(row_keys.len() * column_keys.len());
    for row in &row_keys {
        for column in &column_keys {
            let count = counts
                .get(&(row.as_str(), column.as_str()))
                .copied()
                .unwrap_or(0);
            cells.push(CrossCell {
                row: row.clone(),
                column: column.clone(),
                count,
                percentage: ratio(count, total),
            });
        }
    }

    CrossTab {
        rows,
        columns,
        row_keys,
        column_keys,
        cells,
        total,
    }
}

/// Share of one bucket's records that satisfy a predicate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateBucket {
    pub key: String,
    pub matching: usize,
    pub total: usize,
    pub percentage: f64,
}

/// For each value of `dimension`, the percentage of its records matching
/// `predicate`. Buckets without records are skipped so no rate is ever taken
/// over an empty denominator.
pub fn rate_by_bucket(
    records: &[SurveyRecord],
    dimension: Dimension,
    predicate: &Predicate,
) -> Vec<RateBucket> {
    let mut tallies: HashMap<&str, (usize, usize)> = HashMap::new();
    for record in records {
        if let Some(key) = dimension.value_of(record) {
            let entry = tallies.entry(key).or_insert((0, 0));
            entry.1 += 1;
            if predicate.test(record) {
                entry.0 += 1;
            }
        }
    }

    dimension
        .domain(records)
        .into_iter()
        .filter_map(|key| {
            let (matching, total) = tallies.get(key.as_str()).copied()?;
            if total == 0 {
                return None;
            }
            Some(RateBucket {
                key,
                matching,
                total,
                percentage: ratio(matching, total),
            })
        })
        .collect()
}

/// One secondary-dimension slice of a grouped rate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateSlice {
    pub key: String,
    pub matching: usize,
    pub total: usize,
    pub percentage: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupedRate {
    pub factor: String,
    pub slices: Vec<RateSlice>,
}

/// For each factor, its rate within every slice of `secondary`.
///
/// Each slice is normalized by its own subtotal, so the slices of one factor
/// are independent rates and need not add up to 100. A slice with no records
/// reports 0%.
pub fn rate_by_group(
    records: &[SurveyRecord],
    factors: &[Predicate],
    secondary: Dimension,
) -> Vec<GroupedRate> {
    if records.is_empty() {
        return Vec::new();
    }

    let keys = secondary.domain(records);
    let mut groups: BTreeMap<&str, Vec<&SurveyRecord>> = BTreeMap::new();
    for record in records {
        if let Some(key) = secondary.value_of(record) {
            groups.entry(key).or_default().push(record);
        }
    }

    factors
        .iter()
        .map(|factor| GroupedRate {
            factor: factor.label(),
            slices: keys
                .iter()
                .map(|key| {
                    let members = groups.get(key.as_str()).map(Vec::as_slice).unwrap_or(&[]);
                    let matching = members.iter().filter(|r| factor.test(r)).count();
                    RateSlice {
                        key: key.clone(),
                        matching,
                        total: members.len(),
                        percentage: ratio(matching, members.len()),
                    }
                })
                .collect(),
        })
        .collect()
}

/// Number of records satisfying `predicate`.
pub fn count_matching(records: &[SurveyRecord], predicate: &Predicate) -> usize {
    records.iter().filter(|r| predicate.test(r)).count()
}

/// Percentage of `records` satisfying `predicate`; 0 for no records.
pub fn rate(records: &[SurveyRecord], predicate: &Predicate) -> f64 {
    ratio(count_matching(records, predicate), records.len())
}

/// Node of the root → category → outcome hierarchy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    fn branch(name: &str, children: Vec<TreeNode>) -> Self {
        TreeNode {
            name: name.to_string(),
            value: None,
            percentage: None,
            children,
        }
    }

    /// Leaves under one category, each normalized by the category's subtotal.
    fn outcomes(name: &str, outcomes: &[(&str, usize)]) -> Self {
        let subtotal: usize = outcomes.iter().map(|(_, count)| count).sum();
        let children = outcomes
            .iter()
            .map(|(label, count)| TreeNode {
                name: label.to_string(),
                value: Some(*count),
                percentage: Some(ratio(*count, subtotal)),
                children: Vec::new(),
            })
            .collect();
        Self::branch(name, children)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Diagnosis, treatment and workplace outcomes as a three-level tree.
pub fn outcome_hierarchy(records: &[SurveyRecord]) -> TreeNode {
    let answered = |dimension: Dimension, answer: &str| {
        records
            .iter()
            .filter(|r| dimension.value_of(r) == Some(answer))
            .count()
    };
    let sought = count_matching(records, &Predicate::SoughtTreatment);

    TreeNode::branch(
        "Mental Health",
        vec![
            TreeNode::outcomes(
                "Diagnosis",
                &[
                    ("With Diagnosis", answered(Dimension::Diagnosis, "Yes")),
                    ("Without Diagnosis", answered(Dimension::Diagnosis, "No")),
                    ("Unsure", answered(Dimension::Diagnosis, "Maybe")),
                ],
            ),
            TreeNode::outcomes(
                "Treatment",
                &[
                    ("Sought Treatment", sought),
                    ("Did Not Seek Treatment", records.len() - sought),
                ],
            ),
            TreeNode::outcomes(
                "Workplace",
                &[
                    (
                        "Supportive Employer",
                        answered(Dimension::ResponsibleEmployer, "Yes"),
                    ),
                    (
                        "Unsupportive Employer",
                        answered(Dimension::ResponsibleEmployer, "No"),
                    ),
                    (
                        "Somewhat Supportive",
                        answered(Dimension::ResponsibleEmployer, "Maybe"),
                    ),
                ],
            ),
        ],
    )
}

/// Headline numbers shown above the charts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_respondents: usize,
    pub sought_treatment_percentage: f64,
    pub family_history_percentage: f64,
    pub countries: usize,
}

pub fn summarize(records: &[SurveyRecord]) -> Summary {
    let family_answers = records.iter().filter(|r| r.family_history.is_some()).count();
    let family_yes = count_matching(records, &Predicate::FamilyHistory);
    let countries = records
        .iter()
        .filter_map(|r| Dimension::Location.value_of(r))
        .collect::<BTreeSet<_>>()
        .len();

    Summary {
        total_respondents: records.len(),
        sought_treatment_percentage: rate(records, &Predicate::SoughtTreatment),
        family_history_percentage: ratio(family_yes, family_answers),
        countries,
    }
}

/// `part / whole × 100`, with an empty whole giving 0 instead of NaN.
pub fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Whole-number percentage label, e.g. `"42%"`.
pub fn format_percentage(value: f64) -> String {
    format!("{}%", value.round() as i64)
}

pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

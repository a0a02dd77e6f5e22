use crate::error::{DashboardError, Result};
use crate::record::{AgeGroup, CompanySize, FamilyHistory, Gender, NewSurveyRecord};
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

lazy_static! {
    static ref YEAR: Regex = Regex::new(r"\b(\d{4})\b").unwrap();
}

/// One row of the survey export, exactly as it appears in the file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRow {
    #[serde(rename = "Family History of Mental Illness")]
    family_history: Option<String>,
    #[serde(rename = "Company Size")]
    company_size: Option<String>,
    year: Option<String>,
    #[serde(rename = "Age")]
    age: Option<String>,
    #[serde(rename = "Age-Group")]
    age_group: Option<String>,
    #[serde(rename = "Gender")]
    gender: Option<String>,
    #[serde(rename = "Sought Treatment")]
    sought_treatment: Option<String>,
    #[serde(rename = "Prefer Anonymity")]
    prefer_anonymity: Option<String>,
    #[serde(rename = "Rate Reaction to Problems")]
    rate_reaction_to_problems: Option<String>,
    #[serde(rename = "Negative Consequences")]
    negative_consequences: Option<String>,
    #[serde(rename = "Location")]
    location: Option<String>,
    #[serde(rename = "Access to information")]
    access_to_information: Option<String>,
    #[serde(rename = "Insurance")]
    insurance: Option<String>,
    #[serde(rename = "Diagnosis")]
    diagnosis: Option<String>,
    #[serde(rename = "Discuss Mental Health Problems")]
    discuss_mental_health_problems: Option<String>,
    #[serde(rename = "Responsible Employer")]
    responsible_employer: Option<String>,
    #[serde(rename = "Disorder")]
    disorder: Option<String>,
    #[serde(rename = "Primarily a Tech Employer")]
    primarily_tech_employer: Option<String>,
}

/// Parse a survey export into records ready for the store.
///
/// Columns are matched by header name, so their order does not matter and
/// missing columns simply leave the field empty. Flag columns are set only
/// when the cell holds `1`. A categorical value outside its domain is dropped
/// with a warning instead of failing the whole upload.
///
/// # Arguments
/// * `reader` - Any source of CSV text with a header row
///
/// # Returns
/// * `Result<Vec<NewSurveyRecord>>` - The parsed rows, or `EmptyUpload` when
///   the file has no data rows
///
/// # Examples
/// ```
/// use survey_dashboard::ingest::from_reader;
///
/// let csv = "Gender,Sought Treatment,Location\nFemale,1,USA\n";
/// let rows = from_reader(csv.as_bytes()).unwrap();
/// assert!(rows[0].sought_treatment);
/// ```
pub fn from_reader<R: Read>(reader: R) -> Result<Vec<NewSurveyRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::new();
    for (index, row) in csv_reader.deserialize::<RawRow>().enumerate() {
        // header is line 1
        records.push(convert(row?, index + 2));
    }

    if records.is_empty() {
        return Err(DashboardError::EmptyUpload);
    }
    debug!("parsed {} survey rows", records.len());
    Ok(records)
}

/// Load a survey export from disk.
pub fn from_path(path: impl AsRef<Path>) -> Result<Vec<NewSurveyRecord>> {
    let file = File::open(path)?;
    from_reader(file)
}

fn convert(row: RawRow, line: usize) -> NewSurveyRecord {
    let age = row.age.as_deref().and_then(parse_age);
    let age_group = categorical(row.age_group, "Age-Group", line, AgeGroup::parse)
        .or_else(|| age.and_then(AgeGroup::from_age));

    NewSurveyRecord {
        family_history: categorical(
            row.family_history,
            "Family History of Mental Illness",
            line,
            FamilyHistory::parse,
        ),
        company_size: categorical(row.company_size, "Company Size", line, CompanySize::parse),
        year: row.year.as_deref().and_then(normalize_year),
        age,
        age_group,
        gender: categorical(row.gender, "Gender", line, Gender::parse),
        sought_treatment: flag(&row.sought_treatment),
        prefer_anonymity: flag(&row.prefer_anonymity),
        rate_reaction_to_problems: text(row.rate_reaction_to_problems),
        negative_consequences: text(row.negative_consequences),
        location: text(row.location),
        access_to_information: flag(&row.access_to_information),
        insurance: flag(&row.insurance),
        diagnosis: text(row.diagnosis),
        discuss_mental_health_problems: text(row.discuss_mental_health_problems),
        responsible_employer: text(row.responsible_employer),
        disorder: flag(&row.disorder),
        primarily_tech_employer: flag(&row.primarily_tech_employer),
    }
}

fn text(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn categorical<T>(
    value: Option<String>,
    column: &str,
    line: usize,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let value = text(value)?;
    let parsed = parse(&value);
    if parsed.is_none() {
        warn!("line {}: ignoring unknown {} value {:?}", line, column, value);
    }
    parsed
}

fn flag(value: &Option<String>) -> bool {
    matches!(value.as_deref().map(str::parse::<f64>), Some(Ok(v)) if v == 1.0)
}

fn parse_age(value: &str) -> Option<i32> {
    let age = value.parse::<f64>().ok()?;
    age.is_finite().then_some(age.trunc() as i32)
}

/// Years sometimes arrive as spreadsheet numbers ("2016.0"); keep the
/// four-digit year when there is one.
fn normalize_year(value: &str) -> Option<String> {
    if value.is_empty() {
        return None;
    }
    match YEAR.captures(value) {
        Some(caps) => Some(caps[1].to_string()),
        None => Some(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "Family History of Mental Illness,Company Size,year,Age,Age-Group,Gender,Sought Treatment,Prefer Anonymity,Rate Reaction to Problems,Negative Consequences,Location,Access to information,Insurance,Diagnosis,Discuss Mental Health Problems,Responsible Employer,Disorder,Primarily a Tech Employer";

    #[test]
    fn parses_a_full_row() {
        let csv = format!(
            "{}\nYes,26-100,2016,34,31-40,Female,1,0,Positive,No,United Kingdom,1,0,Yes,Maybe,No,1,1\n",
            HEADER
        );
        let rows = from_reader(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.family_history, Some(FamilyHistory::Yes));
        assert_eq!(row.company_size, Some(CompanySize::UpTo100));
        assert_eq!(row.year.as_deref(), Some("2016"));
        assert_eq!(row.age, Some(34));
        assert_eq!(row.age_group, Some(AgeGroup::Thirties));
        assert_eq!(row.gender, Some(Gender::Female));
        assert!(row.sought_treatment);
        assert!(!row.prefer_anonymity);
        assert_eq!(row.location.as_deref(), Some("United Kingdom"));
        assert!(row.access_to_information && !row.insurance);
        assert_eq!(row.discuss_mental_health_problems.as_deref(), Some("Maybe"));
        assert!(row.disorder && row.primarily_tech_employer);
    }

    #[test]
    fn missing_columns_become_empty() {
        let rows = from_reader("Gender,Location\nMale,India\n".as_bytes()).unwrap();
        assert_eq!(rows[0].gender, Some(Gender::Male));
        assert_eq!(rows[0].company_size, None);
        assert!(!rows[0].sought_treatment);
    }

    #[test]
    fn flags_require_one() {
        let csv = "Sought Treatment,Insurance,Disorder,Prefer Anonymity\n1.0,yes,2,\n";
        let rows = from_reader(csv.as_bytes()).unwrap();
        assert!(rows[0].sought_treatment);
        assert!(!rows[0].insurance);
        assert!(!rows[0].disorder);
        assert!(!rows[0].prefer_anonymity);
    }

    #[test]
    fn unknown_categories_are_dropped() {
        let csv = "Gender,Company Size,Age-Group\nOther,huge,1-2\n";
        let rows = from_reader(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].gender, None);
        assert_eq!(rows[0].company_size, None);
        assert_eq!(rows[0].age_group, None);
    }

    #[test]
    fn age_group_falls_back_to_age() {
        let rows = from_reader("Age,year\n27.0,2016.0\n".as_bytes()).unwrap();
        assert_eq!(rows[0].age, Some(27));
        assert_eq!(rows[0].age_group, Some(AgeGroup::Twenties));
        assert_eq!(rows[0].year.as_deref(), Some("2016"));
    }

    #[test]
    fn header_only_is_rejected() {
        let err = from_reader(format!("{}\n", HEADER).as_bytes()).unwrap_err();
        assert!(matches!(err, DashboardError::EmptyUpload));
        assert!(matches!(from_reader("".as_bytes()), Err(DashboardError::EmptyUpload)));
    }

    #[test]
    fn reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Gender,Location").unwrap();
        writeln!(file, "Female,Canada").unwrap();
        writeln!(file, "Undecided,").unwrap();
        let rows = from_path(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].gender, Some(Gender::Undecided));
        assert_eq!(rows[1].location, None);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = from_path("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, DashboardError::Io(_)));
    }
}

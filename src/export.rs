use crate::error::Result;
use crate::record::SurveyRecord;

/// Suggested download name for the CSV export.
pub const CSV_FILE_NAME: &str = "mental_health_tech_data.csv";
pub const XLSX_FILE_NAME: &str = "mental_health_tech_data.xlsx";

/// Column keys of an exported record, in field order.
pub const COLUMNS: [&str; 19] = [
    "id",
    "familyHistory",
    "companySize",
    "year",
    "age",
    "ageGroup",
    "gender",
    "soughtTreatment",
    "preferAnonymity",
    "rateReactionToProblems",
    "negativeConsequences",
    "location",
    "accessToInformation",
    "insurance",
    "diagnosis",
    "discussMentalHealthProblems",
    "responsibleEmployer",
    "disorder",
    "primarilyTechEmployer",
];

#[derive(Clone, Debug, PartialEq)]
enum Value {
    Text(String),
    Number(f64),
    Flag(bool),
    Empty,
}

impl Value {
    fn text(value: Option<&str>) -> Self {
        value.map_or(Value::Empty, |v| Value::Text(v.to_string()))
    }

    fn render(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Flag(b) => b.to_string(),
            Value::Empty => String::new(),
        }
    }
}

fn row_values(record: &SurveyRecord) -> [Value; 19] {
    [
        Value::Number(record.id as f64),
        Value::text(record.family_history.map(|v| v.as_str())),
        Value::text(record.company_size.map(|v| v.as_str())),
        Value::text(record.year.as_deref()),
        record.age.map_or(Value::Empty, |a| Value::Number(a as f64)),
        Value::text(record.age_group.map(|v| v.as_str())),
        Value::text(record.gender.map(|v| v.as_str())),
        Value::Flag(record.sought_treatment),
        Value::Flag(record.prefer_anonymity),
        Value::text(record.rate_reaction_to_problems.as_deref()),
        Value::text(record.negative_consequences.as_deref()),
        Value::text(record.location.as_deref()),
        Value::Flag(record.access_to_information),
        Value::Flag(record.insurance),
        Value::text(record.diagnosis.as_deref()),
        Value::text(record.discuss_mental_health_problems.as_deref()),
        Value::text(record.responsible_employer.as_deref()),
        Value::Flag(record.disorder),
        Value::Flag(record.primarily_tech_employer),
    ]
}

/// Write the whole collection as CSV
///
/// The header row holds the camelCase field names. Missing answers are left
/// blank and text containing delimiters or quotes is quoted, with embedded
/// quotes doubled.
///
/// # Arguments
/// * `records` - The records to export, in the order given
///
/// # Returns
/// * `Result<String>` - CSV content
pub fn to_csv(records: &[SurveyRecord]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());

    writer.write_record(COLUMNS)?;
    for record in records {
        writer.write_record(row_values(record).iter().map(Value::render))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| std::io::Error::other(e.to_string()).into())
}

/// Write the whole collection as an Excel workbook
///
/// One worksheet, bold header row, numbers and booleans kept as native cell
/// types.
///
/// # Arguments
/// * `records` - The records to export
///
/// # Returns
/// * `Result<Vec<u8>>` - XLSX file content
#[cfg(feature = "web")]
pub fn to_xlsx(records: &[SurveyRecord]) -> Result<Vec<u8>> {
    use crate::error::DashboardError;
    use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

    fn write(records: &[SurveyRecord]) -> std::result::Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let mut worksheet = Worksheet::new();
        worksheet.set_name("Survey Data")?;
        let bold = Format::new().set_bold();

        for (col, name) in COLUMNS.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *name, &bold)?;
        }

        for (r, record) in records.iter().enumerate() {
            let row = (r + 1) as u32;
            for (c, value) in row_values(record).iter().enumerate() {
                let col = c as u16;
                match value {
                    Value::Text(s) => {
                        worksheet.write_string(row, col, s.as_str())?;
                    }
                    Value::Number(n) => {
                        worksheet.write_number(row, col, *n)?;
                    }
                    Value::Flag(b) => {
                        worksheet.write_boolean(row, col, *b)?;
                    }
                    Value::Empty => {}
                }
            }
        }

        workbook.push_worksheet(worksheet);
        workbook.save_to_buffer()
    }

    write(records).map_err(|e| DashboardError::Xlsx(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Gender, NewSurveyRecord};
    use crate::store::SurveyStore;

    fn store() -> SurveyStore {
        SurveyStore::with_records(vec![
            NewSurveyRecord {
                gender: Some(Gender::Female),
                age: Some(29),
                sought_treatment: true,
                location: Some("Bosnia, Herzegovina".into()),
                rate_reaction_to_problems: Some("said \"fine\"".into()),
                ..Default::default()
            },
            NewSurveyRecord::default(),
        ])
    }

    #[test]
    fn csv_has_header_and_one_line_per_record() {
        let csv = to_csv(store().all()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], COLUMNS.join(","));
        assert!(lines[2].starts_with("2,,,,,,,false"));
    }

    #[test]
    fn csv_quotes_text_with_delimiters() {
        let csv = to_csv(store().all()).unwrap();
        assert!(csv.contains("\"Bosnia, Herzegovina\""));
        assert!(csv.contains("\"said \"\"fine\"\"\""));
    }

    #[test]
    fn csv_reads_back_with_the_csv_crate() {
        let csv = to_csv(store().all()).unwrap();
        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let first = reader.records().next().unwrap().unwrap();
        assert_eq!(&first[0], "1");
        assert_eq!(&first[4], "29");
        assert_eq!(&first[6], "Female");
        assert_eq!(&first[7], "true");
        assert_eq!(&first[11], "Bosnia, Herzegovina");
    }

    #[test]
    fn empty_collection_exports_header_only() {
        let csv = to_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[cfg(feature = "web")]
    #[test]
    fn xlsx_is_a_zip_archive() {
        let bytes = to_xlsx(store().all()).unwrap();
        assert!(bytes.len() > 100);
        assert_eq!(&bytes[..2], b"PK");
    }
}

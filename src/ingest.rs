use std::path::Path;

use csv::{ReaderBuilder, Trim};
use tracing::{debug, info};

use crate::config::{AnalysisConfig, CategorySelection};
use crate::error::SchemaError;
use crate::models::{
    Attribute, AttributeKind, AttributeValue, SurveyResponse, ITEM_COUNT, MAX_ATTRIBUTES,
};

const ITEM_PREFIXES: [&str; 4] = ["Q", "SUS", "Item", "Question"];
const ID_HEADERS: [&str; 5] = ["id", "sujet", "respondent", "participant", "subject"];

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeColumn {
    pub name: String,
    pub kind: AttributeKind,
}

/// Parsed and validated survey table.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub responses: Vec<SurveyResponse>,
    pub item_columns: Vec<String>,
    pub id_column: Option<String>,
    pub attributes: Vec<AttributeColumn>,
}

impl Dataset {
    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes.iter().map(|column| column.name.clone()).collect()
    }
}

struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn column(&self, index: usize) -> impl Iterator<Item = &str> {
        self.rows.iter().map(move |row| row[index].as_str())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|header| header.eq_ignore_ascii_case(name))
    }
}

pub fn read_path(path: &Path, config: &AnalysisConfig) -> Result<Dataset, SchemaError> {
    let data = std::fs::read(path)?;
    let dataset = read_bytes(&data, config)?;
    info!(
        path = %path.display(),
        respondents = dataset.responses.len(),
        attributes = dataset.attributes.len(),
        "loaded survey responses"
    );
    Ok(dataset)
}

pub fn read_bytes(data: &[u8], config: &AnalysisConfig) -> Result<Dataset, SchemaError> {
    let table = parse_table(data)?;
    let id_index = id_column(&table, config.id_column.as_deref())?;
    let item_indices = item_columns(&table, id_index)?;
    let attribute_indices = attribute_columns(&table, &config.categories, id_index, &item_indices)?;

    let attributes: Vec<AttributeColumn> = attribute_indices
        .iter()
        .map(|&index| AttributeColumn {
            name: table.headers[index].clone(),
            kind: column_kind(table.column(index)),
        })
        .collect();

    let mut responses = Vec::with_capacity(table.rows.len());
    for (row_index, row) in table.rows.iter().enumerate() {
        let row_number = row_index + 1;
        let id = match id_index {
            Some(index) if !row[index].is_empty() => row[index].clone(),
            _ => row_number.to_string(),
        };

        let items = item_indices
            .iter()
            .map(|&index| parse_item(&row[index], row_number, &table.headers[index]))
            .collect::<Result<Vec<_>, _>>()?;

        let values = attribute_indices
            .iter()
            .zip(&attributes)
            .map(|(&index, column)| {
                Attribute::new(column.name.clone(), attribute_value(&row[index], column.kind))
            })
            .collect();

        responses.push(SurveyResponse::new(id, items, values)?);
    }

    Ok(Dataset {
        responses,
        item_columns: item_indices.iter().map(|&i| table.headers[i].clone()).collect(),
        id_column: id_index.map(|i| table.headers[i].clone()),
        attributes,
    })
}

fn parse_table(data: &[u8]) -> Result<Table, SchemaError> {
    let delimiter = detect_delimiter(data);
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(data);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(String::is_empty) {
        return Err(SchemaError::MissingHeader);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(headers.len(), String::new());
        rows.push(row);
    }
    debug!(
        delimiter = %(delimiter as char),
        columns = headers.len(),
        rows = rows.len(),
        "parsed table"
    );
    Ok(Table { headers, rows })
}

/// Comma unless the header clearly uses semicolons.
fn detect_delimiter(data: &[u8]) -> u8 {
    let header = data.split(|&byte| byte == b'\n').next().unwrap_or_default();
    let commas = header.iter().filter(|&&byte| byte == b',').count();
    let semicolons = header.iter().filter(|&&byte| byte == b';').count();
    if commas + 1 < ITEM_COUNT && semicolons > 0 {
        b';'
    } else {
        b','
    }
}

fn id_column(table: &Table, configured: Option<&str>) -> Result<Option<usize>, SchemaError> {
    match configured {
        Some(name) => table
            .position(name)
            .map(Some)
            .ok_or_else(|| SchemaError::UnknownColumn(name.to_string())),
        None => Ok(ID_HEADERS.iter().find_map(|name| table.position(name))),
    }
}

/// Named item patterns first, then the first ten all-numeric columns.
fn item_columns(table: &Table, id_index: Option<usize>) -> Result<Vec<usize>, SchemaError> {
    for prefix in ITEM_PREFIXES {
        let found: Option<Vec<usize>> = (1..=ITEM_COUNT)
            .map(|n| table.position(&format!("{prefix}{n}")))
            .collect();
        if let Some(indices) = found {
            debug!(prefix, "matched item column pattern");
            return Ok(indices);
        }
    }

    let numeric: Vec<usize> = (0..table.headers.len())
        .filter(|&index| Some(index) != id_index)
        .filter(|&index| column_kind(table.column(index)) == AttributeKind::Numeric)
        .filter(|&index| table.column(index).any(|value| !value.is_empty()))
        .take(ITEM_COUNT)
        .collect();
    if numeric.len() == ITEM_COUNT {
        debug!("using the first ten numeric columns as items");
        return Ok(numeric);
    }

    let missing = (1..=ITEM_COUNT)
        .map(|n| format!("Q{n}"))
        .filter(|name| table.position(name).is_none())
        .collect();
    Err(SchemaError::MissingItemColumns { missing })
}

fn attribute_columns(
    table: &Table,
    selection: &CategorySelection,
    id_index: Option<usize>,
    item_indices: &[usize],
) -> Result<Vec<usize>, SchemaError> {
    let candidates: Vec<usize> = match selection {
        CategorySelection::Trailing => (0..table.headers.len())
            .filter(|index| Some(*index) != id_index && !item_indices.contains(index))
            .collect(),
        CategorySelection::Positions { start, end } => (*start..(*end).min(table.headers.len()))
            .filter(|index| Some(*index) != id_index && !item_indices.contains(index))
            .collect(),
        CategorySelection::Names { columns } => columns
            .iter()
            .map(|name| {
                table
                    .position(name)
                    .ok_or_else(|| SchemaError::UnknownColumn(name.clone()))
            })
            .collect::<Result<_, _>>()?,
    };

    Ok(candidates
        .into_iter()
        .filter(|&index| table.column(index).any(|value| !value.is_empty()))
        .take(MAX_ATTRIBUTES)
        .collect())
}

/// Numeric when every non-empty cell parses as a number.
fn column_kind<'a>(mut values: impl Iterator<Item = &'a str>) -> AttributeKind {
    if values.all(|value| value.is_empty() || parse_number(value).is_some()) {
        AttributeKind::Numeric
    } else {
        AttributeKind::Text
    }
}

pub fn parse_number(value: &str) -> Option<f64> {
    let value = value.trim();
    value
        .parse::<f64>()
        .ok()
        .or_else(|| value.replace(',', ".").parse::<f64>().ok())
        .filter(|number| number.is_finite())
}

fn parse_item(value: &str, row: usize, column: &str) -> Result<Option<i64>, SchemaError> {
    if value.is_empty() {
        return Ok(None);
    }
    parse_number(value)
        .map(|number| Some(number.round() as i64))
        .ok_or_else(|| SchemaError::InvalidItem {
            row,
            column: column.to_string(),
            value: value.to_string(),
        })
}

fn attribute_value(value: &str, kind: AttributeKind) -> Option<AttributeValue> {
    if value.is_empty() {
        return None;
    }
    match kind {
        AttributeKind::Numeric => parse_number(value).map(AttributeValue::Numeric),
        AttributeKind::Text => Some(AttributeValue::Text(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> AnalysisConfig {
        AnalysisConfig::default()
    }

    #[test]
    fn reads_named_columns_and_resolves_attribute_kinds() {
        let csv = "Sujet,Q1,Q2,Q3,Q4,Q5,Q6,Q7,Q8,Q9,Q10,Age,Team\n\
                   s1,5,1,5,1,5,1,5,1,5,1,34,Ops\n\
                   s2,3,3,3,3,3,3,3,3,3,3,,Dev\n";
        let dataset = read_bytes(csv.as_bytes(), &config()).unwrap();
        assert_eq!(dataset.id_column.as_deref(), Some("Sujet"));
        assert_eq!(dataset.item_columns[9], "Q10");
        assert_eq!(
            dataset.attributes,
            vec![
                AttributeColumn { name: "Age".into(), kind: AttributeKind::Numeric },
                AttributeColumn { name: "Team".into(), kind: AttributeKind::Text },
            ]
        );
        let first = &dataset.responses[0];
        assert_eq!(first.id, "s1");
        assert_eq!(first.attribute("Age"), Some(&AttributeValue::Numeric(34.0)));
        assert_eq!(dataset.responses[1].attribute("Age"), None);
    }

    #[test]
    fn falls_back_to_semicolons() {
        let csv = "SUS1;SUS2;SUS3;SUS4;SUS5;SUS6;SUS7;SUS8;SUS9;SUS10;Score\n\
                   4;2;4;2;4;2;4;2;4;2;3,5\n";
        let dataset = read_bytes(csv.as_bytes(), &config()).unwrap();
        assert_eq!(dataset.responses.len(), 1);
        assert_eq!(dataset.responses[0].id, "1");
        assert_eq!(dataset.responses[0].attribute("Score"), Some(&AttributeValue::Numeric(3.5)));
    }

    #[test]
    fn numeric_fallback_uses_first_ten_numeric_columns() {
        let csv = "name,a,b,c,d,e,f,g,h,i,j,k\n\
                   x,1,2,3,4,5,1,2,3,4,5,9\n";
        let dataset = read_bytes(csv.as_bytes(), &config()).unwrap();
        assert_eq!(dataset.item_columns.first().map(String::as_str), Some("a"));
        assert_eq!(dataset.item_columns.last().map(String::as_str), Some("j"));
        let names = dataset.attribute_names();
        assert_eq!(names, vec!["name".to_string(), "k".to_string()]);
    }

    #[test]
    fn reports_missing_item_columns() {
        let csv = "Q1,Q2,Q3,Q4,Q5,Q6,Q7,Q8,Team\n1,2,3,4,5,1,2,3,A\n";
        let err = read_bytes(csv.as_bytes(), &config()).unwrap_err();
        match err {
            SchemaError::MissingItemColumns { missing } => {
                assert_eq!(missing, vec!["Q9".to_string(), "Q10".to_string()])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_non_numeric_item() {
        let csv = "Q1,Q2,Q3,Q4,Q5,Q6,Q7,Q8,Q9,Q10\n1,2,3,4,5,1,2,3,4,5\n1,2,x,4,5,1,2,3,4,5\n";
        let err = read_bytes(csv.as_bytes(), &config()).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::InvalidItem { row: 2, ref column, .. } if column == "Q3"
        ));
    }

    #[test]
    fn empty_item_cell_is_kept_as_missing() {
        let csv = "Q1,Q2,Q3,Q4,Q5,Q6,Q7,Q8,Q9,Q10\n1,2,,4,5,1,2,3,4,5\n";
        let dataset = read_bytes(csv.as_bytes(), &config()).unwrap();
        assert_eq!(dataset.responses[0].items[2], None);
    }

    #[test]
    fn named_selection_requires_existing_columns() {
        let mut config = config();
        config.categories = CategorySelection::Names {
            columns: vec!["Region".into()],
        };
        let csv = "Q1,Q2,Q3,Q4,Q5,Q6,Q7,Q8,Q9,Q10,Team\n1,2,3,4,5,1,2,3,4,5,A\n";
        let err = read_bytes(csv.as_bytes(), &config).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownColumn(ref name) if name == "Region"));
    }

    #[test]
    fn positional_selection_drops_all_empty_columns() {
        let mut config = config();
        config.categories = CategorySelection::Positions { start: 10, end: 14 };
        let csv = "Q1,Q2,Q3,Q4,Q5,Q6,Q7,Q8,Q9,Q10,Age,Blank,Team\n1,2,3,4,5,1,2,3,4,5,30,,A\n";
        let dataset = read_bytes(csv.as_bytes(), &config).unwrap();
        assert_eq!(dataset.attribute_names(), vec!["Age".to_string(), "Team".to_string()]);
    }

    #[test]
    fn positional_selection_skips_item_and_id_columns() {
        let mut config = config();
        config.categories = CategorySelection::Positions { start: 0, end: 5 };
        let csv = "id,Q1,Q2,Q3,Q4,Q5,Q6,Q7,Q8,Q9,Q10,Team\np1,1,2,3,4,5,1,2,3,4,5,A\n";
        let dataset = read_bytes(csv.as_bytes(), &config).unwrap();
        assert!(dataset.attribute_names().is_empty());

        config.categories = CategorySelection::Positions { start: 0, end: 12 };
        let dataset = read_bytes(csv.as_bytes(), &config).unwrap();
        assert_eq!(dataset.attribute_names(), vec!["Team".to_string()]);
    }
}

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

use log::debug;
use polars::prelude::*;

use crate::error::{Result, SurvivalError};

/// cells that load as missing (pandas' default NA strings)
pub const MISSING_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// declared storage type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Text,
}

impl ColumnKind {
    fn of(dtype: &DataType) -> Self {
        match dtype {
            DataType::String => ColumnKind::Text,
            _ => ColumnKind::Numeric,
        }
    }
}

fn null_values() -> NullValues {
    NullValues::AllColumns(MISSING_MARKERS.iter().map(|&m| PlSmallStr::from_static(m)).collect())
}

fn csv_options() -> CsvReadOptions {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .map_parse_options(|options| options.with_null_values(Some(null_values())))
}

/// float column w/ NaN cells turned into nulls
fn nan_to_null(series: &Series) -> Result<Series> {
    let cleaned: Float64Chunked = series
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    Ok(cleaned.with_name(series.name().clone()).into_series())
}

/// text stays text unless it holds nothing; every other dtype becomes Float64
fn normalize(column: &Column) -> Result<Column> {
    let series = column.as_materialized_series();
    match series.dtype() {
        DataType::String if series.null_count() < series.len() => Ok(column.clone()),
        _ => match series.cast(&DataType::Float64) {
            Ok(cast) => Ok(Column::from(nan_to_null(&cast)?)),
            Err(_) => Ok(Column::from(series.cast(&DataType::String)?)),
        },
    }
}

/// tabular dataset - a polars frame whose columns are either Float64 or String
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
}

impl Dataset {
    /// wrap a frame, casting every non-text column to Float64
    pub fn from_frame(frame: DataFrame) -> Result<Self> {
        let columns = frame
            .get_columns()
            .iter()
            .map(normalize)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { frame: DataFrame::new(columns)? })
    }

    /// load a comma separated file w/ a header row
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SurvivalError::DatasetNotFound {
                path: path.display().to_string(),
            });
        }

        let file = File::open(path)?;
        let dataset = Self::from_csv(csv_options().into_reader_with_file_handle(file).finish())?;
        debug!(
            "loaded {} rows x {} columns from {}",
            dataset.n_rows(),
            dataset.n_columns(),
            path.display()
        );
        Ok(dataset)
    }

    /// parse CSV from any reader; polars infers each column's dtype over every row
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_csv(
            csv_options()
                .into_reader_with_file_handle(Cursor::new(bytes))
                .finish(),
        )
    }

    fn from_csv(parsed: PolarsResult<DataFrame>) -> Result<Self> {
        let frame = match parsed {
            Ok(frame) => frame,
            Err(PolarsError::NoData(_)) => return Err(SurvivalError::EmptyDataset),
            Err(err) => return Err(err.into()),
        };
        if frame.height() == 0 {
            return Err(SurvivalError::EmptyDataset);
        }
        Self::from_frame(frame)
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn n_rows(&self) -> usize {
        self.frame.height()
    }

    pub fn n_columns(&self) -> usize {
        self.frame.width()
    }

    /// a real cohort export has more than `min` columns
    pub fn check_width(&self, min: usize) -> Result<()> {
        if self.n_columns() > min {
            Ok(())
        } else {
            Err(SurvivalError::TooFewColumns { found: self.n_columns(), min })
        }
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.frame.get_column_names().into_iter().map(|n| n.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.frame.get_column_index(name).is_some()
    }

    /// (name, kind) for every column, in file order
    pub fn kinds(&self) -> Vec<(&str, ColumnKind)> {
        self.frame
            .get_columns()
            .iter()
            .map(|c| (c.name().as_str(), ColumnKind::of(c.dtype())))
            .collect()
    }

    pub fn kind(&self, name: &str) -> Option<ColumnKind> {
        self.frame.column(name).ok().map(|c| ColumnKind::of(c.dtype()))
    }

    fn lookup(&self, name: &str) -> Result<&Column> {
        self.frame
            .column(name)
            .map_err(|_| SurvivalError::MissingFeatureColumn { column: name.to_string() })
    }

    /// numeric view of a column; text cells that don't parse become missing
    pub fn numeric(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let cast = self.lookup(name)?.cast(&DataType::Float64)?;
        Ok(cast
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect())
    }

    /// text view of a column; numbers use their shortest round-trip form
    pub fn text(&self, name: &str) -> Result<Vec<Option<String>>> {
        let column = self.lookup(name)?;
        match ColumnKind::of(column.dtype()) {
            ColumnKind::Text => Ok(column
                .as_materialized_series()
                .str()?
                .into_iter()
                .map(|v| v.map(str::to_string))
                .collect()),
            ColumnKind::Numeric => Ok(self
                .numeric(name)?
                .into_iter()
                .map(|v| v.map(|x| x.to_string()))
                .collect()),
        }
    }

    /// distinct observed values, sorted
    pub fn distinct_text(&self, name: &str) -> Result<Vec<String>> {
        let mut levels: Vec<String> = self.text(name)?.into_iter().flatten().collect();
        levels.sort();
        levels.dedup();
        Ok(levels)
    }

    /// new dataset without the named columns
    pub fn drop_columns(&self, names: &[&str]) -> Result<Self> {
        let kept: Vec<&str> = self
            .column_names()
            .into_iter()
            .filter(|c| !names.contains(c))
            .collect();
        Ok(Self { frame: self.frame.select(kept)? })
    }

    /// new dataset w/ a subset of rows, in the given order
    pub fn select_rows(&self, rows: &[usize]) -> Result<Self> {
        if let Some(&bad) = rows.iter().find(|&&i| i >= self.n_rows()) {
            return Err(SurvivalError::invalid_dimensions(format!(
                "row index {} out of bounds for {} rows",
                bad,
                self.n_rows()
            )));
        }

        let idx = IdxCa::from_vec("rows".into(), rows.iter().map(|&i| i as IdxSize).collect());
        Ok(Self { frame: self.frame.take(&idx)? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
id,age,grade,er_status,flag,empty
1,45.5,2,Positive,true,
2,NA,3,Negative,false,
3,61,,Positive,true,NA
";

    #[test]
    fn test_type_inference() {
        let ds = Dataset::from_reader(CSV.as_bytes()).unwrap();
        assert_eq!(ds.n_rows(), 3);
        assert_eq!(ds.n_columns(), 6);

        assert_eq!(ds.kind("age"), Some(ColumnKind::Numeric));
        assert_eq!(ds.kind("grade"), Some(ColumnKind::Numeric));
        assert_eq!(ds.kind("er_status"), Some(ColumnKind::Text));
        assert_eq!(ds.kind("flag"), Some(ColumnKind::Numeric));
        assert_eq!(ds.kind("empty"), Some(ColumnKind::Numeric));
        assert_eq!(ds.kind("nope"), None);

        assert_eq!(ds.numeric("age").unwrap(), vec![Some(45.5), None, Some(61.0)]);
        assert_eq!(ds.numeric("grade").unwrap(), vec![Some(2.0), Some(3.0), None]);
        assert_eq!(ds.numeric("flag").unwrap(), vec![Some(1.0), Some(0.0), Some(1.0)]);
        assert_eq!(ds.numeric("empty").unwrap(), vec![None, None, None]);
    }

    #[test]
    fn test_boolean_with_gaps_is_numeric() {
        let ds = Dataset::from_reader("a,flag\n1,true\n2,\n3,false\n".as_bytes()).unwrap();
        assert_eq!(ds.kind("flag"), Some(ColumnKind::Numeric));
        assert_eq!(ds.numeric("flag").unwrap(), vec![Some(1.0), None, Some(0.0)]);
    }

    #[test]
    fn test_pandas_missing_markers() {
        let csv = "x,label\n1.5,a\n-nan,#NA\n1.#QNAN,#N/A N/A\n-1.#IND,b\nnan,<NA>\n4,None\n";
        let ds = Dataset::from_reader(csv.as_bytes()).unwrap();

        assert_eq!(ds.kind("x"), Some(ColumnKind::Numeric));
        assert_eq!(ds.numeric("x").unwrap(), vec![Some(1.5), None, None, None, None, Some(4.0)]);
        assert_eq!(ds.distinct_text("label").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_nan_cells_become_missing() {
        let x = Column::from(Series::new("x".into(), &[Some(1.0), Some(f64::NAN), None, Some(2.0)]));
        let ds = Dataset::from_frame(DataFrame::new(vec![x]).unwrap()).unwrap();
        assert_eq!(ds.numeric("x").unwrap(), vec![Some(1.0), None, None, Some(2.0)]);
    }

    #[test]
    fn test_empty_dataset() {
        let result = Dataset::from_reader("a,b,c\n".as_bytes());
        assert!(matches!(result, Err(SurvivalError::EmptyDataset)));
        let result = Dataset::from_reader("".as_bytes());
        assert!(matches!(result, Err(SurvivalError::EmptyDataset)));
    }

    #[test]
    fn test_missing_file() {
        let result = Dataset::from_path("/definitely/not/here.csv");
        assert!(matches!(result, Err(SurvivalError::DatasetNotFound { .. })));
    }

    #[test]
    fn test_select_and_drop() {
        let ds = Dataset::from_reader(CSV.as_bytes()).unwrap();
        let subset = ds.select_rows(&[2, 0]).unwrap();
        assert_eq!(subset.n_rows(), 2);
        assert_eq!(
            subset.text("er_status").unwrap(),
            vec![Some("Positive".to_string()), Some("Positive".to_string())]
        );
        assert_eq!(subset.numeric("id").unwrap(), vec![Some(3.0), Some(1.0)]);
        assert!(ds.select_rows(&[3]).is_err());

        let dropped = ds.drop_columns(&["id", "empty"]).unwrap();
        assert_eq!(dropped.column_names(), vec!["age", "grade", "er_status", "flag"]);
        // source untouched
        assert_eq!(ds.n_columns(), 6);
    }

    #[test]
    fn test_text_coercion() {
        let ds = Dataset::from_reader("code,v\n1,2\nx,0.5\n,\n".as_bytes()).unwrap();
        assert_eq!(ds.kind("code"), Some(ColumnKind::Text));
        assert_eq!(ds.numeric("code").unwrap(), vec![Some(1.0), None, None]);
        assert_eq!(
            ds.text("v").unwrap(),
            vec![Some("2".to_string()), Some("0.5".to_string()), None]
        );
    }

    #[test]
    fn test_check_width() {
        let ds = Dataset::from_reader(CSV.as_bytes()).unwrap();
        assert!(ds.check_width(5).is_ok());
        assert!(matches!(
            ds.check_width(6),
            Err(SurvivalError::TooFewColumns { found: 6, min: 6 })
        ));
    }

    #[test]
    fn test_unknown_column() {
        let ds = Dataset::from_reader(CSV.as_bytes()).unwrap();
        assert!(matches!(
            ds.numeric("nope"),
            Err(SurvivalError::MissingFeatureColumn { .. })
        ));
    }
}

//! survival schema resolution
//!
//! METABRIC derivatives name their survival columns differently. The accepted
//! names live in [`SchemaAliases`], checked in priority order, and resolution
//! produces a new [`SurvivalTable`] with both columns coerced to numbers. The
//! loaded [`Dataset`] is never touched.

use log::info;

use crate::dataset::Dataset;
use crate::error::{Result, SurvivalError};

pub const DEFAULT_TIME_ALIASES: &[&str] = &["Overall_Survival", "OS_MONTHS", "survival_time", "OS"];
pub const DEFAULT_EVENT_ALIASES: &[&str] =
    &["Overall_Survival_Status", "OS_EVENT", "event", "Death_Event"];

/// accepted column names for each survival role, highest priority first
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaAliases {
    pub time: Vec<String>,
    pub event: Vec<String>,
}

impl Default for SchemaAliases {
    fn default() -> Self {
        Self {
            time: DEFAULT_TIME_ALIASES.iter().map(|s| s.to_string()).collect(),
            event: DEFAULT_EVENT_ALIASES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SchemaAliases {
    pub fn new(time: Vec<String>, event: Vec<String>) -> Self {
        Self { time, event }
    }

    /// find the time & event columns and coerce both to numeric
    pub fn resolve(&self, dataset: &Dataset) -> Result<SurvivalTable> {
        let time_column = first_present(dataset, &self.time, "time")?;
        let event_column = first_present(dataset, &self.event, "event")?;

        let times = dataset.numeric(&time_column)?;
        let events = dataset.numeric(&event_column)?;
        let features = dataset.drop_columns(&[time_column.as_str(), event_column.as_str()])?;

        info!(
            "survival schema: time=`{}` event=`{}` ({} feature columns)",
            time_column,
            event_column,
            features.n_columns()
        );

        Ok(SurvivalTable {
            time_column,
            event_column,
            times,
            events,
            features,
        })
    }
}

fn first_present(dataset: &Dataset, candidates: &[String], role: &str) -> Result<String> {
    candidates
        .iter()
        .find(|name| dataset.contains(name))
        .cloned()
        .ok_or_else(|| SurvivalError::MissingSurvivalColumn {
            role: role.to_string(),
            candidates: candidates.to_vec(),
        })
}

/// dataset w/ a resolved survival schema
#[derive(Debug, Clone)]
pub struct SurvivalTable {
    pub time_column: String,
    pub event_column: String,
    /// coerced survival times, `None` where missing or unparseable
    pub times: Vec<Option<f64>>,
    /// coerced event indicators, `None` where missing or unparseable
    pub events: Vec<Option<f64>>,
    /// everything except the two survival columns
    pub features: Dataset,
}

impl SurvivalTable {
    pub fn n_rows(&self) -> usize {
        self.times.len()
    }

    /// non-missing event values must all be 0 or 1
    pub fn check_binary_events(&self) -> Result<()> {
        let bad: Vec<f64> = self
            .events
            .iter()
            .flatten()
            .copied()
            .filter(|&e| e != 0.0 && e != 1.0)
            .collect();

        if bad.is_empty() {
            Ok(())
        } else {
            Err(SurvivalError::non_binary_event(bad))
        }
    }

    /// times w/ missing values as NaN
    pub fn times_or_nan(&self) -> Vec<f64> {
        self.times.iter().map(|t| t.unwrap_or(f64::NAN)).collect()
    }

    /// events w/ missing values as NaN
    pub fn events_or_nan(&self) -> Vec<f64> {
        self.events.iter().map(|e| e.unwrap_or(f64::NAN)).collect()
    }

    /// same table restricted to some rows
    pub fn select_rows(&self, rows: &[usize]) -> Result<Self> {
        let features = self.features.select_rows(rows)?;
        Ok(Self {
            time_column: self.time_column.clone(),
            event_column: self.event_column.clone(),
            times: rows.iter().map(|&i| self.times[i]).collect(),
            events: rows.iter().map(|&i| self.events[i]).collect(),
            features,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(csv: &str) -> Dataset {
        Dataset::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_priority_order() {
        let ds = dataset("OS,OS_MONTHS,event,Death_Event,age\n1,10,0,1,50\n2,20,1,0,60\n");
        let table = SchemaAliases::default().resolve(&ds).unwrap();

        assert_eq!(table.time_column, "OS_MONTHS");
        assert_eq!(table.event_column, "event");
        assert_eq!(table.times, vec![Some(10.0), Some(20.0)]);
        // the losing aliases stay behind as features
        assert_eq!(table.features.column_names(), vec!["OS", "Death_Event", "age"]);
    }

    #[test]
    fn test_missing_roles() {
        let ds = dataset("time,event\n1,0\n");
        match SchemaAliases::default().resolve(&ds) {
            Err(SurvivalError::MissingSurvivalColumn { role, candidates }) => {
                assert_eq!(role, "time");
                assert_eq!(candidates.len(), 4);
            }
            other => panic!("expected missing time column, got {:?}", other),
        }

        let ds = dataset("OS,status\n1,0\n");
        assert!(matches!(
            SchemaAliases::default().resolve(&ds),
            Err(SurvivalError::MissingSurvivalColumn { .. })
        ));
    }

    #[test]
    fn test_coercion_is_immutable() {
        let ds = dataset("OS,event,x\n12.5,1,a\nunknown,0,b\n3,dead,c\n");
        let table = SchemaAliases::default().resolve(&ds).unwrap();

        assert_eq!(table.times, vec![Some(12.5), None, Some(3.0)]);
        assert_eq!(table.events, vec![Some(1.0), Some(0.0), None]);
        // text columns in the source stay text
        assert_eq!(ds.kind("OS"), Some(crate::dataset::ColumnKind::Text));
    }

    #[test]
    fn test_binary_event_check() {
        let ds = dataset("OS,event\n1,0\n2,1\n3,\n");
        let table = SchemaAliases::default().resolve(&ds).unwrap();
        assert!(table.check_binary_events().is_ok());

        let ds = dataset("OS,event\n1,0\n2,2\n3,2\n");
        let table = SchemaAliases::default().resolve(&ds).unwrap();
        match table.check_binary_events() {
            Err(SurvivalError::NonBinaryEvent { values }) => assert_eq!(values, vec![2.0]),
            other => panic!("expected non-binary error, got {:?}", other),
        }
    }

    #[test]
    fn test_nan_event_is_missing() {
        for csv in ["OS,event\n5,0\n6,NAN\n7,1\n", "OS,event\n5,0\n6,-nan\n7,1\n"] {
            let table = SchemaAliases::default().resolve(&dataset(csv)).unwrap();
            assert_eq!(table.events, vec![Some(0.0), None, Some(1.0)]);
            assert!(table.check_binary_events().is_ok());
        }
    }

    #[test]
    fn test_custom_aliases() {
        let ds = dataset("months,dead,age\n1,0,40\n");
        let aliases = SchemaAliases::new(vec!["months".into()], vec!["dead".into()]);
        let table = aliases.resolve(&ds).unwrap();
        assert_eq!(table.features.column_names(), vec!["age"]);
    }
}

use serde::{Deserialize, Serialize};

use crate::FundamentalsRow;

/// First calendar year kept in any partition.
pub const DATA_CUT_OFF: i32 = 1985;
/// First calendar year of the validation partition.
pub const TRAIN_CUT_OFF: i32 = 2005;
/// First calendar year of the test partition.
pub const VAL_CUT_OFF: i32 = 2015;

/// Disjoint calendar-year slices of the fundamentals table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Partition {
    Train,
    Validation,
    Test,
}

impl Partition {
    /// Partition a calendar year belongs to. Years before `DATA_CUT_OFF`
    /// belong to none.
    pub fn of_year(calendar_year: i32) -> Option<Partition> {
        match calendar_year {
            y if y < DATA_CUT_OFF => None,
            y if y < TRAIN_CUT_OFF => Some(Partition::Train),
            y if y < VAL_CUT_OFF => Some(Partition::Validation),
            _ => Some(Partition::Test),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Train => "train",
            Partition::Validation => "validation",
            Partition::Test => "test",
        }
    }
}

impl std::str::FromStr for Partition {
    type Err = crate::AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "train" => Ok(Partition::Train),
            "validation" | "val" => Ok(Partition::Validation),
            "test" => Ok(Partition::Test),
            other => Err(crate::AnalysisError::InvalidData(format!(
                "unknown partition '{}'",
                other
            ))),
        }
    }
}

/// Merged fundamentals split into train / validation / test.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub train: Vec<FundamentalsRow>,
    pub validation: Vec<FundamentalsRow>,
    pub test: Vec<FundamentalsRow>,
}

impl Dataset {
    /// Pure filter by `calendar_year`; rows keep their order within a partition.
    pub fn partition(rows: Vec<FundamentalsRow>) -> Self {
        let mut dataset = Dataset::default();
        for row in rows {
            match Partition::of_year(row.calendar_year) {
                Some(Partition::Train) => dataset.train.push(row),
                Some(Partition::Validation) => dataset.validation.push(row),
                Some(Partition::Test) => dataset.test.push(row),
                None => {}
            }
        }
        dataset
    }

    pub fn get(&self, partition: Partition) -> &[FundamentalsRow] {
        match partition {
            Partition::Train => &self.train,
            Partition::Validation => &self.validation,
            Partition::Test => &self.test,
        }
    }

    pub fn len(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

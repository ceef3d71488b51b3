use rowcol_store::{ColumnType, StoreError};
use thiserror::Error;

use crate::summary::Statistic;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("statistic `{statistic}` is not defined for column `{column}`")]
    UndefinedStatistic { column: String, statistic: Statistic },
    #[error("column `{column}` has type {column_type}, a numeric column is required")]
    NotNumeric {
        column: String,
        column_type: ColumnType,
    },
    #[error("computation cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("spill file I/O failed: {0}")]
    Spill(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StatsError>;

use std::time::Duration;

use formula_model::{Size, MAX_GRID_SIZE};
use serde::{Deserialize, Serialize};

use crate::SheetError;

/// Sheet-wide settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    /// Largest addressable grid. Must be non-empty and no larger than [`MAX_GRID_SIZE`].
    pub max_size: Size,
    /// Wall-clock budget of one [`Sheet::recalculate_step`](crate::Sheet::recalculate_step)
    /// call made by hosts that drive recalculation cooperatively.
    pub yield_budget: Duration,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            max_size: MAX_GRID_SIZE,
            yield_budget: Duration::from_millis(100),
        }
    }
}

impl SheetConfig {
    pub(crate) fn validate(&self) -> Result<(), SheetError> {
        let max = self.max_size;
        if max.is_empty() || max.width > MAX_GRID_SIZE.width || max.height > MAX_GRID_SIZE.height
        {
            return Err(SheetError::InvalidMaxSize(max));
        }
        Ok(())
    }
}

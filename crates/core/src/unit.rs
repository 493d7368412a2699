//! Semantic validation layered above the wire-level [`crate::encoding::Encoding`]s:
//! bounds checks, structural laws (non-overlapping cycles), and human-readable
//! formatting. A unit's `validate` is total over the `Value` shape it expects.

use serde::Serialize;

use crate::error::UnitValidationError;
use crate::value::{OperatingStatus, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumberUnit {
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    pub integer: bool,
    pub suffix: String,
}

impl NumberUnit {
    pub fn new(lower_bound: Option<f64>, upper_bound: Option<f64>, integer: bool) -> Self {
        Self {
            lower_bound,
            upper_bound,
            integer,
            suffix: String::new(),
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    fn validate_number(&self, n: f64) -> Result<(), UnitValidationError> {
        // Accept any numeric value provided int(v) == v for integer-flagged units
        // (see SPEC_FULL.md Open Questions).
        if self.integer && n.trunc() != n {
            return Err(UnitValidationError::NotIntegral);
        }
        if let Some(lower) = self.lower_bound {
            if n < lower {
                return Err(UnitValidationError::BelowLowerBound { value: n, lower });
            }
        }
        if let Some(upper) = self.upper_bound {
            if n > upper {
                return Err(UnitValidationError::AboveUpperBound { value: n, upper });
            }
        }
        Ok(())
    }

    fn display(&self, n: f64) -> String {
        if self.integer {
            format!("{}{}", n as i64, self.suffix)
        } else {
            format!("{n}{}", self.suffix)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Unit {
    Number(NumberUnit),
    OperatingStatus,
    SystemTime,
    CycleTimer,
    Array(Box<Unit>),
    /// Hour-as-decimal-hours: a non-negative number whose fractional part is
    /// displayed as minutes, e.g. `323.05` -> `"323:03h"`.
    Hours,
}

impl Unit {
    pub fn number(lower_bound: Option<f64>, upper_bound: Option<f64>, integer: bool) -> Self {
        Unit::Number(NumberUnit::new(lower_bound, upper_bound, integer))
    }

    pub fn array(child: Unit) -> Self {
        Unit::Array(Box::new(child))
    }

    pub fn validate(&self, value: &Value) -> Result<(), UnitValidationError> {
        match self {
            Unit::Number(number) => {
                let n = value.as_number().ok_or(UnitValidationError::TypeMismatch)?;
                number.validate_number(n)
            }
            Unit::Hours => {
                let n = value.as_number().ok_or(UnitValidationError::TypeMismatch)?;
                if n < 0.0 {
                    return Err(UnitValidationError::BelowLowerBound { value: n, lower: 0.0 });
                }
                Ok(())
            }
            Unit::OperatingStatus => match value {
                Value::OperatingStatus(_) => Ok(()),
                _ => Err(UnitValidationError::TypeMismatch),
            },
            Unit::SystemTime => match value {
                Value::SystemTime(_) => Ok(()),
                _ => Err(UnitValidationError::TypeMismatch),
            },
            Unit::CycleTimer => {
                let Value::Timer(intervals) = value else {
                    return Err(UnitValidationError::TypeMismatch);
                };
                validate_cycle_timer(intervals)
            }
            Unit::Array(child) => {
                let items = value.as_array().ok_or(UnitValidationError::NotAnArray)?;
                items.iter().try_for_each(|v| child.validate(v))
            }
        }
    }

    pub fn display_string(&self, value: &Value) -> String {
        match self {
            Unit::Number(number) => number
                .validate_number(value.as_number().unwrap_or_default())
                .map(|_| number.display(value.as_number().unwrap_or_default()))
                .unwrap_or_else(|_| "<invalid>".to_string()),
            Unit::Hours => {
                let hours = value.as_number().unwrap_or_default();
                let minutes = (hours.fract() * 60.0) as i64;
                format!("{:.0}:{minutes:02}h", hours.trunc())
            }
            Unit::OperatingStatus => match value {
                Value::OperatingStatus(OperatingStatus::On) => "An".to_string(),
                Value::OperatingStatus(OperatingStatus::Off) => "Aus".to_string(),
                Value::OperatingStatus(OperatingStatus::Fault) => "Fehler".to_string(),
                _ => "?".to_string(),
            },
            Unit::SystemTime => match value {
                Value::SystemTime(dt) => dt.format("%d.%m.%Y %H:%M:%S").to_string(),
                _ => "?".to_string(),
            },
            Unit::CycleTimer => match value {
                Value::Timer(intervals) => intervals
                    .iter()
                    .map(|i| {
                        format!(
                            "{:02}:{:02}-{:02}:{:02}",
                            i.on.0, i.on.1, i.off.0, i.off.1
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(" "),
                _ => "?".to_string(),
            },
            Unit::Array(child) => match value {
                Value::Array(items) => {
                    let parts: Vec<String> =
                        items.iter().map(|v| child.display_string(v)).collect();
                    format!("[{}]", parts.join(", "))
                }
                _ => "?".to_string(),
            },
        }
    }
}

fn validate_cycle_timer(
    intervals: &[crate::value::CycleInterval],
) -> Result<(), UnitValidationError> {
    if intervals.len() > 4 {
        return Err(UnitValidationError::OverlappingCycles);
    }
    for interval in intervals {
        for &(_, minute) in &[interval.on, interval.off] {
            if minute % 10 != 0 {
                return Err(UnitValidationError::MinuteNotAMultipleOfTen);
            }
        }
        for &point in &[interval.on, interval.off] {
            if point.1 >= 60 || point > (24, 0) {
                return Err(UnitValidationError::OutOfDayRange);
            }
        }
        if interval.on >= interval.off {
            return Err(UnitValidationError::EndBeforeStart);
        }
    }
    for pair in intervals.windows(2) {
        if pair[0].off > pair[1].on {
            return Err(UnitValidationError::OverlappingCycles);
        }
    }
    Ok(())
}

//! Bidirectional conversion between typed [`Value`]s and the fixed-width byte
//! sequences the appliance stores them as.
//!
//! Every variant is a pure, stateless codec: `serialize`/`deserialize` never look at
//! anything but their argument, and `size()` is a total function of the variant alone.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::error::{DecodingError, EncodingError};
use crate::value::{CycleInterval, OperatingStatus, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Encoding {
    UInt { width: u8 },
    Int { width: u8 },
    Float { width: u8, divisor: i64 },
    SystemTime,
    Timer,
    Array { member: Box<Encoding>, count: usize },
    OperatingStatus,
}

impl Encoding {
    pub fn uint(width: u8) -> Self {
        Encoding::UInt { width }
    }

    pub fn int(width: u8) -> Self {
        Encoding::Int { width }
    }

    pub fn float(width: u8, divisor: i64) -> Self {
        Encoding::Float { width, divisor }
    }

    pub fn array(member: Encoding, count: usize) -> Self {
        Encoding::Array {
            member: Box::new(member),
            count,
        }
    }

    /// Number of bytes a value of this encoding occupies on the wire.
    pub fn size(&self) -> usize {
        match self {
            Encoding::UInt { width } | Encoding::Int { width } | Encoding::Float { width, .. } => {
                *width as usize
            }
            Encoding::SystemTime => 8,
            Encoding::Timer => 8,
            Encoding::Array { member, count } => member.size() * count,
            Encoding::OperatingStatus => 1,
        }
    }

    /// Checks that `value` may be serialized by this encoding without rejecting it.
    pub fn validate(&self, value: &Value) -> Result<(), EncodingError> {
        match self {
            Encoding::UInt { width } => {
                let n = value.as_number().ok_or(EncodingError::NotANumber)?;
                if n.trunc() != n {
                    return Err(EncodingError::NotIntegral(n));
                }
                if n < 0.0 {
                    return Err(EncodingError::NegativeValue(n));
                }
                if n > uint_max(*width) {
                    return Err(EncodingError::OutOfRange { value: n, width: *width });
                }
                Ok(())
            }
            Encoding::Int { width } => {
                let n = value.as_number().ok_or(EncodingError::NotANumber)?;
                if n.trunc() != n {
                    return Err(EncodingError::NotIntegral(n));
                }
                if n < int_min(*width) || n > int_max(*width) {
                    return Err(EncodingError::OutOfRange { value: n, width: *width });
                }
                Ok(())
            }
            Encoding::Float { .. } => {
                value.as_number().ok_or(EncodingError::NotANumber)?;
                Ok(())
            }
            Encoding::SystemTime => match value {
                Value::SystemTime(_) => Ok(()),
                _ => Err(EncodingError::NotASystemTime),
            },
            Encoding::Timer => match value {
                Value::Timer(intervals) if intervals.len() > 4 => {
                    Err(EncodingError::TooManyCycles(intervals.len()))
                }
                Value::Timer(_) => Ok(()),
                _ => Err(EncodingError::NotATimer),
            },
            Encoding::Array { member, count } => match value {
                Value::Array(items) => {
                    if items.len() != *count {
                        return Err(EncodingError::ArrayLengthMismatch {
                            expected: *count,
                            actual: items.len(),
                        });
                    }
                    items.iter().try_for_each(|v| member.validate(v))
                }
                _ => Err(EncodingError::ArrayLengthMismatch {
                    expected: *count,
                    actual: 0,
                }),
            },
            Encoding::OperatingStatus => match value {
                Value::OperatingStatus(OperatingStatus::Off | OperatingStatus::On) => Ok(()),
                Value::OperatingStatus(OperatingStatus::Fault) => {
                    Err(EncodingError::InvalidOperatingStatusWrite)
                }
                _ => Err(EncodingError::NotOperatingStatus),
            },
        }
    }

    pub fn serialize(&self, value: &Value) -> Result<Vec<u8>, EncodingError> {
        self.validate(value)?;
        match self {
            Encoding::UInt { width } => {
                let n = value.as_number().unwrap() as u64;
                Ok(n.to_le_bytes()[..*width as usize].to_vec())
            }
            Encoding::Int { width } => {
                let n = value.as_number().unwrap() as i64;
                Ok(n.to_le_bytes()[..*width as usize].to_vec())
            }
            Encoding::Float { width, divisor } => {
                let n = value.as_number().unwrap();
                let scaled = (n * *divisor as f64).round() as i64;
                Ok(scaled.to_le_bytes()[..*width as usize].to_vec())
            }
            Encoding::SystemTime => {
                let Value::SystemTime(dt) = value else {
                    unreachable!("validated above")
                };
                Ok(serialize_system_time(*dt))
            }
            Encoding::Timer => {
                let Value::Timer(intervals) = value else {
                    unreachable!("validated above")
                };
                Ok(serialize_timer(intervals))
            }
            Encoding::Array { member, .. } => {
                let Value::Array(items) = value else {
                    unreachable!("validated above")
                };
                let mut bytes = Vec::with_capacity(self.size());
                for item in items {
                    bytes.extend(member.serialize(item)?);
                }
                Ok(bytes)
            }
            Encoding::OperatingStatus => {
                let Value::OperatingStatus(status) = value else {
                    unreachable!("validated above")
                };
                Ok(vec![match status {
                    OperatingStatus::Off => 0x00,
                    OperatingStatus::On => 0x01,
                    OperatingStatus::Fault => unreachable!("validated above"),
                }])
            }
        }
    }

    pub fn deserialize(&self, data: &[u8]) -> Result<Value, DecodingError> {
        if data.len() != self.size() {
            return Err(DecodingError::WrongLength {
                expected: self.size(),
                actual: data.len(),
            });
        }
        match self {
            Encoding::UInt { width } => {
                let mut buf = [0u8; 8];
                buf[..*width as usize].copy_from_slice(data);
                Ok(Value::Number(u64::from_le_bytes(buf) as f64))
            }
            Encoding::Int { width } => {
                let mut buf = [0u8; 8];
                buf[..*width as usize].copy_from_slice(data);
                // sign-extend from the narrower width
                if *width < 8 && data[*width as usize - 1] & 0x80 != 0 {
                    for b in &mut buf[*width as usize..] {
                        *b = 0xFF;
                    }
                }
                Ok(Value::Number(i64::from_le_bytes(buf) as f64))
            }
            Encoding::Float { width, divisor } => {
                let mut buf = [0u8; 8];
                buf[..*width as usize].copy_from_slice(data);
                if *width < 8 && data[*width as usize - 1] & 0x80 != 0 {
                    for b in &mut buf[*width as usize..] {
                        *b = 0xFF;
                    }
                }
                let raw = i64::from_le_bytes(buf);
                Ok(Value::Number(raw as f64 / *divisor as f64))
            }
            Encoding::SystemTime => deserialize_system_time(data).map(Value::SystemTime),
            Encoding::Timer => deserialize_timer(data).map(Value::Timer),
            Encoding::Array { member, count } => {
                let member_size = member.size();
                let mut items = Vec::with_capacity(*count);
                for chunk in data.chunks_exact(member_size) {
                    items.push(member.deserialize(chunk)?);
                }
                Ok(Value::Array(items))
            }
            Encoding::OperatingStatus => Ok(Value::OperatingStatus(match data[0] {
                0 => OperatingStatus::Off,
                1 => OperatingStatus::On,
                _ => OperatingStatus::Fault,
            })),
        }
    }
}

/// Largest value that fits in `width` unsigned bytes, as `f64` (exact for the
/// widths {1,2,4,8} this crate's encodings actually use).
fn uint_max(width: u8) -> f64 {
    if width >= 8 {
        u64::MAX as f64
    } else {
        ((1u64 << (8 * width as u32)) - 1) as f64
    }
}

fn int_min(width: u8) -> f64 {
    -int_max(width) - 1.0
}

fn int_max(width: u8) -> f64 {
    if width >= 8 {
        i64::MAX as f64
    } else {
        ((1i64 << (8 * width as u32 - 1)) - 1) as f64
    }
}

fn bcd_encode(decimal: u32) -> u8 {
    ((decimal / 10) * 16 + (decimal % 10)) as u8
}

fn bcd_decode(byte: u8) -> u32 {
    ((byte / 16) * 10 + (byte % 16)) as u32
}

fn serialize_system_time(dt: NaiveDateTime) -> Vec<u8> {
    let year = dt.year() as u32;
    let weekday = (dt.weekday().num_days_from_monday() + 1) % 7;
    vec![
        bcd_encode(year / 100),
        bcd_encode(year % 100),
        bcd_encode(dt.month()),
        bcd_encode(dt.day()),
        bcd_encode(weekday),
        bcd_encode(dt.hour()),
        bcd_encode(dt.minute()),
        bcd_encode(dt.second()),
    ]
}

fn deserialize_system_time(data: &[u8]) -> Result<NaiveDateTime, DecodingError> {
    let d: Vec<u32> = data.iter().map(|&b| bcd_decode(b)).collect();
    let year = (d[0] * 100 + d[1]) as i32;
    let date =
        NaiveDate::from_ymd_opt(year, d[2], d[3]).ok_or(DecodingError::TimerOutOfRange)?;
    let time =
        NaiveTime::from_hms_opt(d[5], d[6], d[7]).ok_or(DecodingError::TimerOutOfRange)?;
    Ok(NaiveDateTime::new(date, time))
}

fn serialize_timer(intervals: &[CycleInterval]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(8);
    for interval in intervals {
        bytes.push(pack_day_point(interval.on));
        bytes.push(pack_day_point(interval.off));
    }
    bytes.resize(8, 0xFF);
    bytes
}

fn pack_day_point((hour, minute): (u8, u8)) -> u8 {
    (hour << 3) | (minute / 10)
}

fn unpack_day_point(byte: u8) -> (u8, u8) {
    (byte >> 3, (byte & 0x07) * 10)
}

fn deserialize_timer(data: &[u8]) -> Result<Vec<CycleInterval>, DecodingError> {
    let first_undefined = data.iter().position(|&b| b == 0xFF).unwrap_or(data.len());
    if data[first_undefined..].iter().any(|&b| b != 0xFF) {
        return Err(DecodingError::TimerTrailingData);
    }
    if first_undefined % 2 != 0 {
        return Err(DecodingError::TimerTerminatorMisaligned);
    }
    let points: Vec<(u8, u8)> = data[..first_undefined]
        .iter()
        .map(|&b| unpack_day_point(b))
        .collect();
    if points
        .iter()
        .any(|&(hour, minute)| minute >= 60 || (hour, minute) > (24, 0))
    {
        return Err(DecodingError::TimerOutOfRange);
    }
    Ok(points
        .chunks_exact(2)
        .map(|pair| CycleInterval::new(pair[0], pair[1]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::OperatingStatus;

    #[test]
    fn uint_round_trips() {
        let enc = Encoding::uint(2);
        let value = Value::Number(300.0);
        let bytes = enc.serialize(&value).unwrap();
        assert_eq!(bytes.len(), enc.size());
        assert_eq!(enc.deserialize(&bytes).unwrap(), value);
    }

    #[test]
    fn uint_rejects_negative() {
        let enc = Encoding::uint(1);
        assert_eq!(
            enc.validate(&Value::Number(-1.0)),
            Err(EncodingError::NegativeValue(-1.0))
        );
    }

    #[test]
    fn int_round_trips_negative() {
        let enc = Encoding::int(2);
        let value = Value::Number(-300.0);
        let bytes = enc.serialize(&value).unwrap();
        assert_eq!(enc.deserialize(&bytes).unwrap(), value);
    }

    #[test]
    fn uint_rejects_value_that_does_not_fit_in_width() {
        let enc = Encoding::uint(1);
        assert_eq!(
            enc.validate(&Value::Number(300.0)),
            Err(EncodingError::OutOfRange { value: 300.0, width: 1 })
        );
        assert!(enc.serialize(&Value::Number(300.0)).is_err());
    }

    #[test]
    fn int_rejects_value_outside_signed_range() {
        let enc = Encoding::int(1);
        assert_eq!(
            enc.validate(&Value::Number(200.0)),
            Err(EncodingError::OutOfRange { value: 200.0, width: 1 })
        );
        assert_eq!(
            enc.validate(&Value::Number(-200.0)),
            Err(EncodingError::OutOfRange { value: -200.0, width: 1 })
        );
        assert!(enc.validate(&Value::Number(127.0)).is_ok());
        assert!(enc.validate(&Value::Number(-128.0)).is_ok());
    }

    #[test]
    fn float_scales_by_divisor() {
        let enc = Encoding::float(2, 10);
        let bytes = enc.serialize(&Value::Number(21.5)).unwrap();
        assert_eq!(bytes, vec![0xD7, 0x00]);
        assert_eq!(enc.deserialize(&bytes).unwrap(), Value::Number(21.5));
    }

    #[test]
    fn system_time_round_trip_matches_known_vector() {
        let dt = NaiveDate::from_ymd_opt(2023, 9, 17)
            .unwrap()
            .and_hms_opt(14, 22, 3)
            .unwrap();
        let bytes = Encoding::SystemTime.serialize(&Value::SystemTime(dt)).unwrap();
        assert_eq!(bytes, vec![0x20, 0x23, 0x09, 0x17, 0x00, 0x14, 0x22, 0x03]);
        assert_eq!(
            Encoding::SystemTime.deserialize(&bytes).unwrap(),
            Value::SystemTime(dt)
        );
    }

    #[test]
    fn timer_round_trip_matches_known_vector() {
        let intervals = vec![
            CycleInterval::new((6, 0), (8, 30)),
            CycleInterval::new((17, 0), (22, 0)),
        ];
        let bytes = Encoding::Timer.serialize(&Value::Timer(intervals.clone())).unwrap();
        assert_eq!(
            bytes,
            vec![0x30, 0x43, 0x88, 0xB0, 0xFF, 0xFF, 0xFF, 0xFF]
        );
        assert_eq!(
            Encoding::Timer.deserialize(&bytes).unwrap(),
            Value::Timer(intervals)
        );
    }

    #[test]
    fn timer_rejects_misaligned_terminator() {
        let data = [0x30, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(
            Encoding::Timer.deserialize(&data).unwrap_err(),
            DecodingError::TimerTerminatorMisaligned
        );
    }

    #[test]
    fn timer_rejects_trailing_data_after_terminator() {
        let data = [0xFF, 0xFF, 0x30, 0x43, 0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(
            Encoding::Timer.deserialize(&data).unwrap_err(),
            DecodingError::TimerTrailingData
        );
    }

    #[test]
    fn array_size_is_member_size_times_count() {
        let enc = Encoding::array(Encoding::Timer, 7);
        assert_eq!(enc.size(), 56);
    }

    #[test]
    fn operating_status_reads_fault_for_unknown_byte() {
        assert_eq!(
            Encoding::OperatingStatus.deserialize(&[0x42]).unwrap(),
            Value::OperatingStatus(OperatingStatus::Fault)
        );
    }

    #[test]
    fn operating_status_rejects_writing_fault() {
        let err = Encoding::OperatingStatus
            .validate(&Value::OperatingStatus(OperatingStatus::Fault))
            .unwrap_err();
        assert_eq!(err, EncodingError::InvalidOperatingStatusWrite);
    }

    proptest::proptest! {
        #[test]
        fn uint_round_trip_law(n in 0u32..=0xFFFF_FFFFu32) {
            let enc = Encoding::uint(4);
            let value = Value::Number(n as f64);
            let bytes = enc.serialize(&value).unwrap();
            proptest::prop_assert_eq!(bytes.len(), enc.size());
            proptest::prop_assert_eq!(enc.deserialize(&bytes).unwrap(), value);
        }

        #[test]
        fn int_round_trip_law(n in -1_000_000i64..=1_000_000i64) {
            let enc = Encoding::int(4);
            let value = Value::Number(n as f64);
            let bytes = enc.serialize(&value).unwrap();
            proptest::prop_assert_eq!(bytes.len(), enc.size());
            proptest::prop_assert_eq!(enc.deserialize(&bytes).unwrap(), value);
        }

        #[test]
        fn float_round_trip_law(n in -1000i64..=1000i64) {
            let enc = Encoding::float(2, 10);
            let value = Value::Number(n as f64 / 10.0);
            let bytes = enc.serialize(&value).unwrap();
            proptest::prop_assert_eq!(bytes.len(), enc.size());
            proptest::prop_assert_eq!(enc.deserialize(&bytes).unwrap(), value);
        }
    }
}

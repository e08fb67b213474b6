use crate::error::ValidationError;
use crate::quality::OpcQuality;
use crate::sample::SampleValue;
use crate::tag::{DataType, Tag};

/// Runs the ordered composite validation: active → type → enumerated values
/// → range → quality. The first failing check short-circuits the rest, so a
/// bad-quality sample that is also out of range is reported as `OutOfRange`,
/// the more specific cause.
pub fn validate(tag: &Tag, value: &SampleValue, quality: OpcQuality) -> Result<(), ValidationError> {
    if !tag.is_active {
        return Err(ValidationError::InactiveTag);
    }

    if !type_matches(&tag.data_type, value) {
        return Err(ValidationError::TypeMismatch);
    }

    let allowed = tag.allowed_values_list();
    if let Some(allowed) = &allowed {
        let rendered = value.as_rendered_string().to_ascii_lowercase();
        let ok = allowed
            .iter()
            .any(|candidate| candidate.to_ascii_lowercase() == rendered);
        if !ok {
            return Err(ValidationError::NotAllowed);
        }
    } else if tag.has_range() {
        let Some(numeric) = value.as_f64() else {
            return Err(ValidationError::OutOfRange);
        };
        if let Some(min) = tag.min_value {
            if numeric < min {
                return Err(ValidationError::OutOfRange);
            }
        }
        if let Some(max) = tag.max_value {
            if numeric > max {
                return Err(ValidationError::OutOfRange);
            }
        }
    }

    if !quality.is_good() {
        return Err(ValidationError::BadQuality);
    }

    Ok(())
}

fn type_matches(data_type: &DataType, value: &SampleValue) -> bool {
    match data_type {
        DataType::Int16 => matches!(value, SampleValue::Int64(v) if i16::try_from(*v).is_ok()),
        DataType::Int32 => matches!(value, SampleValue::Int64(v) if i32::try_from(*v).is_ok()),
        DataType::Int64 => matches!(value, SampleValue::Int64(_)),
        DataType::UInt16 => matches!(value, SampleValue::UInt64(v) if u16::try_from(*v).is_ok()),
        DataType::UInt32 => matches!(value, SampleValue::UInt64(v) if u32::try_from(*v).is_ok()),
        DataType::UInt64 => matches!(value, SampleValue::UInt64(_)),
        // `SampleValue` doesn't distinguish f32 from f64 at the type level, so
        // Float and Double both accept any floating-point sample.
        DataType::Float => matches!(value, SampleValue::Float64(_)),
        DataType::Double => matches!(value, SampleValue::Float64(_)),
        DataType::Boolean => matches!(value, SampleValue::Bool(_)),
        DataType::String => matches!(value, SampleValue::Text(_)),
        // Unknown logical type: accept unconditionally.
        DataType::Other(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(data_type: DataType) -> Tag {
        Tag {
            id: 1,
            machine_id: 1,
            name: "T".into(),
            node_id: "ns=2;s=T".into(),
            data_type,
            unit: None,
            min_value: None,
            max_value: None,
            allowed_values: None,
            is_active: true,
        }
    }

    #[test]
    fn inactive_tag_short_circuits_everything_else() {
        let mut t = tag(DataType::Float);
        t.is_active = false;
        let err = validate(&t, &SampleValue::Text("nonsense".into()), OpcQuality::from_status_word(0xFFFF_FFFF))
            .unwrap_err();
        assert_eq!(err, ValidationError::InactiveTag);
    }

    #[test]
    fn enumerated_values_skip_range_check() {
        let mut t = tag(DataType::String);
        t.allowed_values = Some(serde_json::to_string(&["Run", "Stop"]).unwrap());
        t.min_value = Some(0.0);
        t.max_value = Some(1.0);

        // "Run" isn't numeric and would fail a range check, but allowed-values wins.
        let ok = validate(&t, &SampleValue::Text("run".into()), OpcQuality::from_status_word(0));
        assert!(ok.is_ok());

        let err = validate(&t, &SampleValue::Text("Fault".into()), OpcQuality::from_status_word(0))
            .unwrap_err();
        assert_eq!(err, ValidationError::NotAllowed);
    }

    #[test]
    fn range_check_is_inclusive() {
        let mut t = tag(DataType::Float);
        t.min_value = Some(0.0);
        t.max_value = Some(100.0);

        assert!(validate(&t, &SampleValue::Float64(0.0), OpcQuality::from_status_word(0)).is_ok());
        assert!(validate(&t, &SampleValue::Float64(100.0), OpcQuality::from_status_word(0)).is_ok());
        assert_eq!(
            validate(&t, &SampleValue::Float64(150.0), OpcQuality::from_status_word(0)).unwrap_err(),
            ValidationError::OutOfRange
        );
    }

    #[test]
    fn bad_quality_is_checked_last() {
        let mut t = tag(DataType::Float);
        t.min_value = Some(0.0);
        t.max_value = Some(100.0);

        // Out of range AND bad quality: the more specific reason wins.
        let err = validate(&t, &SampleValue::Float64(150.0), OpcQuality::from_status_word(0xFFFF_FFFF))
            .unwrap_err();
        assert_eq!(err, ValidationError::OutOfRange);

        // In range but bad quality: falls through to BadQuality.
        let err = validate(&t, &SampleValue::Float64(50.0), OpcQuality::from_status_word(0xFFFF_FFFF))
            .unwrap_err();
        assert_eq!(err, ValidationError::BadQuality);
    }

    #[test]
    fn unknown_logical_type_is_accepted() {
        let t = tag(DataType::Other("Variant".into()));
        assert!(validate(&t, &SampleValue::Text("anything".into()), OpcQuality::from_status_word(0)).is_ok());
    }

    #[test]
    fn type_check_rejects_wrong_runtime_type() {
        let t = tag(DataType::Boolean);
        let err = validate(&t, &SampleValue::Float64(1.0), OpcQuality::from_status_word(0)).unwrap_err();
        assert_eq!(err, ValidationError::TypeMismatch);
    }
}

//! Input validation performed before anything touches the network.

use crate::error::ValidationError;
use crate::types::GenerationRequest;

/// Check raw form input and build a [`GenerationRequest`].
///
/// The grade accepts a leading integer (`" 5"`, `"5th"`, `"5.5"` all read as 5);
/// anything that does not start with a positive integer is rejected. The topic
/// is trimmed and must be non-empty. Grade is checked first.
pub fn validate(
    grade_raw: Option<&str>,
    topic_raw: Option<&str>,
) -> Result<GenerationRequest, ValidationError> {
    let grade = grade_raw
        .and_then(parse_leading_int)
        .filter(|g| *g > 0)
        .and_then(|g| u32::try_from(g).ok())
        .ok_or(ValidationError::MissingGrade)?;

    let topic = topic_raw
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ValidationError::MissingTopic)?;

    Ok(GenerationRequest {
        grade,
        topic: topic.to_string(),
    })
}

/// Read an optional sign followed by leading decimal digits.
fn parse_leading_int(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, rest) = match s.as_bytes().first().copied() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len == 0 {
        return None;
    }
    let value: i64 = rest[..digits_len].parse().ok()?;
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_input_is_trimmed() {
        let req = validate(Some("5"), Some("  Fractions \n")).unwrap();
        assert_eq!(req.grade, 5);
        assert_eq!(req.topic, "Fractions");
    }

    #[test]
    fn test_grade_rejections() {
        for raw in [None, Some(""), Some("   "), Some("abc"), Some("0"), Some("-3"), Some("+0"), Some("-")] {
            assert_eq!(
                validate(raw, Some("Angles")),
                Err(ValidationError::MissingGrade),
                "grade {:?} should be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_grade_leading_integer() {
        assert_eq!(validate(Some(" 4"), Some("t")).unwrap().grade, 4);
        assert_eq!(validate(Some("7th"), Some("t")).unwrap().grade, 7);
        assert_eq!(validate(Some("3.9"), Some("t")).unwrap().grade, 3);
        assert_eq!(validate(Some("+2"), Some("t")).unwrap().grade, 2);
    }

    #[test]
    fn test_grade_out_of_range_rejected() {
        assert_eq!(
            validate(Some("99999999999"), Some("t")),
            Err(ValidationError::MissingGrade)
        );
        assert_eq!(
            validate(Some("999999999999999999999999"), Some("t")),
            Err(ValidationError::MissingGrade)
        );
    }

    #[test]
    fn test_topic_rejections() {
        for raw in [None, Some(""), Some(" \t\n ")] {
            assert_eq!(validate(Some("5"), raw), Err(ValidationError::MissingTopic));
        }
    }

    #[test]
    fn test_grade_checked_before_topic() {
        assert_eq!(validate(Some("0"), Some("")), Err(ValidationError::MissingGrade));
    }
}

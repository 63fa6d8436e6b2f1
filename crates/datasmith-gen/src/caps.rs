//! Value capping against column type parameters.

/// Truncates a string to `length` characters when a length is set.
pub fn cap_string(value: String, length: Option<u32>) -> String {
    match length {
        Some(max) => value.chars().take(max as usize).collect(),
        None => value,
    }
}

/// Largest magnitude a `DECIMAL(precision, scale)` column can hold:
/// `precision - scale` nines before the point, `scale` nines after.
pub fn max_magnitude(precision: u32, scale: u32) -> f64 {
    let whole = precision.saturating_sub(scale);
    let mut text = if whole == 0 {
        "0".to_string()
    } else {
        "9".repeat(whole as usize)
    };
    if scale > 0 {
        text.push('.');
        text.push_str(&"9".repeat(scale as usize));
    }
    text.parse().unwrap_or(f64::MAX)
}

/// Clamps a numeric value into the range a `precision`/`scale` pair allows.
/// Without a precision the value passes through untouched.
pub fn cap_numeric(value: f64, precision: Option<u32>, scale: Option<u32>) -> f64 {
    let Some(precision) = precision else {
        return value;
    };
    let max = max_magnitude(precision, scale.unwrap_or(0));
    value.clamp(-max, max)
}

/// Renders a capped numeric as column text, keeping integers integral.
pub fn format_numeric(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_capping() {
        assert_eq!(cap_string("hello world".into(), Some(5)), "hello");
        assert_eq!(cap_string("hello".into(), None), "hello");
        assert_eq!(cap_string("héllo".into(), Some(2)), "hé");
    }

    #[test]
    fn numeric_capping() {
        assert_eq!(max_magnitude(10, 2), 99999999.99);
        assert_eq!(max_magnitude(3, 0), 999.0);
        assert_eq!(max_magnitude(2, 2), 0.99);

        assert_eq!(cap_numeric(123456.0, Some(3), None), 999.0);
        assert_eq!(cap_numeric(-123456.0, Some(3), None), -999.0);
        assert_eq!(cap_numeric(12.5, Some(4), Some(1)), 12.5);
        assert_eq!(cap_numeric(12.5, None, None), 12.5);
    }

    #[test]
    fn numeric_formatting() {
        assert_eq!(format_numeric(999.0), "999");
        assert_eq!(format_numeric(0.99), "0.99");
    }
}

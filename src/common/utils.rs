//! Utility functions for lockring

/// Parse duration string (e.g., "500ms", "30s", "5m", "1h")
pub fn parse_duration(s: &str) -> crate::Result<std::time::Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(crate::Error::InvalidConfig("empty duration".into()));
    }

    let (num_str, unit) = if s.ends_with("ms") {
        (&s[..s.len() - 2], "ms")
    } else {
        (&s[..s.len() - 1], &s[s.len() - 1..])
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| crate::Error::InvalidConfig(format!("invalid duration: {}", s)))?;

    let duration = match unit {
        "ms" => std::time::Duration::from_millis(num),
        "s" => std::time::Duration::from_secs(num),
        "m" => std::time::Duration::from_secs(num * 60),
        "h" => std::time::Duration::from_secs(num * 3600),
        _ => {
            return Err(crate::Error::InvalidConfig(format!(
                "unknown duration unit: {}",
                unit
            )))
        }
    };

    Ok(duration)
}

/// Validate a lock resource path (non-empty, bounded, printable)
pub fn validate_path(path: &str) -> crate::Result<()> {
    if path.is_empty() {
        return Err(crate::Error::InvalidConfig("path cannot be empty".into()));
    }

    if path.len() > 1024 {
        return Err(crate::Error::InvalidConfig(
            "path too long (max 1024 bytes)".into(),
        ));
    }

    if path.chars().any(|c| c.is_control()) {
        return Err(crate::Error::InvalidConfig(
            "path contains invalid characters".into(),
        ));
    }

    Ok(())
}

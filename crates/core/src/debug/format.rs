//! Formatting helpers for trace output.

use std::collections::HashMap;

use crate::registry::TIMEOUT_OPTION;

const SECRET_MARKERS: &[&str] = &["password", "secret", "token", "key"];

/// Human readable size: "unlimited", "1 byte", "N bytes", "N.N KB" and so on.
pub fn file_size(size: i64) -> String {
    if size < 0 {
        return "unlimited".to_string();
    }
    if size == 1 {
        return "1 byte".to_string();
    }

    const UNITS: [&str; 5] = ["bytes", "KB", "MB", "GB", "TB"];
    let mut divider: i64 = 1;
    for unit in &UNITS[..UNITS.len() - 1] {
        let next = divider * 1024;
        if size < next {
            return scaled(size, divider, unit);
        }
        divider = next;
    }
    scaled(size, divider, UNITS[UNITS.len() - 1])
}

fn scaled(size: i64, divider: i64, unit: &str) -> String {
    // One decimal place, truncated
    let tenths = (size as i128 * 10 / divider as i128) as i64;
    let whole = tenths / 10;
    let decimal = tenths % 10;
    if decimal == 0 {
        format!("{} {}", whole, unit)
    } else {
        format!("{}.{} {}", whole, decimal, unit)
    }
}

/// Milliseconds with thousands separators, e.g. "12,345 ms".
pub fn ms(millis: u128) -> String {
    let digits = millis.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out.push_str(" ms");
    out
}

/// Extension column padded to the usual four characters.
pub fn ext_column(ext: Option<&str>) -> String {
    format!("{:<4} ", ext.unwrap_or("???"))
}

/// Whether an option may appear in logs and diagnostics.
pub fn is_loggable_option(name: &str) -> bool {
    if name == TIMEOUT_OPTION {
        return false;
    }
    let lower = name.to_ascii_lowercase();
    !SECRET_MARKERS.iter().any(|m| lower.contains(m))
}

/// Options without secrets or the timeout pseudo-option.
pub fn loggable_options(options: &HashMap<String, String>) -> HashMap<String, String> {
    options
        .iter()
        .filter(|(name, _)| is_loggable_option(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Sorted `name=value` list of the loggable options.
pub fn options_summary(options: &HashMap<String, String>) -> String {
    let mut pairs: Vec<_> = options
        .iter()
        .filter(|(name, _)| is_loggable_option(name))
        .map(|(name, value)| format!("{}={}", name, value))
        .collect();
    pairs.sort();
    pairs.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_size() {
        assert_eq!(file_size(-1), "unlimited");
        assert_eq!(file_size(0), "0 bytes");
        assert_eq!(file_size(1), "1 byte");
        assert_eq!(file_size(1023), "1023 bytes");
        assert_eq!(file_size(1024), "1 KB");
        assert_eq!(file_size(1536), "1.5 KB");
        assert_eq!(file_size(10 * 1024), "10 KB");
        assert_eq!(file_size(5 * 1024 * 1024 + 512 * 1024), "5.5 MB");
        assert_eq!(file_size(3 * 1024 * 1024 * 1024), "3 GB");
        assert_eq!(file_size(2 * 1024 * 1024 * 1024 * 1024), "2 TB");
    }

    #[test]
    fn test_ms() {
        assert_eq!(ms(0), "0 ms");
        assert_eq!(ms(999), "999 ms");
        assert_eq!(ms(1000), "1,000 ms");
        assert_eq!(ms(1234567), "1,234,567 ms");
    }

    #[test]
    fn test_secrets_and_timeout_not_logged() {
        let mut options = HashMap::new();
        options.insert("width".to_string(), "100".to_string());
        options.insert("timeout".to_string(), "2000".to_string());
        options.insert("apiKey".to_string(), "abc".to_string());
        options.insert("userPassword".to_string(), "hunter2".to_string());
        assert_eq!(options_summary(&options), "width=100");
        assert_eq!(loggable_options(&options).len(), 1);
    }

    #[test]
    fn test_ext_column_pads() {
        assert_eq!(ext_column(Some("pdf")), "pdf  ");
        assert_eq!(ext_column(Some("docx")), "docx ");
        assert_eq!(ext_column(None), "???  ");
    }
}

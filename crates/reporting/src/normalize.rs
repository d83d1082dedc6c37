//! Field normalizer: turns locale-formatted currency and count cells into
//! floats.

use campaign_core::config::SchemaConfig;
use campaign_core::types::CellValue;
use campaign_core::{DashboardError, DashboardResult};

/// Parses currency and count cells. Blank or missing cells read as 0.0;
/// anything left over after stripping a known prefix token must parse as a finite
/// number or the cell is a format error.
#[derive(Debug, Clone)]
pub struct FieldNormalizer {
    /// Sorted longest first so `NT$` is stripped before `$`.
    currency_tokens: Vec<String>,
    thousands_separator: String,
}

impl FieldNormalizer {
    pub fn new(currency_tokens: &[String], thousands_separator: &str) -> Self {
        let mut tokens: Vec<String> = currency_tokens
            .iter()
            .filter(|t| !t.is_empty())
            .cloned()
            .collect();
        tokens.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        Self {
            currency_tokens: tokens,
            thousands_separator: thousands_separator.to_string(),
        }
    }

    pub fn from_schema(schema: &SchemaConfig) -> Self {
        Self::new(&schema.currency_tokens, &schema.thousands_separator)
    }

    /// Strip a currency prefix token and thousands separators, then parse.
    pub fn normalize_currency(&self, column: &str, raw: &CellValue) -> DashboardResult<f64> {
        match raw {
            CellValue::Missing => Ok(0.0),
            CellValue::Number(n) => finite(column, *n, raw),
            CellValue::Text(s) => {
                let residual = self.strip_currency_prefix(s.trim());
                self.parse_residual(column, &residual, raw)
            }
        }
    }

    /// Strip thousands separators only, then parse.
    pub fn normalize_count(&self, column: &str, raw: &CellValue) -> DashboardResult<f64> {
        match raw {
            CellValue::Missing => Ok(0.0),
            CellValue::Number(n) => finite(column, *n, raw),
            CellValue::Text(s) => self.parse_residual(column, s.trim(), raw),
        }
    }

    /// Remove one currency token at the front, after an optional sign. A
    /// token anywhere else is left in place and fails the parse.
    fn strip_currency_prefix(&self, s: &str) -> String {
        let (sign, body) = match s.strip_prefix(['-', '+']) {
            Some(rest) => (&s[..1], rest.trim_start()),
            None => ("", s),
        };
        let body = self
            .currency_tokens
            .iter()
            .find_map(|t| body.strip_prefix(t.as_str()))
            .unwrap_or(body);
        format!("{sign}{}", body.trim_start())
    }

    fn parse_residual(&self, column: &str, residual: &str, raw: &CellValue) -> DashboardResult<f64> {
        let cleaned = if self.thousands_separator.is_empty() {
            residual.trim().to_string()
        } else {
            residual.replace(self.thousands_separator.as_str(), "")
        };
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            return Ok(0.0);
        }
        match cleaned.parse::<f64>() {
            Ok(n) => finite(column, n, raw),
            Err(_) => Err(DashboardError::format(column, raw.display_value())),
        }
    }
}

impl Default for FieldNormalizer {
    fn default() -> Self {
        Self::from_schema(&SchemaConfig::default())
    }
}

fn finite(column: &str, n: f64, raw: &CellValue) -> DashboardResult<f64> {
    if n.is_finite() {
        Ok(n)
    } else {
        Err(DashboardError::format(column, raw.display_value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_currency_examples() {
        let n = FieldNormalizer::default();
        assert!((n.normalize_currency("費用", &text("NT$1,234")).unwrap() - 1234.0).abs() < 1e-9);
        assert!((n.normalize_currency("費用", &text("")).unwrap()).abs() < 1e-9);
        assert!((n.normalize_currency("費用", &CellValue::Number(5.5)).unwrap() - 5.5).abs() < 1e-9);
        assert!((n.normalize_currency("費用", &CellValue::Missing).unwrap()).abs() < 1e-9);
    }

    #[test]
    fn test_currency_strips_tokens_and_whitespace() {
        let n = FieldNormalizer::default();
        assert!((n.normalize_currency("c", &text("  $ 12,000.50 ")).unwrap() - 12000.5).abs() < 1e-9);
        assert!((n.normalize_currency("c", &text("NT$")).unwrap()).abs() < 1e-9);
        assert!((n.normalize_currency("c", &text("-NT$30")).unwrap() + 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_count_handles_numeric_input() {
        let n = FieldNormalizer::default();
        assert!((n.normalize_count("點擊數", &CellValue::Number(0.0)).unwrap()).abs() < 1e-9);
        assert!((n.normalize_count("點擊數", &text("1,024")).unwrap() - 1024.0).abs() < 1e-9);
        assert!((n.normalize_count("點擊數", &text("   ")).unwrap()).abs() < 1e-9);
        assert!((n.normalize_count("點擊數", &text("7")).unwrap() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_count_does_not_strip_currency() {
        let n = FieldNormalizer::default();
        let err = n.normalize_count("轉換", &text("NT$5")).unwrap_err();
        match err {
            DashboardError::Format { column, value } => {
                assert_eq!(column, "轉換");
                assert_eq!(value, "NT$5");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_garbage_is_format_error() {
        let n = FieldNormalizer::default();
        assert!(n.normalize_currency("費用", &text("N/A")).is_err());
        assert!(n.normalize_currency("費用", &text("12abc")).is_err());
        assert!(n.normalize_count("曝光次數", &text("NaN")).is_err());
        assert!(n.normalize_count("曝光次數", &text("inf")).is_err());
        assert!(n.normalize_count("曝光次數", &CellValue::Number(f64::NAN)).is_err());
    }

    #[test]
    fn test_currency_token_only_as_prefix() {
        let n = FieldNormalizer::default();
        assert!(matches!(
            n.normalize_currency("費用", &text("12$34")),
            Err(DashboardError::Format { .. })
        ));
        assert!(n.normalize_currency("費用", &text("100NT$")).is_err());
        assert!(n.normalize_currency("費用", &text("NT$NT$5")).is_err());
        assert!((n.normalize_currency("費用", &text("+ NT$7")).unwrap() - 7.0).abs() < 1e-9);
        assert!((n.normalize_currency("費用", &text("- $1,000")).unwrap() + 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_custom_tokens() {
        let n = FieldNormalizer::new(&["€".to_string()], ".");
        assert!((n.normalize_currency("c", &text("€1.500")).unwrap() - 1500.0).abs() < 1e-9);
    }
}

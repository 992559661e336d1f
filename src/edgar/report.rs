use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use strum::{EnumIter, IntoEnumIterator};

/// Filing form types the pipeline routes on. Anything else is carried
/// through as `Other` and only gets a base filing record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, EnumIter)]
#[serde(into = "String", try_from = "String")]
pub enum FormType {
    Form10K,
    Form10Q,
    Form13FHR,
    Other(String),
}

impl FormType {
    /// Periodic reports get the financial-health and narrative stages.
    pub fn is_periodic_report(&self) -> bool {
        matches!(self, FormType::Form10K | FormType::Form10Q)
    }

    /// Holdings reports get the chunked holdings stage.
    pub fn is_holdings_report(&self) -> bool {
        matches!(self, FormType::Form13FHR)
    }
}

impl TryFrom<String> for FormType {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        FormType::from_str(&s)
    }
}

impl From<FormType> for String {
    fn from(form: FormType) -> String {
        form.to_string()
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormType::Form10K => write!(f, "10-K"),
            FormType::Form10Q => write!(f, "10-Q"),
            FormType::Form13FHR => write!(f, "13F-HR"),
            FormType::Other(s) => write!(f, "{}", s),
        }
    }
}

pub static FORM_TYPES: Lazy<String> = Lazy::new(|| {
    FormType::iter()
        .filter(|t| !matches!(t, FormType::Other(_)))
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
});

impl FormType {
    pub fn list_types() -> &'static str {
        &FORM_TYPES
    }
}

impl FromStr for FormType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<FormType, String> {
        match s.to_uppercase().as_str() {
            "10-K" => Ok(FormType::Form10K),
            "10-Q" => Ok(FormType::Form10Q),
            "13F-HR" => Ok(FormType::Form13FHR),
            _ => Ok(FormType::Other(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_type_round_trip() {
        for raw in ["10-K", "10-Q", "13F-HR"] {
            let form: FormType = raw.parse().unwrap();
            assert_eq!(form.to_string(), raw);
        }
    }

    #[test]
    fn test_unknown_form_is_other() {
        let form: FormType = "8-K".parse().unwrap();
        assert_eq!(form, FormType::Other("8-K".to_string()));
        assert!(!form.is_periodic_report());
        assert!(!form.is_holdings_report());
    }

    #[test]
    fn test_stage_gating() {
        assert!(FormType::Form10K.is_periodic_report());
        assert!(FormType::Form10Q.is_periodic_report());
        assert!(FormType::Form13FHR.is_holdings_report());
        assert!(!FormType::Form13FHR.is_periodic_report());
    }
}

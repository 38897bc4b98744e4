//! Purpose: Scan unit configuration loaded from JSON or built in code.
//! Exports: `ScannerConfig`.
//! Role: Carries the row-key layout, the type-code filter and the NSUI policy into a scan unit.
//! Invariants: Every field has a default; unknown fields are rejected.
#![allow(clippy::result_large_err)]

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};
use crate::core::schema::RowKeyLayout;

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScannerConfig {
    /// Drop rows whose tag ids cannot be resolved instead of failing the scan.
    pub skip_nsui: bool,
    /// Type codes to emit; `None` emits every type.
    pub data_types: Option<BTreeSet<u8>>,
    pub row_key: RowKeyLayout,
}

impl ScannerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        let config: ScannerConfig = serde_json::from_str(json).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("invalid scanner config")
                .with_source(err)
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.row_key.validate()?;
        if let Some(types) = &self.data_types {
            if types.is_empty() {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("data_types must name at least one type code when set"));
            }
        }
        Ok(())
    }

    pub fn with_skip_nsui(mut self, skip: bool) -> Self {
        self.skip_nsui = skip;
        self
    }

    pub fn with_data_types(mut self, types: impl IntoIterator<Item = u8>) -> Self {
        self.data_types = Some(types.into_iter().collect());
        self
    }

    pub fn with_row_key(mut self, layout: RowKeyLayout) -> Self {
        self.row_key = layout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::ScannerConfig;
    use crate::core::error::ErrorKind;
    use std::collections::BTreeSet;

    #[test]
    fn defaults_apply_to_empty_document() {
        let config = ScannerConfig::from_json("{}").expect("parse");
        assert_eq!(config, ScannerConfig::default());
        assert!(!config.skip_nsui);
        assert_eq!(config.row_key.metric_width, 3);
    }

    #[test]
    fn parses_partial_layout() {
        let config = ScannerConfig::from_json(
            r#"{"skip_nsui": true, "data_types": [0, 5], "row_key": {"salt_width": 1}}"#,
        )
        .expect("parse");
        assert!(config.skip_nsui);
        assert_eq!(config.data_types, Some(BTreeSet::from([0, 5])));
        assert_eq!(config.row_key.salt_width, 1);
        assert_eq!(config.row_key.tagv_width, 3);
    }

    #[test]
    fn rejects_unknown_fields_and_bad_widths() {
        let err = ScannerConfig::from_json(r#"{"skip_nsuj": true}"#).expect_err("typo");
        assert_eq!(err.kind(), ErrorKind::Usage);
        let err = ScannerConfig::from_json(r#"{"row_key": {"metric_width": 0}}"#)
            .expect_err("width");
        assert_eq!(err.kind(), ErrorKind::Usage);
        let err = ScannerConfig::from_json(r#"{"data_types": []}"#).expect_err("empty types");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }
}

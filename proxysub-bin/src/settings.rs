use thiserror::Error;
use toml_edit::Item as TomlItem;

#[derive(Debug, Error)]
pub enum ParseSettingsError {
    #[error("Failed to parse TOML: {0}")]
    TomlError(#[from] toml_edit::TomlError),
    #[error(r#""{0}" is required, but is missing"#)]
    MissingInfo(String),
    #[error(r#"invalid value for field "{0}""#)]
    InvalidValue(String),
}

pub type ParseSettingsResult<T> = Result<T, ParseSettingsError>;

/// Defaults read from the settings file. Command line flags take precedence.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Settings {
    pub decode_type: Option<String>,
    pub encode_format: Option<String>,
    pub verbose: bool,
}

fn get_str(doc: &toml_edit::Table, table: &str, key: &str) -> ParseSettingsResult<Option<String>> {
    let Some(section) = doc.get(table) else {
        return Ok(None);
    };
    let section = section
        .as_table_like()
        .ok_or_else(|| ParseSettingsError::InvalidValue(table.into()))?;
    match section.get(key) {
        None | Some(TomlItem::None) => Ok(None),
        Some(item) => item
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| ParseSettingsError::InvalidValue(format!("{table}.{key}"))),
    }
}

pub fn parse_settings(toml: &str) -> ParseSettingsResult<Settings> {
    let doc = toml_edit::ImDocument::parse(toml)?;
    let root = doc.as_table();
    root.get("version")
        .ok_or_else(|| ParseSettingsError::MissingInfo("version".into()))?
        .as_integer()
        .filter(|v| *v == 1)
        .ok_or_else(|| ParseSettingsError::InvalidValue("version".into()))?;

    let verbose = match root.get("log").and_then(|l| l.as_table_like()) {
        Some(log) => match log.get("verbose") {
            None => false,
            Some(v) => v
                .as_bool()
                .ok_or_else(|| ParseSettingsError::InvalidValue("log.verbose".into()))?,
        },
        None => false,
    };

    Ok(Settings {
        decode_type: get_str(root, "decode", "type")?,
        encode_format: get_str(root, "encode", "format")?,
        verbose,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_settings() {
        let toml = r#"
version = 1
unknown = "ignored"

[decode]
type = "clash"

[encode]
format = "json"

[log]
verbose = true
"#;
        assert_eq!(
            parse_settings(toml).unwrap(),
            Settings {
                decode_type: Some("clash".into()),
                encode_format: Some("json".into()),
                verbose: true,
            }
        );
    }
    #[test]
    fn test_parse_settings_minimal() {
        assert_eq!(parse_settings("version = 1").unwrap(), Settings::default());
    }
    #[test]
    fn test_parse_settings_invalid_toml() {
        let err = parse_settings("version = 1\n[decode").unwrap_err();
        assert!(matches!(err, ParseSettingsError::TomlError(_)));
    }
    #[test]
    fn test_parse_settings_missing_info() {
        let err = parse_settings("[decode]\ntype = \"clash\"").unwrap_err();
        match err {
            ParseSettingsError::MissingInfo(m) => assert_eq!(m, "version"),
            e => panic!("unexpected error {e}"),
        }
    }
    #[test]
    fn test_parse_settings_invalid_value() {
        let cases = [
            ("version = 2", "version"),
            ("version = \"1\"", "version"),
            ("version = 1\ndecode = 1", "decode"),
            ("version = 1\n[decode]\ntype = 1", "decode.type"),
            ("version = 1\n[encode]\nformat = true", "encode.format"),
            ("version = 1\n[log]\nverbose = \"yes\"", "log.verbose"),
        ];
        for (toml, invalid) in cases {
            match parse_settings(toml).unwrap_err() {
                ParseSettingsError::InvalidValue(i) => assert_eq!(i, invalid, "{toml}"),
                e => panic!("unexpected error {e} for {toml}"),
            }
        }
    }
}

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};

/// Reads a `.env` file into a map. A missing file is not an error and yields
/// an empty map, the same way dotenv treats it.
pub fn load_dot_env<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>> {
    let path = path.as_ref();
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(?path, "no .env file found");
            return Ok(HashMap::new());
        }
        Err(e) => return Err(Error::io(path, e)),
    };
    parse_dot_env(&contents).map_err(|(line, reason)| Error::DotEnv {
        path: path.to_path_buf(),
        line,
        reason,
    })
}

fn parse_dot_env(contents: &str) -> std::result::Result<HashMap<String, String>, (usize, String)> {
    let mut map = HashMap::new();
    for (i, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, val)) = line.split_once('=') else {
            return Err((i + 1, format!("expected KEY=VALUE, found {line:?}")));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err((i + 1, "empty variable name".to_string()));
        }
        map.insert(key.to_string(), unquote(val.trim()).to_string());
    }
    Ok(map)
}

fn unquote(val: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(rest) = val.strip_prefix(quote) {
            if let Some(end) = rest.find(quote) {
                return &rest[..end];
            }
        }
    }
    // unquoted values may carry a trailing comment
    match val.find(" #") {
        Some(idx) => val[..idx].trim_end(),
        None => val,
    }
}

/// The variable source configuration is read from: process environment
/// layered over the `.env` file.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    process: HashMap<String, String>,
    dot_env: HashMap<String, String>,
}

impl Variables {
    pub fn new(process: HashMap<String, String>, dot_env: HashMap<String, String>) -> Self {
        Self { process, dot_env }
    }

    /// Snapshot of the current process environment plus the given `.env` file.
    pub fn load<P: AsRef<Path>>(dot_env_path: P) -> Result<Self> {
        let dot_env = load_dot_env(dot_env_path)?;
        Ok(Self::new(Self::unicode_only(std::env::vars_os()), dot_env))
    }

    /// Drops variables whose name or value is not valid unicode.
    fn unicode_only<I: IntoIterator<Item = (OsString, OsString)>>(vars: I) -> HashMap<String, String> {
        vars.into_iter()
            .filter_map(|(key, val)| match (key.into_string(), val.into_string()) {
                (Ok(key), Ok(val)) => Some((key, val)),
                (key, _) => {
                    debug!(?key, "skipping non-unicode environment variable");
                    None
                }
            })
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.process
            .get(key)
            .or_else(|| self.dot_env.get(key))
            .map(String::as_str)
    }

    /// Unset variables read as an empty string.
    pub fn get_or_empty(&self, key: &str) -> String {
        self.get(key).unwrap_or_default().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comments_quotes_and_exports() {
        let map = parse_dot_env(
            "# comment\n\nBUCKET_NAME=example-assets\nexport REGION=\"us-east-1\"\nCERT_ARN='arn:aws:acm:x' \nRECORD_NAME=www.example.com # inline\n",
        )
        .unwrap();
        assert_eq!(map["BUCKET_NAME"], "example-assets");
        assert_eq!(map["REGION"], "us-east-1");
        assert_eq!(map["CERT_ARN"], "arn:aws:acm:x");
        assert_eq!(map["RECORD_NAME"], "www.example.com");
    }

    #[test]
    fn reports_line_of_bad_entry() {
        let (line, reason) = parse_dot_env("A=1\nnot a pair\n").unwrap_err();
        assert_eq!(line, 2);
        assert!(reason.contains("KEY=VALUE"));
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let map = load_dot_env(dir.path().join(".env")).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn process_env_wins_over_dot_env() {
        let process = HashMap::from([("REGION".to_string(), "eu-west-1".to_string())]);
        let dot_env = HashMap::from([
            ("REGION".to_string(), "us-east-1".to_string()),
            ("ACCOUNT".to_string(), "123456789012".to_string()),
        ]);
        let vars = Variables::new(process, dot_env);
        assert_eq!(vars.get("REGION"), Some("eu-west-1"));
        assert_eq!(vars.get("ACCOUNT"), Some("123456789012"));
        assert_eq!(vars.get_or_empty("DOMAIN_NAME"), "");
    }

    #[test]
    fn quoted_value_with_trailing_comment() {
        let map = parse_dot_env("BUCKET_NAME=\"example-assets\" # prod\nA=\"x # y\"\nB='single' # note\n").unwrap();
        assert_eq!(map["BUCKET_NAME"], "example-assets");
        assert_eq!(map["A"], "x # y");
        assert_eq!(map["B"], "single");
    }

    #[cfg(unix)]
    #[test]
    fn non_unicode_process_variables_are_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let vars = Variables::unicode_only([
            (OsString::from("REGION"), OsString::from("us-east-1")),
            (OsString::from("GARBAGE"), OsString::from_vec(vec![0xff, 0xfe])),
        ]);
        assert_eq!(vars.len(), 1);
        assert_eq!(vars["REGION"], "us-east-1");
    }
}

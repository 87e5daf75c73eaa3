//! Project configuration for the Vesper compiler.
//!
//! The core reads no environment variables directly and accepts no project-file
//! format opinion of its own: [`ProjectConfig`] is a plain struct the `vesperc`
//! CLI (or any other embedder) populates however it likes and hands to
//! [`crate::process_ast`]'s sibling pipeline entry points. A minimal
//! `key = value` / `key = [ "a", "b" ]` text format is parsed here with a small
//! dedicated `nom` parser, consistent with the rest of this crate's parsing
//! stack rather than pulling in `serde`/`toml` for a handful of scalar fields.

use nom::branch::alt;
use nom::bytes::complete::{escaped_transform, tag, take_while1};
use nom::character::complete::{char, multispace0, none_of};
use nom::combinator::{map, opt, value};
use nom::multi::separated_list0;
use nom::sequence::{delimited, preceded, terminated};
use nom::{IResult, Parser};

/// Whether the emitted stdlib calls should target the native runtime
/// implementation or a compatibility shim (e.g. during a migration).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StdlibMode {
    #[default]
    Native,
    Compat,
}

/// Whether resolved `sl_source` module imports are emitted as separate Rust
/// modules (`multi_file`) or inlined at the head of the current unit
/// (`single_file`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    SingleFile,
    MultiFile,
}

/// Compile-time configuration threaded through every pipeline stage that
/// needs it: the registry's search paths, the security analyzer's denylist,
/// the emitter's output shape, and the top-level capability grant set.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectConfig {
    /// Native-bridge extension search paths, checked in declaration order.
    pub import_paths: Vec<String>,
    /// Vesper-source (`.vsl`) module search paths, checked in declaration order.
    pub sl_module_paths: Vec<String>,
    /// Whether package-relative resolution from the importing file's own
    /// directory is attempted as a final fallback.
    pub allow_current_dir: bool,
    pub stdlib_mode: StdlibMode,
    /// Whether a single `error`-severity security finding aborts compilation.
    pub strict_security: bool,
    pub output_mode: OutputMode,
    pub output_dir: String,
    /// Capability descriptors (`"file.read:/data/**"`) granted to the
    /// top-level context created for a compiled unit.
    pub capabilities: Vec<String>,
    /// Denylisted identifier-name patterns consulted by the security analyzer.
    pub security_denylist: Vec<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            import_paths: Vec::new(),
            sl_module_paths: Vec::new(),
            allow_current_dir: false,
            stdlib_mode: StdlibMode::default(),
            strict_security: true,
            output_mode: OutputMode::default(),
            output_dir: "target/vesper".to_string(),
            capabilities: Vec::new(),
            security_denylist: vec!["__internal".to_string(), "unsafe_".to_string()],
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("malformed configuration at: {snippet}")]
    Malformed { snippet: String },
    #[error("unknown configuration key '{key}'")]
    UnknownKey { key: String },
    #[error("key '{key}' expects {expected}")]
    WrongShape { key: String, expected: &'static str },
}

enum ConfigValue {
    Bool(bool),
    Str(String),
    List(Vec<String>),
}

fn ident(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

fn quoted_string(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        map(
            opt(escaped_transform(none_of("\"\\"), '\\', alt((value("\\", tag("\\")), value("\"", tag("\"")))))),
            |s: Option<String>| s.unwrap_or_default(),
        ),
        char('"'),
    )
    .parse(input)
}

fn bool_value(input: &str) -> IResult<&str, bool> {
    alt((value(true, tag("true")), value(false, tag("false")))).parse(input)
}

fn list_value(input: &str) -> IResult<&str, Vec<String>> {
    delimited(
        terminated(char('['), multispace0),
        separated_list0(delimited(multispace0, char(','), multispace0), quoted_string),
        preceded(multispace0, char(']')),
    )
    .parse(input)
}

fn value_parser(input: &str) -> IResult<&str, ConfigValue> {
    alt((
        map(list_value, ConfigValue::List),
        map(quoted_string, ConfigValue::Str),
        map(bool_value, ConfigValue::Bool),
    ))
    .parse(input)
}

fn key_value_line(input: &str) -> IResult<&str, (&str, ConfigValue)> {
    let (input, key) = preceded(multispace0, ident)(input)?;
    let (input, _) = delimited(multispace0, char('='), multispace0).parse(input)?;
    let (input, value) = value_parser(input)?;
    Ok((input, (key, value)))
}

impl ProjectConfig {
    /// Parses the minimal `key = "value"` / `key = [ "a", "b" ]` text format
    /// into a [`ProjectConfig`], starting from [`ProjectConfig::default`] and
    /// overwriting whichever keys the input sets. Blank lines and lines
    /// starting with `#` are ignored.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let mut config = ProjectConfig::default();

        for raw_line in input.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (remaining, (key, value)) = key_value_line(line).map_err(|_| ConfigError::Malformed { snippet: line.to_string() })?;
            if !remaining.trim().is_empty() {
                return Err(ConfigError::Malformed { snippet: line.to_string() });
            }

            apply_key(&mut config, key, value)?;
        }

        Ok(config)
    }
}

fn apply_key(config: &mut ProjectConfig, key: &str, value: ConfigValue) -> Result<(), ConfigError> {
    match (key, value) {
        ("import_paths", ConfigValue::List(list)) => config.import_paths = list,
        ("sl_module_paths", ConfigValue::List(list)) => config.sl_module_paths = list,
        ("allow_current_dir", ConfigValue::Bool(b)) => config.allow_current_dir = b,
        ("strict_security", ConfigValue::Bool(b)) => config.strict_security = b,
        ("output_dir", ConfigValue::Str(s)) => config.output_dir = s,
        ("capabilities", ConfigValue::List(list)) => config.capabilities = list,
        ("security_denylist", ConfigValue::List(list)) => config.security_denylist = list,
        ("stdlib_mode", ConfigValue::Str(s)) => {
            config.stdlib_mode = match s.as_str() {
                "native" => StdlibMode::Native,
                "compat" => StdlibMode::Compat,
                _ => return Err(ConfigError::WrongShape { key: "stdlib_mode".into(), expected: "\"native\" or \"compat\"" }),
            }
        }
        ("output_mode", ConfigValue::Str(s)) => {
            config.output_mode = match s.as_str() {
                "single_file" => OutputMode::SingleFile,
                "multi_file" => OutputMode::MultiFile,
                _ => return Err(ConfigError::WrongShape { key: "output_mode".into(), expected: "\"single_file\" or \"multi_file\"" }),
            }
        }
        (key, _) if matches!(key, "import_paths" | "sl_module_paths" | "capabilities" | "security_denylist") => {
            return Err(ConfigError::WrongShape { key: key.to_string(), expected: "a string list" })
        }
        (key, _) if matches!(key, "allow_current_dir" | "strict_security") => {
            return Err(ConfigError::WrongShape { key: key.to_string(), expected: "true or false" })
        }
        (key, _) if matches!(key, "stdlib_mode" | "output_mode" | "output_dir") => {
            return Err(ConfigError::WrongShape { key: key.to_string(), expected: "a quoted string" })
        }
        (key, _) => return Err(ConfigError::UnknownKey { key: key.to_string() }),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ProjectConfig::default();
        assert!(config.strict_security);
        assert_eq!(config.stdlib_mode, StdlibMode::Native);
        assert_eq!(config.output_mode, OutputMode::SingleFile);
    }

    #[test]
    fn parses_scalars_and_lists() {
        let text = r#"
            # comment
            allow_current_dir = true
            strict_security = false
            output_dir = "out"
            stdlib_mode = "compat"
            output_mode = "multi_file"
            sl_module_paths = [ "./lib", "./vendor" ]
            capabilities = ["file.read:/data/**"]
        "#;

        let config = ProjectConfig::from_toml_str(text).unwrap();
        assert!(config.allow_current_dir);
        assert!(!config.strict_security);
        assert_eq!(config.output_dir, "out");
        assert_eq!(config.stdlib_mode, StdlibMode::Compat);
        assert_eq!(config.output_mode, OutputMode::MultiFile);
        assert_eq!(config.sl_module_paths, vec!["./lib".to_string(), "./vendor".to_string()]);
        assert_eq!(config.capabilities, vec!["file.read:/data/**".to_string()]);
    }

    #[test]
    fn rejects_unknown_key() {
        assert!(matches!(ProjectConfig::from_toml_str("bogus = true"), Err(ConfigError::UnknownKey { .. })));
    }

    #[test]
    fn rejects_shape_mismatch() {
        assert!(matches!(
            ProjectConfig::from_toml_str("allow_current_dir = \"yes\""),
            Err(ConfigError::Malformed { .. })
        ));
    }
}

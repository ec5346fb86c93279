//! Process configuration, read from env vars.

use std::{env::VarError, path::{Path, PathBuf}, str::FromStr, fmt::Display};

use anyhow::{Result, anyhow, bail, Context};

pub const ERROR_FATAL: &str =
    "<h1>Error</h1><p>An error occurred in the request.</p><p>Please contact the webmaster</p>";

/// Get an env var as a String; decoding failures are reported as
/// errors. If the var is not set and no fallback was given, an error
/// is reported as well.
pub fn getenv_or(name: &str, fallbackvalue: Option<&str>) -> Result<String> {
    match std::env::var(name) {
        Ok(s) => Ok(s),
        Err(e) => match e {
            VarError::NotPresent =>
                match fallbackvalue {
                    Some(v) => Ok(v.to_string()),
                    None => bail!("{name:?} env var is missing and \
                                   no default provided"),
                },
            VarError::NotUnicode(_) => bail!("{name:?} env var is not unicode"),
        }
    }
}

/// Get an env var as a String; decoding failures are reported as
/// errors.
pub fn getenv(name: &str) -> Result<Option<String>> {
    match std::env::var(name) {
        Ok(s) => Ok(Some(s)),
        Err(e) => match e {
            VarError::NotPresent => Ok(None),
            VarError::NotUnicode(_) => bail!("{name:?} env var is not unicode"),
        }
    }
}

/// Like getenv but reports an error mentioning the variable name if
/// it isn't set.
pub fn xgetenv(name: &str) -> Result<String> {
    getenv(name)?.ok_or_else(
        || anyhow!("missing env var {name:?}"))
}

pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None
    }
}

pub fn getenv_bool(name: &str, default: bool) -> Result<bool> {
    match getenv(name)? {
        Some(s) => parse_bool(&s).ok_or_else(
            || anyhow!("{name:?} env var is not a boolean: {s:?}")),
        None => Ok(default)
    }
}

pub fn getenv_parse<T>(name: &str, default: T) -> Result<T>
where T: FromStr,
      T::Err: Display
{
    match getenv(name)? {
        Some(s) => s.trim().parse().map_err(
            |e| anyhow!("{name:?} env var: can't parse {s:?}: {e}")),
        None => Ok(default)
    }
}

/// How page titles are built around the page's own title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleConfig {
    pub prefix: String,
    pub suffix: String,
    pub separator: String,
}

impl Default for TitleConfig {
    fn default() -> Self {
        TitleConfig {
            prefix: String::new(),
            suffix: String::new(),
            separator: " | ".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// The document tree that is served.
    pub public_root: PathBuf,
    pub head_template: PathBuf,
    pub header_template: PathBuf,
    pub footer_template: PathBuf,
    pub error_template: PathBuf,
    /// File name used when a request maps to a directory.
    pub index_file: String,
    /// File name of per-directory middleware (route) files.
    pub route_file: String,
    pub title: TitleConfig,
    pub session: bool,
    pub session_name: String,
    pub session_timeout_secs: u64,
    pub csrf: bool,
    /// Number of hex characters in a CSRF token.
    pub csrf_length: usize,
    /// Query parameter carrying the requested image width.
    pub image_resize_query: String,
    pub error_message_default: Option<String>,
    pub error_fatal: String,
}

impl Config {
    /// Defaults, with the templates `head.html`, `header.html`,
    /// `footer.html` and `error.html` in `modules_dir`.
    pub fn new(public_root: impl Into<PathBuf>, modules_dir: impl AsRef<Path>) -> Self {
        let modules_dir = modules_dir.as_ref();
        Config {
            public_root: public_root.into(),
            head_template: modules_dir.join("head.html"),
            header_template: modules_dir.join("header.html"),
            footer_template: modules_dir.join("footer.html"),
            error_template: modules_dir.join("error.html"),
            index_file: "index.html".into(),
            route_file: "_route".into(),
            title: TitleConfig::default(),
            session: true,
            session_name: "FileRouter".into(),
            session_timeout_secs: 3600,
            csrf: true,
            csrf_length: 64,
            image_resize_query: "res".into(),
            error_message_default: None,
            error_fatal: ERROR_FATAL.into(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let public_root = PathBuf::from(xgetenv("PUBLICDIR")?);
        let modules_dir = match getenv("MODULESDIR")? {
            Some(d) => PathBuf::from(d),
            None => public_root.join("../modules"),
        };
        let mut config = Config::new(public_root, &modules_dir);
        let template = |name: &str, default: PathBuf| -> Result<PathBuf> {
            Ok(getenv(name)?.map(|p| modules_dir.join(p)).unwrap_or(default))
        };
        config.head_template = template("HEAD_TEMPLATE", config.head_template)?;
        config.header_template = template("HEADER_TEMPLATE", config.header_template)?;
        config.footer_template = template("FOOTER_TEMPLATE", config.footer_template)?;
        config.error_template = template("ERROR_TEMPLATE", config.error_template)?;
        config.index_file = getenv_or("INDEX_FILE", Some(&config.index_file))?;
        config.route_file = getenv_or("ROUTE_FILE", Some(&config.route_file))?;
        config.title = TitleConfig {
            prefix: getenv_or("TITLE_PREFIX", Some(""))?,
            suffix: getenv_or("TITLE_SUFFIX", Some(""))?,
            separator: getenv_or("TITLE_SEPARATOR", Some(" | "))?,
        };
        config.session = getenv_bool("SESSION", config.session)?;
        config.session_name = getenv_or("SESSION_NAME", Some(&config.session_name))?;
        config.session_timeout_secs = getenv_parse("SESSION_TIMEOUT", config.session_timeout_secs)?;
        config.csrf = getenv_bool("CSRF", config.csrf)?;
        config.csrf_length = getenv_parse("CSRF_LENGTH", config.csrf_length)?;
        config.image_resize_query = getenv_or("IMAGE_RESIZE_QUERY",
                                              Some(&config.image_resize_query))?;
        config.error_message_default = getenv("ERROR_MESSAGE_DEFAULT")?;
        if let Some(fatal) = getenv("ERROR_FATAL")? {
            config.error_fatal = fatal;
        }
        config.check().context("invalid configuration from env vars")?;
        Ok(config)
    }

    pub fn check(&self) -> Result<()> {
        if ! self.public_root.is_dir() {
            bail!("public root {:?} is not a directory", self.public_root)
        }
        if self.index_file.is_empty() || self.index_file.contains('/') {
            bail!("invalid index file name {:?}", self.index_file)
        }
        if self.route_file.is_empty() || self.route_file.contains('/') {
            bail!("invalid route file name {:?}", self.route_file)
        }
        if self.csrf && self.csrf_length == 0 {
            bail!("CSRF enabled with a token length of 0")
        }
        Ok(())
    }

    /// CSRF tokens need a session to be stored in.
    pub fn csrf_enabled(&self) -> bool {
        self.session && self.csrf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_parse_bool() {
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool(" TRUE "), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool(""), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn t_defaults() {
        let c = Config::new("/srv/public", "/srv/modules");
        assert_eq!(c.head_template, PathBuf::from("/srv/modules/head.html"));
        assert_eq!(c.error_template, PathBuf::from("/srv/modules/error.html"));
        assert_eq!(c.title.separator, " | ");
        assert!(c.csrf_enabled());
        let c = Config { session: false, ..c };
        assert!(! c.csrf_enabled());
    }
}

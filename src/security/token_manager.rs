//! Masking of credentials before they reach a log line
//!
//! Tokens are held as `secrecy::SecretString` everywhere; this module is the
//! only place that exposes them, and only to replace them with a masked form.

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};

/// Masks a token for safe logging
///
/// Shows only the first 3 and last 3 characters for identification purposes.
/// Tokens shorter than 10 characters are fully masked as "****".
///
/// # Examples
///
/// ```
/// use release_publisher::security::mask_token;
///
/// assert_eq!(mask_token("pypi-abcdef123456"), "pyp...456");
/// assert_eq!(mask_token("short"), "****");
/// ```
pub fn mask_token(token: &str) -> String {
    if token.chars().count() < 10 {
        return "****".to_string();
    }

    let prefix: String = token.chars().take(3).collect();
    let suffix: String = token
        .chars()
        .rev()
        .take(3)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{}...{}", prefix, suffix)
}

/// Replaces every registered secret in a string with its masked form
///
/// # Examples
///
/// ```
/// use release_publisher::security::SecretMasker;
/// use secrecy::SecretString;
///
/// let mut masker = SecretMasker::new();
/// masker.register(&SecretString::from("pypi-secret-token-123"));
/// assert_eq!(masker.mask("-p pypi-secret-token-123"), "-p pyp...123");
/// ```
#[derive(Default)]
pub struct SecretMasker {
    patterns: Vec<(Regex, String)>,
}

impl SecretMasker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a secret to be masked; empty secrets are ignored
    pub fn register(&mut self, secret: &SecretString) {
        let value = secret.expose_secret();
        if value.is_empty() {
            return;
        }

        if let Ok(regex) = Regex::new(&regex::escape(value)) {
            self.patterns.push((regex, mask_token(value)));
        }
    }

    pub fn mask(&self, text: &str) -> String {
        self.patterns
            .iter()
            .fold(text.to_string(), |masked, (regex, replacement)| {
                regex
                    .replace_all(&masked, regex::NoExpand(replacement.as_str()))
                    .into_owned()
            })
    }

    /// Join a command into one printable line, masking arguments that are
    /// exactly a registered secret
    ///
    /// Masking whole arguments keeps a short token from mangling unrelated
    /// arguments that happen to contain it, such as `__token__`.
    pub fn mask_command(&self, program: &str, args: &[String]) -> String {
        std::iter::once(program.to_string())
            .chain(args.iter().map(|arg| self.mask_argument(arg)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn mask_argument(&self, arg: &str) -> String {
        self.patterns
            .iter()
            .find(|(regex, _)| {
                regex
                    .find(arg)
                    .is_some_and(|m| m.start() == 0 && m.end() == arg.len())
            })
            .map(|(_, replacement)| replacement.clone())
            .unwrap_or_else(|| arg.to_string())
    }
}

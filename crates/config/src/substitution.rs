//! Environment-variable substitution for configuration files
//!
//! Placeholders of the form `${VAR_NAME}` are replaced before the YAML is
//! parsed. Unset variables leave the placeholder in place so the validation
//! pass can report them instead of silently producing an empty value.

use anyhow::Result;
use regex::Regex;
use std::env;
use tracing::{debug, warn};

/// Replace `${VAR_NAME}` placeholders with environment variable values
pub fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{(\w+)\}")?;
    let mut result = content.to_string();

    for caps in re.captures_iter(content) {
        let var_name = &caps[1];
        let placeholder = &caps[0];

        match env::var(var_name) {
            Ok(value) => {
                debug!(var = var_name, "Substituting environment variable");
                result = result.replace(placeholder, &value);
            }
            Err(_) => {
                warn!(var = var_name, "Environment variable not set");
            }
        }
    }

    Ok(result)
}

/// Check whether any `${VAR_NAME}` placeholders remain unresolved
pub fn has_unresolved_env_vars(content: &str) -> bool {
    Regex::new(r"\$\{(\w+)\}")
        .map(|re| re.is_match(content))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitutes_set_variables() {
        env::set_var("BOOKD_TEST_PORT", "9001");
        let result = substitute_env_vars("port: ${BOOKD_TEST_PORT}").unwrap();
        assert_eq!(result, "port: 9001");
        env::remove_var("BOOKD_TEST_PORT");
    }

    #[test]
    fn test_keeps_unset_placeholders() {
        env::remove_var("BOOKD_TEST_MISSING");
        let result = substitute_env_vars("host: ${BOOKD_TEST_MISSING}").unwrap();
        assert_eq!(result, "host: ${BOOKD_TEST_MISSING}");
        assert!(has_unresolved_env_vars(&result));
    }

    #[test]
    fn test_plain_content_untouched() {
        let content = "port: 8000\nhost: 0.0.0.0";
        assert_eq!(substitute_env_vars(content).unwrap(), content);
        assert!(!has_unresolved_env_vars(content));
    }
}

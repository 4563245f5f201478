use anyhow::Result;
use regex::Regex;
use std::env;
use tracing::{debug, warn};

/// Substitute environment variables in the format ${VAR_NAME} or $VAR_NAME
pub fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{(\w+)\}|\$(\w+)").expect("static regex");
    let mut result = content.to_string();

    for caps in re.captures_iter(content) {
        let var_name = caps.get(1).or(caps.get(2)).expect("one group matches").as_str();
        let placeholder = caps.get(0).expect("full match").as_str();

        match env::var(var_name) {
            Ok(value) => {
                debug!("Substituting environment variable: {}", var_name);
                result = result.replace(placeholder, &value);
            }
            Err(_) => {
                // Keep the placeholder; the validator reports it later
                warn!("Environment variable '{}' not set", var_name);
            }
        }
    }

    Ok(result)
}

/// Check if a string contains unresolved environment variable placeholders
pub fn has_unresolved_env_vars(content: &str) -> bool {
    let re = Regex::new(r"\$\{(\w+)\}|\$(\w+)").expect("static regex");
    re.is_match(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_known_var() {
        std::env::set_var("OPENSWAP_TEST_SUB", "42");
        let out = substitute_env_vars("depth: ${OPENSWAP_TEST_SUB}").unwrap();
        assert_eq!(out, "depth: 42");
    }

    #[test]
    fn test_unknown_var_is_kept() {
        let out = substitute_env_vars("depth: ${OPENSWAP_TEST_MISSING_XYZ}").unwrap();
        assert!(has_unresolved_env_vars(&out));
    }
}

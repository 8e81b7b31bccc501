use std::borrow::Cow;

use anyhow::{Context, Result};
use regex::{Captures, Regex};

const ENV_REFERENCE_PATTERN: &str = r"\$\{([^}:]+)(?::-(.*?))?\}";

/// Interpolate environment variables in a string
/// Supports ${VAR} and ${VAR:-default} syntax
pub fn interpolate_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(ENV_REFERENCE_PATTERN).context("Invalid interpolation pattern")?;
    let mut missing_vars = Vec::new();

    let result = re.replace_all(input, |cap: &Captures<'_>| {
        let var_name = &cap[1];
        match (std::env::var(var_name), cap.get(2)) {
            (Ok(value), _) => Cow::Owned(value),
            (Err(_), Some(default)) => Cow::Owned(default.as_str().to_string()),
            (Err(_), None) => {
                missing_vars.push(var_name.to_string());
                Cow::Owned(cap[0].to_string())
            }
        }
    });

    if !missing_vars.is_empty() {
        anyhow::bail!("Missing required environment variables: {}", missing_vars.join(", "));
    }

    Ok(result.into_owned())
}

/// Interpolate environment variables in YAML content, leaving comment lines alone
pub fn interpolate_yaml_content(yaml_content: &str) -> Result<String> {
    let lines = yaml_content
        .lines()
        .map(|line| if line.trim().starts_with('#') { Ok(line.to_string()) } else { interpolate_env_vars(line) })
        .collect::<Result<Vec<_>>>()?;

    Ok(lines.join("\n"))
}

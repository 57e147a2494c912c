//! System prompt assembly: a template plus the enumerated option table.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const DEFAULT_TEMPLATE: &str = "\
You are a software development agent operating in {working_directory}.
{cli_mode_notice}
{security_policy}
";

/// Options controlling how the system prompt template is rendered.
#[derive(Debug, Clone, Default)]
pub struct SystemPromptOptions {
    pub working_directory: String,
    /// When true, disables browser-oriented instructions in the rendered prompt.
    pub cli_mode: bool,
    /// Path to a security policy file; relative paths resolve against `prompt_dir`.
    pub security_policy_file: Option<PathBuf>,
    pub prompt_dir: Option<PathBuf>,
    /// Appended verbatim after the templated body.
    pub suffix: Option<String>,
}

/// Render the system prompt template. Fails at init with a clear error if a
/// configured security policy file is missing.
pub fn render_system_prompt(options: &SystemPromptOptions) -> Result<String> {
    let cli_mode_notice = if options.cli_mode {
        "Browser-oriented instructions are disabled in CLI mode."
    } else {
        ""
    };

    let security_policy = match &options.security_policy_file {
        Some(path) => {
            let resolved = resolve_policy_path(path, options.prompt_dir.as_deref());
            fs::read_to_string(&resolved).map_err(|e| {
                Error::config(format!("security policy file '{}' could not be read: {e}", resolved.display()))
            })?
        }
        None => String::new(),
    };

    let mut rendered = DEFAULT_TEMPLATE
        .replace("{working_directory}", &options.working_directory)
        .replace("{cli_mode_notice}", cli_mode_notice)
        .replace("{security_policy}", &security_policy);

    if let Some(suffix) = &options.suffix {
        rendered.push('\n');
        rendered.push_str(suffix);
    }

    Ok(rendered)
}

fn resolve_policy_path(path: &Path, prompt_dir: Option<&Path>) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        match prompt_dir {
            Some(dir) => dir.join(path),
            None => path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_working_directory_and_cli_mode_notice() {
        let options = SystemPromptOptions {
            working_directory: "/repo".to_string(),
            cli_mode: true,
            ..Default::default()
        };
        let rendered = render_system_prompt(&options).unwrap();
        assert!(rendered.contains("/repo"));
        assert!(rendered.contains("CLI mode"));
    }

    #[test]
    fn suffix_is_appended_verbatim() {
        let options = SystemPromptOptions { suffix: Some("Always run tests.".into()), ..Default::default() };
        let rendered = render_system_prompt(&options).unwrap();
        assert!(rendered.trim_end().ends_with("Always run tests."));
    }

    #[test]
    fn missing_security_policy_file_fails_clearly() {
        let options = SystemPromptOptions {
            security_policy_file: Some(PathBuf::from("/nonexistent/policy.md")),
            ..Default::default()
        };
        let err = render_system_prompt(&options).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn relative_policy_path_resolves_against_prompt_dir() {
        let dir = std::env::temp_dir().join(format!("policy_test_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let policy_path = dir.join("policy.md");
        fs::write(&policy_path, "no destructive commands").unwrap();

        let options = SystemPromptOptions {
            security_policy_file: Some(PathBuf::from("policy.md")),
            prompt_dir: Some(dir.clone()),
            ..Default::default()
        };
        let rendered = render_system_prompt(&options).unwrap();
        assert!(rendered.contains("no destructive commands"));

        fs::remove_dir_all(&dir).ok();
    }
}

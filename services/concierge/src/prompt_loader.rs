use anyhow::{Context, Result};
use concierge_core::prompt::{DEFAULT_GREETING, DEFAULT_SYSTEM_PROMPT};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const SYSTEM_PROMPT_KEY: &str = "system";
pub const GREETING_KEY: &str = "greeting";

/// Read every `.md` file in `dir_path`, keyed by file stem.
pub fn load_prompts(dir_path: &Path) -> Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();

    for entry in fs::read_dir(dir_path)
        .with_context(|| format!("Failed to read prompts directory: {}", dir_path.display()))?
    {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("md") {
            continue;
        }

        let key = path
            .file_stem()
            .and_then(|s| s.to_str())
            .context("Could not get file stem for prompt file")?
            .to_string();
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read prompt file: {}", path.display()))?;
        prompts.insert(key, content);
    }

    Ok(prompts)
}

/// The texts every call starts from.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompts {
    pub system: String,
    pub greeting: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
        }
    }
}

impl Prompts {
    /// Pick `system` and `greeting` out of a loaded set; blank or missing
    /// files fall back to the built-in texts.
    pub fn from_map(prompts: &HashMap<String, String>) -> Self {
        let pick = |key: &str, fallback: &str| {
            prompts
                .get(key)
                .map(|text| text.trim())
                .filter(|text| !text.is_empty())
                .unwrap_or(fallback)
                .to_string()
        };
        Self {
            system: pick(SYSTEM_PROMPT_KEY, DEFAULT_SYSTEM_PROMPT),
            greeting: pick(GREETING_KEY, DEFAULT_GREETING),
        }
    }

    /// Load from `dir_path`, using the built-in texts when it cannot be read.
    pub fn load_or_default(dir_path: &Path) -> Self {
        match load_prompts(dir_path) {
            Ok(prompts) => {
                tracing::info!("Loaded {} prompts from {}", prompts.len(), dir_path.display());
                Self::from_map(&prompts)
            }
            Err(e) => {
                tracing::warn!("{:#}; using built-in prompts", e);
                Self::default()
            }
        }
    }
}

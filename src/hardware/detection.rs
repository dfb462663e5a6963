//! Model size detection from names and filenames

use crate::matrix::SizeClass;
use once_cell::sync::Lazy;
use regex::Regex;

static MODEL_SIZE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|[^a-z0-9.])(\d+(?:\.\d+)?)([bm])(?:$|[^a-z0-9])").unwrap());

/// Extract a size class such as `7B` or `500M` from a model name.
///
/// Only the final path segment is considered; `Mistral-7B-Instruct`,
/// `qwen2.5-1.5b` and `SmolLM-360M` all resolve, `gpt2` does not.
pub fn detect_size_class(model_name: &str) -> Option<SizeClass> {
    let name = model_name.rsplit('/').next().unwrap_or(model_name);
    let caps = MODEL_SIZE_PATTERN.captures(name)?;
    format!("{}{}", &caps[1], &caps[2]).parse().ok()
}

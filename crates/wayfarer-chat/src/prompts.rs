//! Prompt template engine.
//!
//! Templates are markdown documents in a prompts directory, one per name
//! (`<name>-prompt.md`). The template body is the first fenced block of the
//! document; documents without one have their headings and doc markers
//! stripped instead. All templates are read eagerly when the library is
//! loaded.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};

use regex::{Captures, Regex};

use wayfarer_core::error::{Result, WayfarerError};
use wayfarer_core::types::{Category, ConversationTurn, ExternalDataBag};

/// Every template the pipeline uses.
pub const TEMPLATE_NAMES: [&str; 6] = [
    "system",
    "classification",
    "destination",
    "planning",
    "itinerary",
    "packing",
];

const NONE_AVAILABLE: &str = "None available";

/// Line prefixes of documentation sections that never belong in a prompt.
const DOC_MARKERS: [&str; 5] = ["USAGE", "VARIABLES", "CHAIN", "EXPECTED", "SPECIALIZED"];

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").unwrap());

// =============================================================================
// PromptKind
// =============================================================================

/// Final-generation prompt selected for a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Destination,
    /// The destination template used for `general` requests.
    DestinationFallback,
    Planning,
    Itinerary,
    Packing,
}

impl PromptKind {
    /// Total mapping from category to prompt.
    pub fn for_category(category: Category) -> Self {
        match category {
            Category::Itinerary => PromptKind::Itinerary,
            Category::Planning => PromptKind::Planning,
            Category::Packing => PromptKind::Packing,
            Category::Destination => PromptKind::Destination,
            Category::General => PromptKind::DestinationFallback,
        }
    }

    /// Name of the template file this prompt renders.
    pub fn template_name(&self) -> &'static str {
        match self {
            PromptKind::Destination | PromptKind::DestinationFallback => "destination",
            PromptKind::Planning => "planning",
            PromptKind::Itinerary => "itinerary",
            PromptKind::Packing => "packing",
        }
    }

    /// Prompt type label reported to clients.
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptKind::Destination => "destination",
            PromptKind::DestinationFallback => "destination_fallback",
            PromptKind::Planning => "planning",
            PromptKind::Itinerary => "itinerary",
            PromptKind::Packing => "packing",
        }
    }
}

// =============================================================================
// PromptLibrary
// =============================================================================

/// In-memory store of extracted prompt templates.
pub struct PromptLibrary {
    dir: Option<PathBuf>,
    templates: RwLock<HashMap<String, String>>,
}

impl PromptLibrary {
    /// Read and extract every template in [`TEMPLATE_NAMES`] from `dir`.
    ///
    /// Fails if any file is missing or unreadable.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let templates = read_all(&dir)?;
        tracing::info!(
            dir = %dir.display(),
            count = templates.len(),
            "Prompt templates loaded"
        );
        Ok(Self {
            dir: Some(dir),
            templates: RwLock::new(templates),
        })
    }

    /// Build a library from already-extracted template bodies.
    pub fn from_templates<I, K, V>(templates: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            dir: None,
            templates: RwLock::new(
                templates
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Re-read every template from disk, replacing the current set.
    pub fn reload(&self) -> Result<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let fresh = read_all(dir)?;
        let mut templates = self
            .templates
            .write()
            .map_err(|e| WayfarerError::Template(format!("template lock poisoned: {}", e)))?;
        *templates = fresh;
        tracing::info!(dir = %dir.display(), "Prompt templates reloaded");
        Ok(())
    }

    /// Drop every cached template. Later lookups read from disk again.
    pub fn clear(&self) {
        match self.templates.write() {
            Ok(mut templates) => templates.clear(),
            Err(e) => tracing::error!("Template lock poisoned: {}", e),
        }
    }

    /// Names of the templates currently held in memory, sorted.
    pub fn available(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .templates
            .read()
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// The extracted body of template `name`.
    pub fn get(&self, name: &str) -> Result<String> {
        if let Some(body) = self
            .templates
            .read()
            .ok()
            .and_then(|t| t.get(name).cloned())
        {
            return Ok(body);
        }

        let dir = self
            .dir
            .as_ref()
            .ok_or_else(|| WayfarerError::Template(format!("template `{}` not loaded", name)))?;
        let body = read_template(dir, name)?;
        if let Ok(mut templates) = self.templates.write() {
            templates.insert(name.to_string(), body.clone());
        }
        Ok(body)
    }

    /// Render template `name` with `variables`.
    pub fn build(&self, name: &str, variables: &HashMap<&str, String>) -> Result<String> {
        Ok(render(&self.get(name)?, variables))
    }

    /// Classification prompt for the structured-decision call.
    pub fn build_classification(
        &self,
        user_message: &str,
        history: &[ConversationTurn],
    ) -> Result<String> {
        let variables = HashMap::from([
            ("USER_MESSAGE", user_message.to_string()),
            ("CONVERSATION_CONTEXT", format_history(history)),
        ]);
        self.build("classification", &variables)
    }

    /// Final-generation prompt of `kind`.
    pub fn build_response(
        &self,
        kind: PromptKind,
        user_message: &str,
        history: &[ConversationTurn],
        data: &ExternalDataBag,
    ) -> Result<String> {
        let mut variables = HashMap::from([
            ("SYSTEM_PROMPT", self.get("system")?),
            ("USER_MESSAGE", user_message.to_string()),
            ("CONVERSATION_HISTORY", format_history(history)),
            ("EXTERNAL_DATA_JSON", external_data_json(data)),
            ("EXTERNAL_DATA_SUMMARY", external_data_summary(data)),
        ]);

        if kind == PromptKind::Packing {
            variables.insert("WEATHER_DATA_JSON", json_or_none(data.weather.as_ref()));
            variables.insert("DESTINATION_DATA_JSON", json_or_none(data.country.as_ref()));
        }

        self.build(kind.template_name(), &variables)
    }
}

fn read_all(dir: &Path) -> Result<HashMap<String, String>> {
    TEMPLATE_NAMES
        .iter()
        .map(|name| Ok((name.to_string(), read_template(dir, name)?)))
        .collect()
}

fn read_template(dir: &Path, name: &str) -> Result<String> {
    let path = dir.join(format!("{}-prompt.md", name));
    let raw = std::fs::read_to_string(&path).map_err(|e| {
        WayfarerError::Template(format!("failed to read {}: {}", path.display(), e))
    })?;
    Ok(extract_prompt_content(&raw))
}

// =============================================================================
// Rendering helpers
// =============================================================================

/// Replace every `{{NAME}}` token in one pass. Unknown names become "".
///
/// Substituted values are never re-scanned, so a value containing `{{X}}`
/// is inserted literally.
pub fn render(template: &str, variables: &HashMap<&str, String>) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| {
            variables.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Keep only the template body of a markdown prompt document.
pub fn extract_prompt_content(markdown: &str) -> String {
    let mut body = Vec::new();
    let mut in_fence = false;
    let mut found_fence = false;

    for line in markdown.lines() {
        if line.trim_start().starts_with("```") {
            if in_fence {
                break;
            }
            in_fence = true;
            found_fence = true;
            continue;
        }
        if in_fence {
            body.push(line);
        }
    }

    let extracted = body.join("\n").trim().to_string();
    if found_fence && !extracted.is_empty() {
        return extracted;
    }

    markdown
        .lines()
        .filter(|line| !line.starts_with('#') && !line.trim().is_empty())
        .filter(|line| !DOC_MARKERS.iter().any(|m| line.starts_with(m)))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// History as `role: content` lines, oldest first.
pub fn format_history(history: &[ConversationTurn]) -> String {
    history
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The bag as JSON, or "None available" when nothing was fetched.
pub fn external_data_json(data: &ExternalDataBag) -> String {
    if data.is_empty() {
        return NONE_AVAILABLE.to_string();
    }
    serde_json::to_string(data).unwrap_or_else(|_| NONE_AVAILABLE.to_string())
}

fn json_or_none<T: serde::Serialize>(value: Option<&T>) -> String {
    value
        .and_then(|v| serde_json::to_string(v).ok())
        .unwrap_or_else(|| NONE_AVAILABLE.to_string())
}

/// One-line human summary of the bag.
pub fn external_data_summary(data: &ExternalDataBag) -> String {
    let mut parts = Vec::new();
    if let Some(weather) = &data.weather {
        parts.push(format!(
            "Weather: {}°C, {}",
            weather.temperature, weather.description
        ));
    }
    if let Some(country) = &data.country {
        parts.push(format!(
            "Country: {}, Currency: {}",
            country.name,
            country.currencies.join(", ")
        ));
    }
    if let Some(attractions) = &data.attractions {
        parts.push(format!(
            "Attractions: {} top attractions listed",
            attractions.top_attractions.len()
        ));
    }

    if parts.is_empty() {
        "No external data available".to_string()
    } else {
        parts.join(" | ")
    }
}

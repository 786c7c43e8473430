use serde::{ de, Deserialize, Deserializer, Serialize };
use serde_json::{ Map, Value as JsonValue };

type JsonObject = Map<String, JsonValue>;

// Backends name the same thing differently; the first non-empty key wins.
const PROJECT_TITLE_KEYS: &[&str] = &["title", "name"];
const EXPERIENCE_TITLE_KEYS: &[&str] = &["title", "role", "position"];
const COMPANY_KEYS: &[&str] = &["company", "organization"];
const PERIOD_KEYS: &[&str] = &["period", "duration"];
const TECHNOLOGY_KEYS: &[&str] = &["technologies", "techStack", "tech_stack", "tags", "skills"];

/// Public subset of a portfolio project. Anything else the backend returns is ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Project {
    pub title: String,
    pub description: String,
    pub technologies: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Experience {
    pub title: String,
    pub company: String,
    pub period: String,
    pub description: String,
    pub technologies: Vec<String>,
}

/// First non-blank string among `keys`. `null` and non-string values count as absent.
fn pick_string(obj: &JsonObject, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| obj.get(*key).and_then(JsonValue::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}

// Accepts ["Rust", "Go"], [{"name": "Rust"}] or "Rust, Go".
fn technologies_from(value: &JsonValue) -> Vec<String> {
    let raw: Vec<String> = match value {
        JsonValue::Array(items) =>
            items
                .iter()
                .filter_map(|item| match item {
                    JsonValue::String(s) => Some(s.clone()),
                    JsonValue::Object(obj) =>
                        obj
                            .get("name")
                            .and_then(|n| n.as_str())
                            .map(str::to_string),
                    _ => None,
                })
                .collect(),
        JsonValue::String(s) =>
            s
                .split(',')
                .map(str::to_string)
                .collect(),
        _ => Vec::new(),
    };

    raw.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn pick_technologies(obj: &JsonObject, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .map(technologies_from)
        .find(|list| !list.is_empty())
        .unwrap_or_default()
}

fn require_title<E: de::Error>(title: String, kind: &str) -> Result<String, E> {
    if title.is_empty() {
        Err(E::custom(format!("{} entry has no title", kind)))
    } else {
        Ok(title)
    }
}

impl<'de> Deserialize<'de> for Project {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error> where D: Deserializer<'de> {
        let obj = JsonObject::deserialize(deserializer)?;
        Ok(Project {
            title: require_title(pick_string(&obj, PROJECT_TITLE_KEYS), "project")?,
            description: pick_string(&obj, &["description"]),
            technologies: pick_technologies(&obj, TECHNOLOGY_KEYS),
        })
    }
}

impl<'de> Deserialize<'de> for Experience {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error> where D: Deserializer<'de> {
        let obj = JsonObject::deserialize(deserializer)?;
        Ok(Experience {
            title: require_title(pick_string(&obj, EXPERIENCE_TITLE_KEYS), "experience")?,
            company: pick_string(&obj, COMPANY_KEYS),
            period: pick_string(&obj, PERIOD_KEYS),
            description: pick_string(&obj, &["description"]),
            technologies: pick_technologies(&obj, TECHNOLOGY_KEYS),
        })
    }
}

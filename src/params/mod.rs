//! Model run parameters.
//!
//! A [`ParameterMap`] is an insertion-ordered `name → value` mapping loaded
//! either from inline JSON or from a commented `name: value` parameters file.
//! The same map instance renders both the container command and any config
//! file bodies, so values are resolved into [`ParamValue`] variants exactly
//! once, at load time.

use std::fmt;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RunError;

/// Declared type of a parameter, from the model's parameter schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Number,
    Text,
    Bool,
}

/// A single parameter value.
///
/// Numbers and booleans stringify canonically (`12.5`, `2021`, `true`) so a
/// rendered template is byte-identical across runs and locales.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Number(f64),
    Text(String),
    Bool(bool),
}

impl ParamValue {
    /// Build a value from a JSON scalar. Non-scalar JSON (arrays, objects)
    /// falls back to its compact JSON text, matching the catalog's
    /// everything-is-a-string directive convention.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(b) => ParamValue::Bool(*b),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => ParamValue::Number(f),
                None => ParamValue::Text(n.to_string()),
            },
            serde_json::Value::String(s) => ParamValue::Text(s.clone()),
            other => ParamValue::Text(other.to_string()),
        }
    }

    /// Coerce to the declared type. Coercion failure is not an error: the
    /// value falls back to its text form, which is the branch the templates
    /// end up seeing anyway.
    pub fn coerce(self, ty: ParamType) -> ParamValue {
        match (ty, self) {
            (ParamType::Number, ParamValue::Text(s)) => match s.trim().parse::<f64>() {
                Ok(n) => ParamValue::Number(n),
                Err(_) => ParamValue::Text(s),
            },
            (ParamType::Bool, ParamValue::Text(s)) => match s.trim() {
                "true" | "True" => ParamValue::Bool(true),
                "false" | "False" => ParamValue::Bool(false),
                _ => ParamValue::Text(s),
            },
            (ParamType::Text, ParamValue::Number(n)) => {
                ParamValue::Text(ParamValue::Number(n).to_string())
            }
            (ParamType::Text, ParamValue::Bool(b)) => ParamValue::Text(b.to_string()),
            (_, v) => v,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(s) => f.write_str(s),
            ParamValue::Bool(b) => write!(f, "{b}"),
            // Integral floats print without a trailing `.0` so a JSON `2021`
            // renders as `2021`, not `2021.0`.
            ParamValue::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
        }
    }
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ParamValue::Text(s) => serializer.serialize_str(s),
            ParamValue::Bool(b) => serializer.serialize_bool(*b),
            ParamValue::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
        }
    }
}

impl<'de> Deserialize<'de> for ParamValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(ParamValue::from_json(&value))
    }
}

/// Insertion-ordered parameter map. `insert` on an existing name replaces the
/// value in place so ordering stays stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterMap {
    entries: Vec<(String, ParamValue)>,
}

impl ParameterMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Parse inline JSON (an object of scalars).
    pub fn from_json_str(json: &str) -> Result<Self, RunError> {
        serde_json::from_str(json)
            .map_err(|e| RunError::InvalidParameters(format!("not a JSON object: {e}")))
    }

    /// Load parameters from a file: JSON if the content parses as a JSON
    /// object, otherwise the commented `name: value` format that
    /// `model-params` generates.
    pub fn from_file(path: &Path) -> Result<Self, RunError> {
        let contents = std::fs::read_to_string(path)?;
        if contents.trim_start().starts_with('{') {
            return Self::from_json_str(&contents);
        }
        Ok(Self::from_key_value_text(&contents))
    }

    /// Parse the `name: value` parameters-file format. Lines starting with
    /// `#` and blank lines are skipped. Scalars are resolved once here:
    /// `true`/`false` become booleans; a value becomes a number only when its
    /// canonical stringification round-trips (so `01` stays the text `01`);
    /// everything else stays text.
    pub fn from_key_value_text(text: &str) -> Self {
        let mut map = ParameterMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((name, raw)) = line.split_once(':') else {
                continue;
            };
            let name = name.trim();
            let raw = raw.trim();
            if name.is_empty() {
                continue;
            }
            map.insert(name, coerce_scalar(raw));
        }
        map
    }

    /// Write `run-parameters.json` into the run's result folder.
    pub fn save(&self, dir: &Path) -> Result<std::path::PathBuf, RunError> {
        let path = dir.join(PARAMS_FILE);
        let body = serde_json::to_string_pretty(self)
            .map_err(|e| RunError::InvalidParameters(format!("failed to encode: {e}")))?;
        std::fs::write(&path, body)?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self, RunError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}

pub const PARAMS_FILE: &str = "run-parameters.json";

fn coerce_scalar(raw: &str) -> ParamValue {
    match raw {
        "true" => return ParamValue::Bool(true),
        "false" => return ParamValue::Bool(false),
        _ => {}
    }
    if let Ok(n) = raw.parse::<f64>() {
        // Only accept the numeric reading when it is lossless; `01` or
        // `1.50` carry formatting the model may rely on.
        if ParamValue::Number(n).to_string() == raw {
            return ParamValue::Number(n);
        }
    }
    ParamValue::Text(raw.to_string())
}

impl Serialize for ParameterMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ParameterMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MapVisitor;

        impl<'de> Visitor<'de> for MapVisitor {
            type Value = ParameterMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object of parameter values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = ParameterMap::new();
                while let Some((name, value)) = access.next_entry::<String, ParamValue>()? {
                    map.insert(name, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(MapVisitor)
    }
}

/// Generate the commented `name: value` skeleton for a model, derived from
/// the raw directive command (`--name=value` pairs).
pub fn params_skeleton(model_name: &str, command_raw: &str) -> String {
    let mut lines = vec![
        "# Lines starting with # are comments.".to_string(),
        format!("# Model run parameters for {model_name}"),
        "# Example parameters:".to_string(),
    ];
    let mut names = Vec::new();

    for chunk in command_raw.split("--").skip(1) {
        let Some((name, example)) = chunk.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() || name == "name" {
            continue;
        }
        let example = example.trim().trim_matches('\'');
        lines.push(format!("# {name}: {example}"));
        names.push(name.to_string());
    }

    lines.push("#".to_string());
    lines.push("# Set run parameter values here:".to_string());
    for name in names {
        lines.push(format!("{name}: "));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_canonical() {
        assert_eq!(ParamValue::Number(12.5).to_string(), "12.5");
        assert_eq!(ParamValue::Number(2021.0).to_string(), "2021");
        assert_eq!(ParamValue::Bool(true).to_string(), "true");
        assert_eq!(ParamValue::Text("01".into()).to_string(), "01");
    }

    #[test]
    fn insert_preserves_order_and_replaces() {
        let mut map = ParameterMap::new();
        map.insert("b", ParamValue::Number(1.0));
        map.insert("a", ParamValue::Number(2.0));
        map.insert("b", ParamValue::Number(3.0));
        let names: Vec<_> = map.iter().map(|(n, _)| n.to_string()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(map.get("b"), Some(&ParamValue::Number(3.0)));
    }

    #[test]
    fn json_round_trip_preserves_order_and_values() {
        let json = r#"{"month": "01", "year": 2021, "wet": true, "rate": 12.5}"#;
        let map = ParameterMap::from_json_str(json).unwrap();
        let encoded = serde_json::to_string(&map).unwrap();
        let back = ParameterMap::from_json_str(&encoded).unwrap();
        assert_eq!(map, back);
        assert_eq!(map.get("month"), Some(&ParamValue::Text("01".into())));
        assert_eq!(map.get("year"), Some(&ParamValue::Number(2021.0)));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let map =
            ParameterMap::from_json_str(r#"{"year": 2021, "bbox": "[[33.5, 2.7]]"}"#).unwrap();
        let path = map.save(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), PARAMS_FILE);
        let back = ParameterMap::load(&path).unwrap();
        assert_eq!(map, back);
    }

    #[test]
    fn key_value_text_skips_comments_and_coerces_losslessly() {
        let text = "# comment\n\nmonth: 01\nyear: 2021\nwet: true\nlabel: rainfall map\n";
        let map = ParameterMap::from_key_value_text(text);
        assert_eq!(map.len(), 4);
        // `01` must stay text so the rendered command keeps the leading zero.
        assert_eq!(map.get("month"), Some(&ParamValue::Text("01".into())));
        assert_eq!(map.get("year"), Some(&ParamValue::Number(2021.0)));
        assert_eq!(map.get("wet"), Some(&ParamValue::Bool(true)));
        assert_eq!(map.get("label"), Some(&ParamValue::Text("rainfall map".into())));
    }

    #[test]
    fn coerce_falls_back_to_text() {
        let v = ParamValue::Text("not-a-number".into()).coerce(ParamType::Number);
        assert_eq!(v, ParamValue::Text("not-a-number".into()));
        let v = ParamValue::Text("12.5".into()).coerce(ParamType::Number);
        assert_eq!(v, ParamValue::Number(12.5));
        let v = ParamValue::Text("maybe".into()).coerce(ParamType::Bool);
        assert_eq!(v, ParamValue::Text("maybe".into()));
    }

    #[test]
    fn skeleton_lists_parameters_without_name() {
        let raw = "python3 run_chirps_tiff.py --name=CHIRPS --month=01 --year=2021 --bbox='[[33.5, 2.7], [49.9, 16.5]]'";
        let skeleton = params_skeleton("CHIRPS-Monthly", raw);
        assert!(skeleton.contains("# month: 01"));
        assert!(skeleton.contains("# bbox: [[33.5, 2.7], [49.9, 16.5]]"));
        assert!(skeleton.contains("\nmonth: "));
        assert!(skeleton.contains("\nyear: "));
        assert!(!skeleton.contains("\nname: "));
    }
}

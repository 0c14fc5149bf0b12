//! # Rule Registry
//!
//! Maps a mixin name to the shape of its arguments. Rules come from the
//! `target_rules` array of the configuration and are normalized here: names
//! lose a leading `+` and a trailing `(`, malformed entries are dropped, and a
//! minimal fallback is used when nothing usable is left.

use serde::Deserialize;
use std::collections::HashSet;
use tracing::warn;

/// Property names an options-object rule reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionsKeys {
    pub pc: String,
    pub sp: String,
    pub pc_width: String,
    pub pc_height: String,
    pub sp_width: String,
    pub sp_height: String,
}

impl Default for OptionsKeys {
    fn default() -> Self {
        Self {
            pc: "pc".to_string(),
            sp: "sp".to_string(),
            pc_width: "width".to_string(),
            pc_height: "height".to_string(),
            sp_width: "widthSp".to_string(),
            sp_height: "heightSp".to_string(),
        }
    }
}

/// One image slot of a data-collection item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSource {
    /// Any of these keys may hold the image path; the first string literal wins.
    pub image_keys: Vec<String>,
    pub width_key: String,
    pub height_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Positional {
        name: String,
    },
    OptionsObject {
        name: String,
        keys: OptionsKeys,
    },
    DataCollection {
        name: String,
        sources: Vec<DataSource>,
    },
}

impl Rule {
    pub fn name(&self) -> &str {
        match self {
            Rule::Positional { name }
            | Rule::OptionsObject { name, .. }
            | Rule::DataCollection { name, .. } => name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Rule::Positional { .. } => "positional",
            Rule::OptionsObject { .. } => "optionsObject",
            Rule::DataCollection { .. } => "dataCollection",
        }
    }
}

/// A rule whose name is valid but whose type no handler understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedRule {
    pub name: String,
    pub kind: String,
}

/// Result of looking a mixin name up in the registry.
#[derive(Debug, PartialEq, Eq)]
pub enum Lookup<'a> {
    Rule(&'a Rule),
    Unsupported(&'a UnsupportedRule),
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRegistry {
    rules: Vec<Rule>,
    unsupported: Vec<UnsupportedRule>,
}

/// A `target_rules` entry as written in the configuration file.
///
/// The camelCase aliases accept configuration written for the editor
/// extension this tool grew out of.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct RawRule {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(alias = "pcKey")]
    pc_key: Option<String>,
    #[serde(alias = "spKey")]
    sp_key: Option<String>,
    #[serde(alias = "pcWidthKey")]
    pc_width_key: Option<String>,
    #[serde(alias = "pcHeightKey")]
    pc_height_key: Option<String>,
    #[serde(alias = "spWidthKey")]
    sp_width_key: Option<String>,
    #[serde(alias = "spHeightKey")]
    sp_height_key: Option<String>,
    sources: Vec<RawSource>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct RawSource {
    #[serde(alias = "imageKey", alias = "image_keys", alias = "imageKeys")]
    image_key: Option<OneOrMany>,
    #[serde(alias = "widthKey")]
    width_key: String,
    #[serde(alias = "heightKey")]
    height_key: String,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(key) => vec![key],
            OneOrMany::Many(keys) => keys,
        }
    }
}

/// Strips the call syntax users tend to copy along with a mixin name.
pub fn normalize_name(raw: &str) -> String {
    let name = raw.trim();
    let name = name.strip_prefix('+').unwrap_or(name);
    let name = name.strip_suffix('(').unwrap_or(name);
    name.trim().to_string()
}

fn non_empty(value: Option<String>, default: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl RawRule {
    fn into_rule(self, name: String) -> Result<Rule, Option<String>> {
        match self.kind.trim() {
            "positional" | "imgArgs" => Ok(Rule::Positional { name }),
            "optionsObject" | "pictureOpts" => {
                let defaults = OptionsKeys::default();
                Ok(Rule::OptionsObject {
                    name,
                    keys: OptionsKeys {
                        pc: non_empty(self.pc_key, &defaults.pc),
                        sp: non_empty(self.sp_key, &defaults.sp),
                        pc_width: non_empty(self.pc_width_key, &defaults.pc_width),
                        pc_height: non_empty(self.pc_height_key, &defaults.pc_height),
                        sp_width: non_empty(self.sp_width_key, &defaults.sp_width),
                        sp_height: non_empty(self.sp_height_key, &defaults.sp_height),
                    },
                })
            }
            "dataCollection" | "dataArray" => {
                let sources: Vec<DataSource> = self
                    .sources
                    .into_iter()
                    .filter_map(|raw| {
                        let image_keys: Vec<String> = raw
                            .image_key
                            .map(OneOrMany::into_vec)
                            .unwrap_or_default()
                            .iter()
                            .map(|k| k.trim().to_string())
                            .filter(|k| !k.is_empty())
                            .collect();
                        let width_key = raw.width_key.trim().to_string();
                        let height_key = raw.height_key.trim().to_string();
                        (!image_keys.is_empty() && !width_key.is_empty() && !height_key.is_empty())
                            .then_some(DataSource {
                                image_keys,
                                width_key,
                                height_key,
                            })
                    })
                    .collect();
                if sources.is_empty() {
                    // No usable source: the entry is malformed, not unsupported.
                    return Err(None);
                }
                Ok(Rule::DataCollection { name, sources })
            }
            other => Err(Some(other.to_string())),
        }
    }
}

impl RuleRegistry {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            unsupported: Vec::new(),
        }
    }

    /// The rules used when configuration yields nothing usable.
    pub fn fallback() -> Self {
        Self::new(vec![
            Rule::Positional {
                name: "img".to_string(),
            },
            Rule::OptionsObject {
                name: "picture".to_string(),
                keys: OptionsKeys::default(),
            },
        ])
    }

    /// Normalizes raw `target_rules` entries.
    pub fn from_entries(entries: &[toml::Value]) -> Self {
        let mut rules = Vec::new();
        let mut unsupported = Vec::new();
        let mut seen = HashSet::new();

        for (index, entry) in entries.iter().enumerate() {
            let raw: RawRule = match entry.clone().try_into() {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(index, error = %e, "dropping malformed target rule");
                    continue;
                }
            };

            let name = normalize_name(&raw.name);
            let kind = raw.kind.trim().to_string();
            if name.is_empty() || kind.is_empty() {
                warn!(index, "dropping target rule without name or type");
                continue;
            }
            if !seen.insert((name.clone(), kind.clone())) {
                continue;
            }

            match raw.into_rule(name.clone()) {
                Ok(rule) => rules.push(rule),
                Err(Some(kind)) => {
                    warn!(name, kind, "target rule has an unsupported type");
                    unsupported.push(UnsupportedRule { name, kind });
                }
                Err(None) => warn!(name, "dropping target rule without usable sources"),
            }
        }

        if rules.is_empty() {
            warn!("no usable target rules, falling back to img/picture");
            return Self {
                unsupported,
                ..Self::fallback()
            };
        }

        Self { rules, unsupported }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Names the scanner looks for, in configuration order, without repeats.
    pub fn candidate_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.rules
            .iter()
            .map(Rule::name)
            .chain(self.unsupported.iter().map(|u| u.name.as_str()))
            .filter(|name| seen.insert(*name))
            .map(str::to_string)
            .collect()
    }

    /// The first rule registered under `name` wins.
    pub fn lookup(&self, name: &str) -> Lookup<'_> {
        if let Some(rule) = self.rules.iter().find(|r| r.name() == name) {
            return Lookup::Rule(rule);
        }
        match self.unsupported.iter().find(|u| u.name == name) {
            Some(unsupported) => Lookup::Unsupported(unsupported),
            None => Lookup::Unknown,
        }
    }
}

/// The `target_rules` written into a fresh configuration file.
pub fn default_entries() -> Vec<toml::Value> {
    fn table(pairs: &[(&str, toml::Value)]) -> toml::Value {
        let mut table = toml::Table::new();
        for (key, value) in pairs {
            table.insert((*key).to_string(), value.clone());
        }
        toml::Value::Table(table)
    }
    fn string(s: &str) -> toml::Value {
        toml::Value::String(s.to_string())
    }

    vec![
        table(&[("name", string("img")), ("type", string("positional"))]),
        table(&[("name", string("picture")), ("type", string("optionsObject"))]),
        table(&[
            ("name", string("c_cards")),
            ("type", string("dataCollection")),
            (
                "sources",
                toml::Value::Array(vec![
                    table(&[
                        ("image_key", string("image")),
                        ("width_key", string("width")),
                        ("height_key", string("height")),
                    ]),
                    table(&[
                        ("image_key", string("imageSp")),
                        ("width_key", string("widthSp")),
                        ("height_key", string("heightSp")),
                    ]),
                ]),
            ),
        ]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(toml_text: &str) -> Vec<toml::Value> {
        #[derive(Deserialize)]
        struct Wrapper {
            target_rules: Vec<toml::Value>,
        }
        toml::from_str::<Wrapper>(toml_text).unwrap().target_rules
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name(" +img( "), "img");
        assert_eq!(normalize_name("picture"), "picture");
        assert_eq!(normalize_name("+"), "");
    }

    #[test]
    fn test_default_entries_normalize() {
        let registry = RuleRegistry::from_entries(&default_entries());
        assert_eq!(registry.candidate_names(), vec!["img", "picture", "c_cards"]);
        let Lookup::Rule(Rule::DataCollection { sources, .. }) = registry.lookup("c_cards") else {
            panic!("c_cards should be a data collection");
        };
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].image_keys, vec!["imageSp"]);
    }

    #[test]
    fn test_malformed_entries_are_dropped() {
        let registry = RuleRegistry::from_entries(&entries(
            r#"
            target_rules = [
                { name = "+img(", type = "imgArgs" },
                { name = 5, type = "positional" },
                { type = "positional" },
                { name = "cards", type = "dataArray", sources = [{ image_key = "", width_key = "w", height_key = "h" }] },
                { name = "img", type = "imgArgs" },
            ]
            "#,
        ));
        assert_eq!(
            registry.rules(),
            &[Rule::Positional {
                name: "img".to_string()
            }]
        );
        assert_eq!(registry.lookup("cards"), Lookup::Unknown);
    }

    #[test]
    fn test_fallback_when_nothing_usable() {
        let registry = RuleRegistry::from_entries(&entries(
            r#"target_rules = [{ name = "", type = "positional" }]"#,
        ));
        assert_eq!(registry, RuleRegistry::fallback());

        let registry = RuleRegistry::from_entries(&[]);
        assert_eq!(registry.candidate_names(), vec!["img", "picture"]);
    }

    #[test]
    fn test_unsupported_type_is_remembered() {
        let registry = RuleRegistry::from_entries(&entries(
            r#"
            target_rules = [
                { name = "img", type = "positional" },
                { name = "slider", type = "carousel" },
            ]
            "#,
        ));
        assert_eq!(registry.candidate_names(), vec!["img", "slider"]);
        assert!(matches!(
            registry.lookup("slider"),
            Lookup::Unsupported(UnsupportedRule { kind, .. }) if kind == "carousel"
        ));
        assert_eq!(registry.lookup("nope"), Lookup::Unknown);
    }

    #[test]
    fn test_options_keys_and_aliases() {
        let registry = RuleRegistry::from_entries(&entries(
            r#"
            target_rules = [
                { name = "pic", type = "pictureOpts", pcKey = "src", sp_width_key = "spW" },
                { name = "cards", type = "dataCollection", sources = [
                    { imageKey = ["image", "imagePc"], widthKey = "width", heightKey = "height" },
                ] },
            ]
            "#,
        ));
        let Lookup::Rule(Rule::OptionsObject { keys, .. }) = registry.lookup("pic") else {
            panic!("pic should be an options object");
        };
        assert_eq!(keys.pc, "src");
        assert_eq!(keys.sp, "sp");
        assert_eq!(keys.sp_width, "spW");

        let Lookup::Rule(Rule::DataCollection { sources, .. }) = registry.lookup("cards") else {
            panic!("cards should be a data collection");
        };
        assert_eq!(sources[0].image_keys, vec!["image", "imagePc"]);
    }
}

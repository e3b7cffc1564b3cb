use super::geo::{parse_distance, GeoParseError, GeoPoint};
use super::{
    CategoryRules, FieldMode, FieldRule, GeoDecay, MatchClause, MatchKind, MissingValue,
    Modifier, RuleSet, ScalarModifier, SortMode, SortRule, DEFAULT_CATEGORY_FIELD,
    MULTI_FIELD_DELIMITER,
};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// What to do when two categories register the same alias code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicateCodePolicy {
    #[default]
    Reject,
    LastWins,
}

impl DuplicateCodePolicy {
    pub fn from_name(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reject" | "error" => Some(Self::Reject),
            "last_wins" | "override" => Some(Self::LastWins),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderOptions {
    pub default_category_field: String,
    pub duplicate_codes: DuplicateCodePolicy,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            default_category_field: DEFAULT_CATEGORY_FIELD.to_string(),
            duplicate_codes: DuplicateCodePolicy::default(),
        }
    }
}

/// Load-time validation failure; fatal to query compilation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("failed to read rule configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("rule configuration is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{path} must have [{parameter}]")]
    MissingParameter {
        path: String,
        parameter: &'static str,
    },
    #[error("[{parameter}] must not be negative, got {value}")]
    NegativeFactor { parameter: &'static str, value: f64 },
    #[error("{path} [{parameter}] is not a valid number: '{value}'")]
    InvalidNumber {
        path: String,
        parameter: &'static str,
        value: String,
    },
    #[error("[categorys] must define at least one category")]
    EmptyCategories,
    #[error("{path} contains an empty category code")]
    EmptyCategoryCode { path: String },
    #[error("category [{name}] must define [fields_score] or [sort_score]")]
    EmptyCategory { name: String },
    #[error("{path} has unknown modifier '{modifier}'")]
    UnknownModifier { path: String, modifier: String },
    #[error("{path} has unknown match type '{kind}'")]
    UnknownMatchType { path: String, kind: String },
    #[error("category [{name}] has unknown sort mode '{mode}'")]
    UnknownSortMode { name: String, mode: String },
    #[error("{path} [{parameter}] is invalid: {source}")]
    InvalidGeoParameter {
        path: String,
        parameter: &'static str,
        #[source]
        source: GeoParseError,
    },
    #[error("{path} [decay] must be within (0, 1), got {decay}")]
    DecayOutOfRange { path: String, decay: f64 },
    #[error("{path} [scale] must be greater than zero, got {scale} meters")]
    NonPositiveScale { path: String, scale: f64 },
    #[error("{path} [offset] must not be negative, got {offset} meters")]
    NegativeOffset { path: String, offset: f64 },
    #[error("{path} requires field [{field}] but defines no [missing] value")]
    RequiredWithoutMissing { path: String, field: String },
    #[error("{path} [missing] value '{value}' does not fit the field's modifier")]
    InvalidMissing { path: String, value: String },
    #[error("category [{name}] defines [sort_score] without [sort_base_score]")]
    MissingSortBaseScore { name: String },
    #[error(
        "{path} multi-field components differ in length (fields {fields}, types {types}, values {values})"
    )]
    ComponentMismatch {
        path: String,
        fields: usize,
        types: usize,
        values: usize,
    },
    #[error("category code '{code}' is registered more than once")]
    DuplicateCategoryCode { code: String },
}

/// Turns declarative configuration into an immutable [`RuleSet`].
#[derive(Debug, Clone, Default)]
pub struct RuleSetLoader {
    options: LoaderOptions,
}

impl RuleSetLoader {
    pub fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    pub fn from_path<P: AsRef<Path>>(&self, path: P) -> Result<RuleSet, ConfigurationError> {
        let file = std::fs::File::open(path)?;
        self.from_reader(file)
    }

    pub fn from_reader<R: Read>(&self, reader: R) -> Result<RuleSet, ConfigurationError> {
        let raw: RawRuleSet = serde_json::from_reader(reader)?;
        self.build(raw)
    }

    pub fn from_json_str(&self, json: &str) -> Result<RuleSet, ConfigurationError> {
        let raw: RawRuleSet = serde_json::from_str(json)?;
        self.build(raw)
    }

    pub fn from_value(&self, value: serde_json::Value) -> Result<RuleSet, ConfigurationError> {
        let raw: RawRuleSet = serde_json::from_value(value)?;
        self.build(raw)
    }

    fn build(&self, raw: RawRuleSet) -> Result<RuleSet, ConfigurationError> {
        let func_score_factor = required_factor(raw.func_score_factor, "func_score_factor")?;
        let original_score_factor =
            required_factor(raw.original_score_factor, "original_score_factor")?;

        let category_field = raw
            .category_field
            .map(|field| field.trim().to_string())
            .filter(|field| !field.is_empty())
            .unwrap_or_else(|| self.options.default_category_field.clone());

        let entries = match raw.categorys {
            None => {
                return Err(ConfigurationError::MissingParameter {
                    path: "query".to_string(),
                    parameter: "categorys",
                })
            }
            Some(RawCategories::Keyed(map)) => map.into_iter().collect::<Vec<_>>(),
            Some(RawCategories::Listed(list)) => list
                .into_iter()
                .enumerate()
                .map(|(index, category)| {
                    let name = category.name.clone().ok_or_else(|| {
                        ConfigurationError::MissingParameter {
                            path: format!("categorys[{index}]"),
                            parameter: "name",
                        }
                    })?;
                    Ok((name, category))
                })
                .collect::<Result<Vec<_>, ConfigurationError>>()?,
        };

        if entries.is_empty() {
            return Err(ConfigurationError::EmptyCategories);
        }

        let mut categories: HashMap<String, Arc<CategoryRules>> = HashMap::new();
        for (codes, raw_category) in entries {
            let rules = Arc::new(build_category(&codes, raw_category)?);
            for code in expand_aliases(&codes)? {
                if let Some(previous) = categories.insert(code.clone(), Arc::clone(&rules)) {
                    match self.options.duplicate_codes {
                        DuplicateCodePolicy::Reject => {
                            return Err(ConfigurationError::DuplicateCategoryCode { code });
                        }
                        DuplicateCodePolicy::LastWins => {
                            warn!(
                                %code,
                                replaced = %previous.name,
                                by = %rules.name,
                                "category code registered twice; keeping the later rules"
                            );
                        }
                    }
                }
            }
        }

        debug!(
            category_field = %category_field,
            codes = categories.len(),
            func_score_factor,
            original_score_factor,
            "compiled scoring rule set"
        );

        Ok(RuleSet {
            func_score_factor,
            original_score_factor,
            category_field,
            categories,
        })
    }
}

fn required_factor(
    value: Option<RawNumber>,
    parameter: &'static str,
) -> Result<f64, ConfigurationError> {
    let value = value.ok_or_else(|| ConfigurationError::MissingParameter {
        path: "query".to_string(),
        parameter,
    })?;
    let factor = value.to_f64("query", parameter)?;
    if factor < 0.0 {
        return Err(ConfigurationError::NegativeFactor {
            parameter,
            value: factor,
        });
    }
    Ok(factor)
}

fn expand_aliases(codes: &str) -> Result<Vec<String>, ConfigurationError> {
    codes
        .split(',')
        .map(|code| {
            let code = code.trim();
            if code.is_empty() {
                Err(ConfigurationError::EmptyCategoryCode {
                    path: format!("categorys[{codes}]"),
                })
            } else {
                Ok(code.to_string())
            }
        })
        .collect()
}

fn build_category(codes: &str, raw: RawCategory) -> Result<CategoryRules, ConfigurationError> {
    let path = format!("categorys[{codes}]");
    let fields_score = raw.fields_score.unwrap_or_default();
    let sort_score = raw.sort_score.unwrap_or_default();
    if fields_score.is_empty() && sort_score.is_empty() {
        return Err(ConfigurationError::EmptyCategory {
            name: codes.to_string(),
        });
    }

    let field_mode = match raw.filed_mode.as_deref() {
        None => FieldMode::Sum,
        Some(name) => FieldMode::from_name(name).unwrap_or_else(|| {
            warn!(category = %codes, mode = %name, "unknown field mode; merging with sum");
            FieldMode::Sum
        }),
    };

    let sort_mode = match raw.sort_mode.as_deref() {
        None => SortMode::Max,
        Some(name) => SortMode::from_name(name).ok_or_else(|| ConfigurationError::UnknownSortMode {
            name: codes.to_string(),
            mode: name.to_string(),
        })?,
    };

    let sort_base_score = raw
        .sort_base_score
        .map(|value| value.to_f64(&path, "sort_base_score"))
        .transpose()?;
    if !sort_score.is_empty() && sort_base_score.is_none() {
        return Err(ConfigurationError::MissingSortBaseScore {
            name: codes.to_string(),
        });
    }

    let field_rules = fields_score
        .into_iter()
        .enumerate()
        .map(|(index, raw_field)| {
            build_field_rule(&format!("{path}.fields_score[{index}]"), raw_field)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let sort_rules = sort_score
        .into_iter()
        .enumerate()
        .map(|(index, raw_sort)| build_sort_rule(&format!("{path}.sort_score[{index}]"), raw_sort))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CategoryRules::new(
        codes,
        field_mode,
        field_rules,
        sort_mode,
        sort_base_score,
        sort_rules,
    ))
}

fn build_field_rule(path: &str, raw: RawFieldRule) -> Result<FieldRule, ConfigurationError> {
    let field = non_empty(raw.field).ok_or_else(|| ConfigurationError::MissingParameter {
        path: path.to_string(),
        parameter: "field",
    })?;
    let modifier_name =
        non_empty(raw.modifier).ok_or_else(|| ConfigurationError::MissingParameter {
            path: path.to_string(),
            parameter: "modifier",
        })?;
    let factor = raw
        .factor
        .ok_or_else(|| ConfigurationError::MissingParameter {
            path: path.to_string(),
            parameter: "factor",
        })?
        .to_f64(path, "factor")?;

    let modifier = if modifier_name.eq_ignore_ascii_case("decaygeoexp") {
        Modifier::DecayGeoExp(build_geo_decay(path, &raw.geo)?)
    } else {
        let scalar = ScalarModifier::ALL
            .into_iter()
            .find(|candidate| candidate.label().eq_ignore_ascii_case(&modifier_name))
            .ok_or_else(|| ConfigurationError::UnknownModifier {
                path: path.to_string(),
                modifier: modifier_name.clone(),
            })?;
        Modifier::Scalar(scalar)
    };

    let weight = raw
        .weight
        .map(|value| value.to_f64(path, "weight"))
        .transpose()?
        .unwrap_or(1.0);
    let add_num = raw
        .add_num
        .map(|value| value.to_f64(path, "add_num"))
        .transpose()?
        .unwrap_or(0.0);
    let require = raw.require.unwrap_or(false);

    let missing = match raw.missing {
        None => None,
        Some(value) => Some(parse_missing(path, &modifier, value)?),
    };

    if require && missing.is_none() {
        return Err(ConfigurationError::RequiredWithoutMissing {
            path: path.to_string(),
            field,
        });
    }

    Ok(FieldRule {
        field,
        factor,
        modifier,
        weight,
        add_num,
        missing,
        require,
    })
}

fn build_geo_decay(path: &str, raw: &RawGeoDecay) -> Result<GeoDecay, ConfigurationError> {
    let missing = |parameter| ConfigurationError::MissingParameter {
        path: path.to_string(),
        parameter,
    };
    let geo_error = |parameter| {
        move |source| ConfigurationError::InvalidGeoParameter {
            path: path.to_string(),
            parameter,
            source,
        }
    };

    let origin = non_empty(raw.origin.clone()).ok_or_else(|| missing("origin"))?;
    let scale = non_empty(raw.scale.clone()).ok_or_else(|| missing("scale"))?;
    let offset = non_empty(raw.offset.clone()).ok_or_else(|| missing("offset"))?;
    let decay = raw
        .decay
        .clone()
        .ok_or_else(|| missing("decay"))?
        .to_f64(path, "decay")?;

    let origin = GeoPoint::parse(&origin).map_err(geo_error("origin"))?;
    let scale = parse_distance(&scale).map_err(geo_error("scale"))?;
    let offset = parse_distance(&offset).map_err(geo_error("offset"))?;

    if !(decay > 0.0 && decay < 1.0) {
        return Err(ConfigurationError::DecayOutOfRange {
            path: path.to_string(),
            decay,
        });
    }
    if !(scale.is_finite() && scale > 0.0) {
        return Err(ConfigurationError::NonPositiveScale {
            path: path.to_string(),
            scale,
        });
    }
    if offset < 0.0 {
        return Err(ConfigurationError::NegativeOffset {
            path: path.to_string(),
            offset,
        });
    }

    Ok(GeoDecay {
        origin,
        scale,
        offset,
        decay,
    })
}

fn parse_missing(
    path: &str,
    modifier: &Modifier,
    value: RawNumber,
) -> Result<MissingValue, ConfigurationError> {
    let invalid = |raw: String| ConfigurationError::InvalidMissing {
        path: path.to_string(),
        value: raw,
    };
    match (modifier, value) {
        (Modifier::Scalar(_), RawNumber::Number(number)) => Ok(MissingValue::Scalar(number)),
        (Modifier::Scalar(_), RawNumber::Text(text)) => text
            .trim()
            .parse::<f64>()
            .map(MissingValue::Scalar)
            .map_err(|_| invalid(text)),
        (Modifier::DecayGeoExp(_), RawNumber::Text(text)) => GeoPoint::parse(&text)
            .map(MissingValue::Point)
            .map_err(|_| invalid(text)),
        (Modifier::DecayGeoExp(_), RawNumber::Number(number)) => Err(invalid(number.to_string())),
    }
}

fn build_sort_rule(path: &str, raw: RawSortRule) -> Result<SortRule, ConfigurationError> {
    let weight = raw
        .weight
        .ok_or_else(|| ConfigurationError::MissingParameter {
            path: path.to_string(),
            parameter: "weight",
        })?
        .to_i32(path, "weight")?;

    let field = non_empty(raw.field);
    let value = raw.value.map(|value| value.into_text()).filter(|value| !value.trim().is_empty());
    let type_name = non_empty(raw.kind);

    // Only a delimited field name makes a conjunction; values such as "R&D" stay whole otherwise.
    let conjunction = field
        .as_deref()
        .map_or(false, |field| field.contains(MULTI_FIELD_DELIMITER));
    let split = |text: &Option<String>| -> Option<Vec<String>> {
        text.as_ref().map(|text| {
            if conjunction {
                text.split(MULTI_FIELD_DELIMITER)
                    .map(|part| part.trim().to_string())
                    .collect()
            } else {
                vec![text.trim().to_string()]
            }
        })
    };

    let fields = split(&field);
    let field_count = fields.as_ref().map_or(1, Vec::len);

    let kinds = match split(&type_name) {
        None => vec![MatchKind::Equal; field_count],
        Some(names) => names
            .iter()
            .map(|name| {
                MatchKind::from_name(name).ok_or_else(|| ConfigurationError::UnknownMatchType {
                    path: path.to_string(),
                    kind: name.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
    };

    let clause_count = kinds.len().max(field_count);
    let values = split(&value);

    let mismatch = || ConfigurationError::ComponentMismatch {
        path: path.to_string(),
        fields: fields.as_ref().map_or(0, Vec::len),
        types: kinds.len(),
        values: values.as_ref().map_or(0, Vec::len),
    };

    if kinds.len() != clause_count {
        return Err(mismatch());
    }
    if let Some(fields) = &fields {
        if fields.len() != clause_count {
            return Err(mismatch());
        }
    }
    if let Some(values) = &values {
        if values.len() != clause_count {
            return Err(mismatch());
        }
    }

    let mut clauses = Vec::with_capacity(clause_count);
    for (index, kind) in kinds.iter().copied().enumerate() {
        let clause_field = fields
            .as_ref()
            .map(|fields| fields[index].clone())
            .filter(|field| !field.is_empty());
        let clause_value = values
            .as_ref()
            .map(|values| values[index].clone())
            .filter(|value| !value.is_empty());

        if kind.needs_field() && clause_field.is_none() {
            return Err(ConfigurationError::MissingParameter {
                path: path.to_string(),
                parameter: "field",
            });
        }
        if kind.needs_value() && clause_value.is_none() {
            return Err(ConfigurationError::MissingParameter {
                path: path.to_string(),
                parameter: "value",
            });
        }

        clauses.push(MatchClause {
            field: clause_field,
            kind,
            value: clause_value,
        });
    }

    Ok(SortRule::new(weight, clauses))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Deserialize)]
struct RawRuleSet {
    func_score_factor: Option<RawNumber>,
    original_score_factor: Option<RawNumber>,
    category_field: Option<String>,
    categorys: Option<RawCategories>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCategories {
    Keyed(BTreeMap<String, RawCategory>),
    Listed(Vec<RawCategory>),
}

#[derive(Debug, Clone, Deserialize)]
struct RawCategory {
    name: Option<String>,
    #[serde(alias = "field_mode")]
    filed_mode: Option<String>,
    fields_score: Option<Vec<RawFieldRule>>,
    sort_mode: Option<String>,
    #[serde(alias = "sort_base_socre")]
    sort_base_score: Option<RawNumber>,
    sort_score: Option<Vec<RawSortRule>>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawFieldRule {
    field: Option<String>,
    factor: Option<RawNumber>,
    modifier: Option<String>,
    weight: Option<RawNumber>,
    add_num: Option<RawNumber>,
    missing: Option<RawNumber>,
    require: Option<bool>,
    #[serde(flatten)]
    geo: RawGeoDecay,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawGeoDecay {
    origin: Option<String>,
    scale: Option<String>,
    offset: Option<String>,
    decay: Option<RawNumber>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawSortRule {
    weight: Option<RawNumber>,
    field: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    value: Option<RawNumber>,
}

/// Numbers may be written as JSON numbers or numeric strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Number(f64),
    Text(String),
}

impl RawNumber {
    fn to_f64(&self, path: &str, parameter: &'static str) -> Result<f64, ConfigurationError> {
        match self {
            RawNumber::Number(number) => Ok(*number),
            RawNumber::Text(text) => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|number| number.is_finite())
                .ok_or_else(|| ConfigurationError::InvalidNumber {
                    path: path.to_string(),
                    parameter,
                    value: text.clone(),
                }),
        }
    }

    fn to_i32(&self, path: &str, parameter: &'static str) -> Result<i32, ConfigurationError> {
        let invalid = |value: String| ConfigurationError::InvalidNumber {
            path: path.to_string(),
            parameter,
            value,
        };
        match self {
            RawNumber::Number(number) => {
                if number.fract() == 0.0 && *number >= i32::MIN as f64 && *number <= i32::MAX as f64
                {
                    Ok(*number as i32)
                } else {
                    Err(invalid(number.to_string()))
                }
            }
            RawNumber::Text(text) => text.trim().parse::<i32>().map_err(|_| invalid(text.clone())),
        }
    }

    fn into_text(self) -> String {
        match self {
            RawNumber::Number(number) => number.to_string(),
            RawNumber::Text(text) => text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn loader() -> RuleSetLoader {
        RuleSetLoader::default()
    }

    fn base(categorys: serde_json::Value) -> serde_json::Value {
        json!({
            "func_score_factor": 2,
            "original_score_factor": 1,
            "categorys": categorys
        })
    }

    fn price_rule() -> serde_json::Value {
        json!({ "field": "price", "factor": 0.5, "modifier": "log1p" })
    }

    #[test]
    fn loads_defaults_and_expands_aliases_to_shared_rules() {
        let rules = loader()
            .from_value(base(json!({
                "phones, tablets": { "filed_mode": "sum", "fields_score": [price_rule()] }
            })))
            .expect("rules load");

        assert_eq!(rules.category_field, DEFAULT_CATEGORY_FIELD);
        let phones = rules.categories.get("phones").expect("phones registered");
        let tablets = rules.categories.get("tablets").expect("tablets registered");
        assert!(Arc::ptr_eq(phones, tablets));

        let field = &phones.field_rules[0];
        assert_eq!(field.weight, 1.0);
        assert_eq!(field.add_num, 0.0);
        assert!(!field.require);
        assert_eq!(field.modifier, Modifier::Scalar(ScalarModifier::Log1p));
    }

    #[test]
    fn accepts_listed_categories_and_string_numbers() {
        let rules = loader()
            .from_value(json!({
                "func_score_factor": "1.5",
                "original_score_factor": 0,
                "category_field": "cat",
                "categorys": [{
                    "name": "books",
                    "filed_mode": "max",
                    "sort_mode": "min",
                    "sort_base_socre": "10",
                    "sort_score": [{ "weight": "3", "field": "brand", "value": "acme" }]
                }]
            }))
            .expect("listed form loads");

        assert_eq!(rules.func_score_factor, 1.5);
        assert_eq!(rules.category_field, "cat");
        let books = rules.resolve("books").expect("books resolves");
        assert_eq!(books.field_mode, FieldMode::Max);
        assert_eq!(books.sort_mode, SortMode::Min);
        assert_eq!(books.sort_base_score, Some(10.0));
        assert_eq!(books.sort_rules[0].clauses[0].kind, MatchKind::Equal);
    }

    #[test]
    fn rejects_missing_and_negative_factors() {
        let err = loader()
            .from_value(json!({ "original_score_factor": 1, "categorys": {} }))
            .expect_err("missing factor");
        assert!(matches!(
            err,
            ConfigurationError::MissingParameter {
                parameter: "func_score_factor",
                ..
            }
        ));

        let err = loader()
            .from_value(json!({
                "func_score_factor": 1,
                "original_score_factor": -1,
                "categorys": { "a": { "fields_score": [price_rule()] } }
            }))
            .expect_err("negative factor");
        assert!(matches!(err, ConfigurationError::NegativeFactor { .. }));

        let err = loader()
            .from_value(base(json!({
                "a": { "fields_score": [{ "field": "price", "factor": "x", "modifier": "log1p" }] }
            })))
            .expect_err("unparseable factor");
        match err {
            ConfigurationError::InvalidNumber {
                parameter, value, ..
            } => {
                assert_eq!(parameter, "factor");
                assert_eq!(value, "x");
            }
            other => panic!("expected invalid number, got {other:?}"),
        }

        let err = loader()
            .from_value(json!({
                "func_score_factor": "NaN",
                "original_score_factor": 1,
                "categorys": { "a": { "fields_score": [price_rule()] } }
            }))
            .expect_err("non-finite factor");
        assert!(matches!(
            err,
            ConfigurationError::InvalidNumber {
                parameter: "func_score_factor",
                ..
            }
        ));
    }

    #[test]
    fn unknown_sort_mode_is_rejected() {
        let err = loader()
            .from_value(base(json!({
                "a": { "sort_mode": "avg", "fields_score": [price_rule()] }
            })))
            .expect_err("unknown sort mode");
        match err {
            ConfigurationError::UnknownSortMode { name, mode } => {
                assert_eq!(name, "a");
                assert_eq!(mode, "avg");
            }
            other => panic!("expected unknown sort mode, got {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_categories_and_empty_category_rules() {
        let err = loader().from_value(base(json!({}))).expect_err("empty");
        assert!(matches!(err, ConfigurationError::EmptyCategories));

        let err = loader()
            .from_value(base(json!({ "a": { "filed_mode": "sum" } })))
            .expect_err("no rules");
        assert!(matches!(err, ConfigurationError::EmptyCategory { .. }));

        let err = loader()
            .from_value(base(json!({ "a,,b": { "fields_score": [price_rule()] } })))
            .expect_err("blank alias");
        assert!(matches!(err, ConfigurationError::EmptyCategoryCode { .. }));
    }

    #[test]
    fn unknown_field_mode_falls_back_to_sum() {
        let rules = loader()
            .from_value(base(json!({
                "a": { "filed_mode": "median", "fields_score": [price_rule()] }
            })))
            .expect("lenient field mode");
        assert_eq!(rules.categories["a"].field_mode, FieldMode::Sum);
    }

    #[test]
    fn field_rules_require_field_modifier_and_factor() {
        for missing in ["field", "modifier", "factor"] {
            let mut rule = price_rule();
            rule.as_object_mut().expect("object").remove(missing);
            let err = loader()
                .from_value(base(json!({ "a": { "fields_score": [rule] } })))
                .expect_err("incomplete field rule");
            match err {
                ConfigurationError::MissingParameter { parameter, .. } => {
                    assert_eq!(parameter, missing)
                }
                other => panic!("expected missing {missing}, got {other:?}"),
            }
        }

        let err = loader()
            .from_value(base(json!({
                "a": { "fields_score": [{ "field": "p", "factor": 1, "modifier": "cube" }] }
            })))
            .expect_err("unknown modifier");
        assert!(matches!(err, ConfigurationError::UnknownModifier { .. }));
    }

    #[test]
    fn required_fields_need_a_parseable_missing_value() {
        let err = loader()
            .from_value(base(json!({
                "a": { "fields_score": [{ "field": "p", "factor": 1, "modifier": "none", "require": true }] }
            })))
            .expect_err("required without missing");
        assert!(matches!(err, ConfigurationError::RequiredWithoutMissing { .. }));

        let err = loader()
            .from_value(base(json!({
                "a": { "fields_score": [{
                    "field": "p", "factor": 1, "modifier": "none", "require": true, "missing": "abc"
                }] }
            })))
            .expect_err("unparseable missing");
        assert!(matches!(err, ConfigurationError::InvalidMissing { .. }));

        let rules = loader()
            .from_value(base(json!({
                "a": { "fields_score": [{
                    "field": "p", "factor": 1, "modifier": "none", "require": true, "missing": "7"
                }] }
            })))
            .expect("numeric string missing");
        assert_eq!(
            rules.categories["a"].field_rules[0].missing,
            Some(MissingValue::Scalar(7.0))
        );
    }

    #[test]
    fn geo_decay_parameters_are_parsed_and_checked() {
        let geo = |decay: serde_json::Value| {
            json!({
                "field": "location", "factor": 1, "modifier": "decaygeoexp",
                "origin": "31,33", "scale": "5km", "offset": "500m", "decay": decay,
                "require": true, "missing": "31.1,33.1"
            })
        };

        let rules = loader()
            .from_value(base(json!({ "a": { "fields_score": [geo(json!(0.5))] } })))
            .expect("geo rule loads");
        let rule = &rules.categories["a"].field_rules[0];
        match &rule.modifier {
            Modifier::DecayGeoExp(decay) => {
                assert_eq!(decay.origin, GeoPoint::new(31.0, 33.0));
                assert_eq!(decay.scale, 5000.0);
                assert_eq!(decay.offset, 500.0);
                assert_eq!(decay.decay, 0.5);
            }
            other => panic!("expected geo decay, got {other:?}"),
        }
        assert_eq!(
            rule.missing,
            Some(MissingValue::Point(GeoPoint::new(31.1, 33.1)))
        );

        let err = loader()
            .from_value(base(json!({ "a": { "fields_score": [geo(json!(1.0))] } })))
            .expect_err("decay out of range");
        assert!(matches!(err, ConfigurationError::DecayOutOfRange { .. }));

        let mut incomplete = geo(json!(0.5));
        incomplete.as_object_mut().expect("object").remove("offset");
        let err = loader()
            .from_value(base(json!({ "a": { "fields_score": [incomplete] } })))
            .expect_err("missing offset");
        assert!(matches!(
            err,
            ConfigurationError::MissingParameter {
                parameter: "offset",
                ..
            }
        ));

        let with = |key: &str, value: &str| {
            let mut rule = geo(json!(0.5));
            rule[key] = json!(value);
            loader().from_value(base(json!({ "a": { "fields_score": [rule] } })))
        };

        assert!(matches!(
            with("scale", "0km"),
            Err(ConfigurationError::NonPositiveScale { .. })
        ));
        for scale in ["NaN", "inf"] {
            assert!(
                matches!(
                    with("scale", scale),
                    Err(ConfigurationError::InvalidGeoParameter {
                        parameter: "scale",
                        source: GeoParseError::InvalidDistance(_),
                        ..
                    })
                ),
                "{scale}"
            );
        }
        assert!(matches!(
            with("origin", "abc"),
            Err(ConfigurationError::InvalidGeoParameter {
                parameter: "origin",
                ..
            })
        ));
        match with("offset", "-5km") {
            Err(ConfigurationError::NegativeOffset { offset, .. }) => assert_eq!(offset, -5000.0),
            other => panic!("expected negative offset, got {other:?}"),
        }
    }

    #[test]
    fn sort_rules_validate_weight_field_and_value() {
        let sort = |rule: serde_json::Value| {
            base(json!({ "a": { "sort_base_score": 1, "sort_score": [rule] } }))
        };

        let err = loader()
            .from_value(sort(json!({ "field": "brand", "value": "x" })))
            .expect_err("missing weight");
        assert!(matches!(
            err,
            ConfigurationError::MissingParameter {
                parameter: "weight",
                ..
            }
        ));

        let err = loader()
            .from_value(sort(json!({ "weight": 1, "field": "brand", "type": "equal" })))
            .expect_err("missing value");
        assert!(matches!(
            err,
            ConfigurationError::MissingParameter {
                parameter: "value",
                ..
            }
        ));

        loader()
            .from_value(sort(json!({ "weight": 1, "type": "any" })))
            .expect("any needs nothing");
        loader()
            .from_value(sort(json!({ "weight": 1, "field": "stock", "type": "exists" })))
            .expect("exists needs no value");

        let err = loader()
            .from_value(sort(json!({ "weight": 1, "field": "brand", "type": "like", "value": "x" })))
            .expect_err("unknown type");
        assert!(matches!(err, ConfigurationError::UnknownMatchType { .. }));

        let err = loader()
            .from_value(base(json!({
                "a": { "sort_score": [{ "weight": 1, "type": "any" }] }
            })))
            .expect_err("missing base score");
        assert!(matches!(err, ConfigurationError::MissingSortBaseScore { .. }));
    }

    #[test]
    fn multi_field_rules_split_in_lock_step() {
        let rules = loader()
            .from_value(base(json!({
                "a": {
                    "sort_base_score": 1,
                    "sort_score": [{
                        "weight": 5,
                        "field": "brand&color",
                        "type": "equal&equal",
                        "value": "acme&"
                    }]
                }
            })))
            .expect_err("every equal clause needs a value");
        assert!(matches!(rules, ConfigurationError::MissingParameter { .. }));

        let rules = loader()
            .from_value(base(json!({
                "a": {
                    "sort_base_score": 1,
                    "sort_score": [{ "weight": 5, "field": "dept", "value": "R&D" }]
                }
            })))
            .expect("single-field value keeps its delimiter");
        assert_eq!(
            rules.categories["a"].sort_rules[0].clauses[0].value.as_deref(),
            Some("R&D")
        );

        let rules = loader()
            .from_value(base(json!({
                "a": {
                    "sort_base_score": 1,
                    "sort_score": [{
                        "weight": 5,
                        "field": "brand&color",
                        "type": "equal&not",
                        "value": "acme&red"
                    }]
                }
            })))
            .expect("multi-field rule loads");
        let clauses = &rules.categories["a"].sort_rules[0].clauses;
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[1].field.as_deref(), Some("color"));
        assert_eq!(clauses[1].kind, MatchKind::Not);
        assert_eq!(clauses[1].value.as_deref(), Some("red"));

        let err = loader()
            .from_value(base(json!({
                "a": {
                    "sort_base_score": 1,
                    "sort_score": [{
                        "weight": 5, "field": "brand&color", "type": "equal", "value": "acme&red"
                    }]
                }
            })))
            .expect_err("type list shorter than fields");
        assert!(matches!(err, ConfigurationError::ComponentMismatch { .. }));
    }

    #[test]
    fn duplicate_codes_follow_policy() {
        let config = base(json!({
            "a,b": { "fields_score": [price_rule()] },
            "b,c": { "fields_score": [{ "field": "rating", "factor": 1, "modifier": "none" }] }
        }));

        let err = loader()
            .from_value(config.clone())
            .expect_err("duplicate rejected");
        assert!(matches!(
            err,
            ConfigurationError::DuplicateCategoryCode { ref code } if code == "b"
        ));

        let lenient = RuleSetLoader::new(LoaderOptions {
            duplicate_codes: DuplicateCodePolicy::LastWins,
            ..LoaderOptions::default()
        });
        let rules = lenient.from_value(config).expect("last wins");
        assert_eq!(rules.categories["b"].field_rules[0].field, "rating");
        assert_eq!(rules.categories["a"].field_rules[0].field, "price");
    }

    #[test]
    fn malformed_json_is_a_configuration_error() {
        let err = loader().from_json_str("{ not json").expect_err("bad json");
        assert!(matches!(err, ConfigurationError::Json(_)));
    }
}

pub mod geo;
pub mod loader;

use geo::GeoPoint;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Category field used when the configuration does not name one.
pub const DEFAULT_CATEGORY_FIELD: &str = "categoryCode.keyword";

/// Joins the component fields, types and values of a multi-field sort rule.
pub const MULTI_FIELD_DELIMITER: char = '&';

/// Compiled rules for one scoring query.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    pub func_score_factor: f64,
    pub original_score_factor: f64,
    pub category_field: String,
    pub categories: HashMap<String, Arc<CategoryRules>>,
}

impl RuleSet {
    /// Looks up the rules registered for a category code. The code must match exactly.
    pub fn resolve(&self, category_code: &str) -> Option<&CategoryRules> {
        self.categories.get(category_code).map(Arc::as_ref)
    }

    /// Every field the rule set reads, mapped to whether a value is mandatory.
    ///
    /// The category field is always mandatory. A field rule marks its field mandatory
    /// only when it is required and has no fallback; sort rule fields never are.
    pub fn required_fields(&self) -> BTreeMap<String, bool> {
        let mut fields = BTreeMap::new();
        for rules in self.categories.values() {
            for rule in &rules.field_rules {
                let mandatory = rule.require && rule.missing.is_none();
                let entry = fields.entry(rule.field.clone()).or_insert(false);
                *entry |= mandatory;
            }
            for rule in &rules.sort_rules {
                for clause in &rule.clauses {
                    if let Some(field) = &clause.field {
                        fields.entry(field.clone()).or_insert(false);
                    }
                }
            }
        }
        fields.insert(self.category_field.clone(), true);
        fields
    }
}

/// Rules applied to documents of one category (possibly several alias codes).
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRules {
    pub name: String,
    pub field_mode: FieldMode,
    pub field_rules: Vec<FieldRule>,
    pub sort_mode: SortMode,
    pub sort_base_score: Option<f64>,
    pub sort_rules: Vec<SortRule>,
}

impl CategoryRules {
    /// Builds the category, ordering sort rules by priority once.
    pub fn new(
        name: impl Into<String>,
        field_mode: FieldMode,
        field_rules: Vec<FieldRule>,
        sort_mode: SortMode,
        sort_base_score: Option<f64>,
        mut sort_rules: Vec<SortRule>,
    ) -> Self {
        sort_mode.order(&mut sort_rules);
        Self {
            name: name.into(),
            field_mode,
            field_rules,
            sort_mode,
            sort_base_score,
            sort_rules,
        }
    }
}

/// Strategy for folding field scores into one total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldMode {
    #[default]
    Sum,
    Mult,
    Max,
    Min,
}

impl FieldMode {
    pub fn label(&self) -> &'static str {
        match self {
            FieldMode::Sum => "sum",
            FieldMode::Mult => "mult",
            FieldMode::Max => "max",
            FieldMode::Min => "min",
        }
    }

    /// Strict parse; the loader decides what to do with unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "sum" => Some(FieldMode::Sum),
            "mult" => Some(FieldMode::Mult),
            "max" => Some(FieldMode::Max),
            "min" => Some(FieldMode::Min),
            _ => None,
        }
    }
}

/// Direction in which sort rules are prioritised by weight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortMode {
    #[default]
    Max,
    Min,
}

impl SortMode {
    pub fn label(&self) -> &'static str {
        match self {
            SortMode::Max => "max",
            SortMode::Min => "min",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "max" => Some(SortMode::Max),
            "min" => Some(SortMode::Min),
            _ => None,
        }
    }

    /// Stable sort: rules sharing a weight keep their declaration order.
    fn order(&self, rules: &mut [SortRule]) {
        match self {
            SortMode::Max => rules.sort_by(|a, b| b.weight.cmp(&a.weight)),
            SortMode::Min => rules.sort_by(|a, b| a.weight.cmp(&b.weight)),
        }
    }
}

/// How one field's value turns into a numeric contribution.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub field: String,
    pub factor: f64,
    pub modifier: Modifier,
    pub weight: f64,
    pub add_num: f64,
    pub missing: Option<MissingValue>,
    pub require: bool,
}

impl FieldRule {
    /// Rule with the default weight (1), offset (0) and no missing-value policy.
    pub fn new(field: impl Into<String>, factor: f64, modifier: Modifier) -> Self {
        Self {
            field: field.into(),
            factor,
            modifier,
            weight: 1.0,
            add_num: 0.0,
            missing: None,
            require: false,
        }
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn add_num(mut self, add_num: f64) -> Self {
        self.add_num = add_num;
        self
    }

    pub fn required(mut self, missing: Option<MissingValue>) -> Self {
        self.require = true;
        self.missing = missing;
        self
    }
}

/// Fallback substituted for a required field that has no value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MissingValue {
    Scalar(f64),
    Point(GeoPoint),
}

impl fmt::Display for MissingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingValue::Scalar(value) => write!(f, "{value}"),
            MissingValue::Point(point) => write!(f, "{point}"),
        }
    }
}

/// Transform applied to a raw field value before weighting.
#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    Scalar(ScalarModifier),
    DecayGeoExp(GeoDecay),
}

impl Modifier {
    pub fn label(&self) -> &'static str {
        match self {
            Modifier::Scalar(modifier) => modifier.label(),
            Modifier::DecayGeoExp(_) => "decaygeoexp",
        }
    }
}

impl From<ScalarModifier> for Modifier {
    fn from(value: ScalarModifier) -> Self {
        Modifier::Scalar(value)
    }
}

/// Closed set of single-value numeric transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarModifier {
    None,
    Log,
    Log1p,
    Log2p,
    Ln,
    Ln1p,
    Ln2p,
    Square,
    Sqrt,
    Reciprocal,
}

impl ScalarModifier {
    pub const ALL: [ScalarModifier; 10] = [
        ScalarModifier::None,
        ScalarModifier::Log,
        ScalarModifier::Log1p,
        ScalarModifier::Log2p,
        ScalarModifier::Ln,
        ScalarModifier::Ln1p,
        ScalarModifier::Ln2p,
        ScalarModifier::Square,
        ScalarModifier::Sqrt,
        ScalarModifier::Reciprocal,
    ];

    /// Domain errors (log of non-positive, division by zero) surface as non-finite values.
    pub fn apply(&self, n: f64) -> f64 {
        match self {
            ScalarModifier::None => n,
            ScalarModifier::Log => n.log10(),
            ScalarModifier::Log1p => (n + 1.0).log10(),
            ScalarModifier::Log2p => (n + 2.0).log10(),
            ScalarModifier::Ln => n.ln(),
            ScalarModifier::Ln1p => n.ln_1p(),
            ScalarModifier::Ln2p => (n + 1.0).ln_1p(),
            ScalarModifier::Square => n.powi(2),
            ScalarModifier::Sqrt => n.sqrt(),
            ScalarModifier::Reciprocal => 1.0 / n,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScalarModifier::None => "none",
            ScalarModifier::Log => "log",
            ScalarModifier::Log1p => "log1p",
            ScalarModifier::Log2p => "log2p",
            ScalarModifier::Ln => "ln",
            ScalarModifier::Ln1p => "ln1p",
            ScalarModifier::Ln2p => "ln2p",
            ScalarModifier::Square => "square",
            ScalarModifier::Sqrt => "sqrt",
            ScalarModifier::Reciprocal => "reciprocal",
        }
    }
}

/// Parameters of the geodesic exponential decay, distances in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoDecay {
    pub origin: GeoPoint,
    pub scale: f64,
    pub offset: f64,
    pub decay: f64,
}

impl GeoDecay {
    /// `exp(ln(decay) / scale * max(0, distance - offset))`, in `(0, 1]`.
    pub fn apply(&self, point: &GeoPoint) -> f64 {
        let distance = self.origin.arc_distance(point);
        self.apply_distance(distance)
    }

    pub fn apply_distance(&self, distance: f64) -> f64 {
        let effective = (distance - self.offset).max(0.0);
        let lambda = self.decay.ln() / self.scale;
        (lambda * effective).exp()
    }
}

/// Categorical condition awarding `weight * sort_base_score` when it matches.
#[derive(Debug, Clone, PartialEq)]
pub struct SortRule {
    pub weight: i32,
    pub clauses: Vec<MatchClause>,
}

impl SortRule {
    pub fn new(weight: i32, clauses: Vec<MatchClause>) -> Self {
        Self { weight, clauses }
    }

    /// Human readable condition, e.g. `brand = acme & stock exists`.
    pub fn condition(&self) -> String {
        self.clauses
            .iter()
            .map(MatchClause::describe)
            .collect::<Vec<_>>()
            .join(" & ")
    }
}

/// One positional component of a sort rule.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchClause {
    pub field: Option<String>,
    pub kind: MatchKind,
    pub value: Option<String>,
}

impl MatchClause {
    pub fn new(field: impl Into<String>, kind: MatchKind, value: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            kind,
            value: Some(value.into()),
        }
    }

    pub fn any() -> Self {
        Self {
            field: None,
            kind: MatchKind::Any,
            value: None,
        }
    }

    pub fn describe(&self) -> String {
        let field = self.field.as_deref().unwrap_or("*");
        let value = self.value.as_deref().unwrap_or("");
        match self.kind {
            MatchKind::Any => "any".to_string(),
            MatchKind::Equal => format!("{field} = {value}"),
            MatchKind::Not => format!("{field} != {value}"),
            MatchKind::Exists => format!("{field} exists"),
            MatchKind::NotExists => format!("{field} not exists"),
            MatchKind::In => format!("{field} in '{value}'"),
            MatchKind::NotIn => format!("{field} not in '{value}'"),
        }
    }
}

/// Comparison performed by a match clause against a field's value set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Equal,
    Not,
    Any,
    Exists,
    NotExists,
    In,
    NotIn,
}

impl MatchKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "equal" => Some(MatchKind::Equal),
            "not" => Some(MatchKind::Not),
            "any" => Some(MatchKind::Any),
            "exists" => Some(MatchKind::Exists),
            "not_exists" => Some(MatchKind::NotExists),
            "in" => Some(MatchKind::In),
            "not_in" => Some(MatchKind::NotIn),
            _ => None,
        }
    }

    pub fn needs_field(&self) -> bool {
        !matches!(self, MatchKind::Any)
    }

    pub fn needs_value(&self) -> bool {
        !matches!(
            self,
            MatchKind::Any | MatchKind::Exists | MatchKind::NotExists
        )
    }
}

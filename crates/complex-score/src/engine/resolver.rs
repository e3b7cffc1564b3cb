use crate::provider::{DocId, FieldAccessError, FieldValueProvider};
use crate::rules::{CategoryRules, RuleSet};
use tracing::debug;

/// First value of the document's category field.
pub fn category_code<P: FieldValueProvider + ?Sized>(
    provider: &P,
    rule_set: &RuleSet,
    doc: DocId,
) -> Result<Option<String>, FieldAccessError> {
    let values = provider.multi(&rule_set.category_field, doc)?;
    Ok(values.and_then(|values| values.into_iter().next()))
}

/// Rules for the code, or `None` when the document must pass through.
pub fn resolve<'a>(rule_set: &'a RuleSet, category_code: Option<&str>) -> Option<&'a CategoryRules> {
    let code = category_code?;
    let resolved = rule_set.resolve(code);
    if resolved.is_none() {
        debug!(category_code = code, "no rules for category code, passing through");
    }
    resolved
}

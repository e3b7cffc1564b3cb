use serde_json::json;

use super::common::*;

#[test]
fn explanation_is_descriptive_only() {
    let engine = engine(phones_config());
    let store = store(json!([
        {
            "id": "zen-blue",
            "fields": {
                "categoryCode.keyword": "mobiles",
                "sales": 9, "rating": 4, "brand": "zen", "color": "blue"
            }
        }
    ]));

    let scored = engine.score(&store, 0, 4.0).expect("scored");
    let explained = engine.explain(&store, 0, 4.0).expect("explained");
    assert_eq!(scored.score, explained.score);

    let explanation = explained.explanation.expect("explanation attached");
    assert_eq!(explanation.label, "complex score");
    assert_eq!(explanation.value, explained.score);
    assert!(explanation.detail.contains("= 1 * 8 + 0.5 * 4 + 30"));

    let fields = &explanation.children[0];
    assert_eq!(fields.label, "field score total");
    assert!(fields.detail.contains("field_mode [sum]"));
    assert_eq!(fields.children.len(), 3);
    assert_eq!(fields.children[0].label, "field [sales]");
    assert_eq!(fields.children[0].detail, "(0 + 1 * log1p(9)) * 1");
    assert!(fields.children[2].detail.ends_with("missing value substituted"));

    let sort = &explanation.children[1];
    assert_eq!(sort.value, 30.0);
    assert!(sort.detail.contains("brand = zen & color != red"));
}

#[test]
fn nodes_flatten_in_pre_order() {
    let engine = engine(electronics_config());
    let store = store(json!([
        { "id": "tv-1", "fields": { "categoryCode.keyword": "electronics", "price": 99 } }
    ]));

    let outcome = engine.explain(&store, 0, 3.0).expect("explained");
    let explanation = outcome.explanation.expect("explanation attached");
    let nodes = explanation.nodes();

    let labels: Vec<_> = nodes.iter().map(|node| (node.depth, node.label)).collect();
    assert_eq!(
        labels,
        vec![
            (0, "complex score"),
            (1, "field score total"),
            (2, "field [price]"),
            (1, "sort score total"),
        ]
    );
    assert!(nodes[3].detail.starts_with("no sort rule matched"));

    let rendered = explanation.render();
    assert_eq!(rendered.lines().count(), 4);
    assert!(rendered.lines().nth(2).expect("field line").starts_with("    field [price]"));
}

#[test]
fn pass_through_explains_why() {
    let engine = engine(electronics_config());
    let store = store(json!([
        { "id": "none", "fields": {} },
        { "id": "garden", "fields": { "categoryCode.keyword": "garden" } }
    ]));

    let none = engine.explain(&store, 0, 2.0).expect("explained");
    let detail = none.explanation.expect("explanation").detail;
    assert!(detail.starts_with("no category code"));

    let garden = engine.explain(&store, 1, 2.0).expect("explained");
    let explanation = garden.explanation.expect("explanation");
    assert!(explanation.detail.starts_with("no rules for category [garden]"));
    assert_eq!(explanation.value, 2.0);
    assert!(explanation.children.is_empty());
}

#[test]
fn explanation_serializes_without_empty_children() {
    let engine = engine(electronics_config());
    let store = store(json!([{ "id": "none", "fields": {} }]));

    let outcome = engine.explain(&store, 0, 2.0).expect("explained");
    let value = serde_json::to_value(&outcome).expect("serializes");

    assert_eq!(value["score"], json!(2.0));
    assert!(value["category"].is_null());
    assert!(value["explanation"].get("children").is_none());
}

use serde_json::{Map, Value};

pub const DEFAULT_NAMESPACE: &str = "segway";

/// Builds the workflow input document: the selected bigWig URLs plus every extra
/// scalar parameter, all keyed under `namespace`.
pub fn make_input_json<I>(namespace: &str, bigwigs: &[String], extra: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (String, Value)>,
{
    let mut document = Map::new();
    document.insert(
        format!("{namespace}.bigwigs"),
        Value::Array(bigwigs.iter().cloned().map(Value::String).collect()),
    );
    for (key, value) in extra {
        document.insert(format!("{namespace}.{key}"), value);
    }
    document
}

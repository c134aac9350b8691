//! Top-level JSON field projection for list reads.

// std
use std::fmt;
// crates.io
use serde::{
	Deserialize, Deserializer,
	de::{MapAccess, Visitor},
};
use serde_json::value::RawValue;

/// Keep only the named top-level fields of a cached detail document.
///
/// Values are carried as raw slices, so nested structure is never re-parsed,
/// and kept fields stay in document order so a projected document serializes
/// identically whichever tier produced it. A document that fails to parse as
/// an object is passed through untouched; projection must not lose data the
/// caller could still use.
pub fn project_fields(detail: &str, fields: &[String]) -> String {
	if fields.is_empty() {
		return detail.to_owned();
	}

	match try_project(detail, fields) {
		Ok(projected) => projected,
		Err(err) => {
			tracing::warn!(error = %err, "field projection failed; returning full detail");

			detail.to_owned()
		},
	}
}

fn try_project(detail: &str, fields: &[String]) -> serde_json::Result<String> {
	let OrderedFields(entries) = serde_json::from_str(detail)?;
	let mut projected = String::with_capacity(detail.len());

	projected.push('{');

	for (key, value) in
		entries.into_iter().filter(|(key, _)| fields.iter().any(|field| field == key))
	{
		if projected.len() > 1 {
			projected.push(',');
		}

		projected.push_str(&serde_json::to_string(key)?);
		projected.push(':');
		projected.push_str(value.get());
	}

	projected.push('}');

	Ok(projected)
}

/// Top-level entries of a JSON object, in document order, values as raw
/// slices.
struct OrderedFields<'a>(Vec<(&'a str, &'a RawValue)>);
impl<'de> Deserialize<'de> for OrderedFields<'de> {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		struct OrderedFieldsVisitor;
		impl<'de> Visitor<'de> for OrderedFieldsVisitor {
			type Value = OrderedFields<'de>;

			fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
				formatter.write_str("a JSON object")
			}

			fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
			where
				A: MapAccess<'de>,
			{
				let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));

				while let Some(entry) = access.next_entry::<&str, &RawValue>()? {
					entries.push(entry);
				}

				Ok(OrderedFields(entries))
			}
		}

		deserializer.deserialize_map(OrderedFieldsVisitor)
	}
}

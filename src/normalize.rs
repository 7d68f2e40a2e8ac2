//! Flattening of entity-collection responses.
//!
//! The REST API wraps every entity in a verbose envelope, in JSON:
//!
//! ```json
//! {
//!   "TotalResults": "1",
//!   "entities": [
//!     {
//!       "Type": "defect",
//!       "Fields": [
//!         { "Name": "id", "values": [ { "value": "42" } ] },
//!         { "Name": "owner", "values": [] }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! or in XML:
//!
//! ```xml
//! <Entities TotalResults="1">
//!   <Entity Type="defect">
//!     <Fields>
//!       <Field Name="id"><Value>42</Value></Field>
//!       <Field Name="owner"/>
//!     </Fields>
//!   </Entity>
//! </Entities>
//! ```
//!
//! [`normalize_body`] turns either into a [`RecordSet`] of flat
//! [`Record`]s, each field becoming a named value. Bodies that are not an
//! entity collection are passed through untouched, as [`Payload::Raw`] for
//! JSON documents and [`Payload::Text`] for everything else.

use quick_xml::events::Event;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::ops::Deref;

const COLLECTION_MARKER: &str = "entities";
const XML_COLLECTION_ROOT: &[u8] = b"Entities";

/// A collection body carried the collection marker but could not be decoded.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    /// Malformed JSON collection.
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    /// Malformed XML collection.
    #[error("{0}")]
    Xml(#[from] quick_xml::DeError),
}

#[derive(Debug, Deserialize)]
struct RawCollection {
    #[serde(rename = "TotalResults", deserialize_with = "deserialize_count")]
    total_results: u64,
    #[serde(default)]
    entities: Vec<RawEntity>,
}

#[derive(Debug, Deserialize)]
struct RawEntity {
    #[serde(rename = "Type")]
    entity_type: String,
    #[serde(rename = "Fields", default)]
    fields: Vec<RawField>,
}

#[derive(Debug, Deserialize)]
struct RawField {
    #[serde(rename = "Name")]
    name: String,
    #[serde(default)]
    values: Vec<RawValue>,
}

#[derive(Debug, Deserialize)]
struct RawValue {
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlCollection {
    #[serde(rename = "@TotalResults", deserialize_with = "deserialize_text_count")]
    total_results: u64,
    #[serde(rename = "Entity", default)]
    entities: Vec<XmlEntity>,
}

#[derive(Debug, Deserialize)]
struct XmlEntity {
    #[serde(rename = "@Type")]
    entity_type: String,
    #[serde(rename = "Fields", default)]
    fields: Vec<XmlFields>,
}

#[derive(Debug, Deserialize)]
struct XmlFields {
    #[serde(rename = "Field", default)]
    fields: Vec<XmlField>,
}

#[derive(Debug, Deserialize)]
struct XmlField {
    #[serde(rename = "@Name")]
    name: String,
    #[serde(rename = "Value", default)]
    values: Vec<String>,
}

impl From<XmlCollection> for RawCollection {
    fn from(collection: XmlCollection) -> Self {
        let entities = collection
            .entities
            .into_iter()
            .map(|entity| RawEntity {
                entity_type: entity.entity_type,
                // only the first <Fields> block is read
                fields: entity
                    .fields
                    .into_iter()
                    .next()
                    .map(|block| block.fields)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|field| RawField {
                        name: field.name,
                        values: field
                            .values
                            .into_iter()
                            .map(|value| RawValue { value: Some(value) })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        RawCollection {
            total_results: collection.total_results,
            entities,
        }
    }
}

fn parse_count(text: &str) -> Result<u64, String> {
    text.trim()
        .parse()
        .map_err(|e| format!("invalid TotalResults {:?}: {}", text, e))
}

/// The count attribute arrives as a string in some server versions.
fn deserialize_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u64),
        Text(String),
    }

    match Count::deserialize(deserializer)? {
        Count::Number(n) => Ok(n),
        Count::Text(text) => parse_count(&text).map_err(de::Error::custom),
    }
}

fn deserialize_text_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_count(&text).map_err(de::Error::custom)
}

/// Name of the first element in `body`, or `None` if it is not XML.
fn xml_root_name(body: &str) -> Option<Vec<u8>> {
    let mut reader = quick_xml::Reader::from_str(body);
    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) | Ok(Event::Empty(element)) => {
                return Some(element.local_name().as_ref().to_vec())
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
}

fn looks_like_xml(body: &str, content_type: Option<&str>) -> bool {
    match content_type {
        Some(content_type) if content_type.contains("xml") => true,
        Some(content_type) if content_type.contains("json") => false,
        _ => body.trim_start().starts_with('<'),
    }
}

/// A response body, classified before normalization.
#[derive(Debug)]
enum RawBody {
    Collection(RawCollection),
    Json(serde_json::Value),
    Text(String),
}

impl RawBody {
    fn decode_value(value: serde_json::Value) -> serde_json::Result<Self> {
        let is_collection = value
            .as_object()
            .is_some_and(|object| object.contains_key(COLLECTION_MARKER));

        if is_collection {
            serde_json::from_value(value).map(RawBody::Collection)
        } else {
            Ok(RawBody::Json(value))
        }
    }

    fn decode(body: &str, content_type: Option<&str>) -> Result<Self, DecodeError> {
        if looks_like_xml(body, content_type) {
            if xml_root_name(body).as_deref() == Some(XML_COLLECTION_ROOT) {
                let collection: XmlCollection = quick_xml::de::from_str(body)?;
                return Ok(RawBody::Collection(collection.into()));
            }
            return Ok(RawBody::Text(body.to_string()));
        }

        match serde_json::from_str(body) {
            Ok(value) => Ok(RawBody::decode_value(value)?),
            Err(_) => Ok(RawBody::Text(body.to_string())),
        }
    }
}

/// One flattened entity.
///
/// Fields keep the order the server sent them in. A field present without a
/// value is kept and reads as `None`. Serializes as a flat JSON object with
/// a `type` member followed by one member per field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    entity_type: String,
    fields: Vec<(String, Option<String>)>,
}

impl Record {
    /// Creates a record with no fields.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            fields: Vec::new(),
        }
    }

    /// The entity type tag, e.g. `defect`.
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Returns the value of `name`, or `None` if it is missing or has no value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .and_then(|(_, value)| value.as_deref())
    }

    /// Returns `true` if the entity carried a field called `name`, valued or not.
    pub fn contains_field(&self, name: &str) -> bool {
        self.fields.iter().any(|(field, _)| field == name)
    }

    /// Sets a field, replacing an earlier field of the same name in place.
    pub fn set(&mut self, name: impl Into<String>, value: Option<String>) {
        let name = name.into();
        match self.fields.iter_mut().find(|(field, _)| *field == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Iterates over `(name, value)` pairs in source order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_deref()))
    }

    /// Number of fields on the record.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry("type", &self.entity_type)?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// An ordered list of records plus the server's total count.
///
/// `total_results` is copied from the response as-is and may differ from
/// `len()`, e.g. when the page size is smaller than the result set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSet {
    /// Total number of matching entities reported by the server.
    pub total_results: u64,
    /// The records on this page, in source order.
    pub records: Vec<Record>,
}

impl RecordSet {
    /// Creates an empty set carrying the given total.
    pub fn empty(total_results: u64) -> Self {
        Self {
            total_results,
            records: Vec::new(),
        }
    }
}

impl Deref for RecordSet {
    type Target = [Record];

    fn deref(&self) -> &Self::Target {
        &self.records
    }
}

impl IntoIterator for RecordSet {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// A normalized response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// The body was an entity collection.
    Records(RecordSet),
    /// The body was any other JSON document, returned unchanged.
    Raw(serde_json::Value),
    /// The body was neither JSON nor an entity collection, returned unchanged.
    Text(String),
}

impl Payload {
    /// Returns the records if this was a collection response.
    pub fn as_records(&self) -> Option<&RecordSet> {
        match self {
            Payload::Records(records) => Some(records),
            _ => None,
        }
    }

    /// Consumes the payload, returning the records if this was a collection response.
    pub fn into_records(self) -> Option<RecordSet> {
        match self {
            Payload::Records(records) => Some(records),
            _ => None,
        }
    }

    /// Returns the untouched document if this was a non-collection JSON response.
    pub fn as_raw(&self) -> Option<&serde_json::Value> {
        match self {
            Payload::Raw(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the untouched body if it was neither JSON nor a collection.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Normalizes a parsed JSON body.
///
/// # Errors
///
/// Fails when the body carries the collection marker but not the expected
/// shape, or when the total count is not an integer.
///
/// # Examples
///
/// ```
/// use qcrest::normalize::{normalize, Payload};
/// use serde_json::json;
///
/// let body = json!({
///     "TotalResults": "1",
///     "entities": [
///         { "Type": "defect", "Fields": [ { "Name": "id", "values": [ { "value": "7" } ] } ] }
///     ]
/// });
///
/// let records = normalize(body).unwrap().into_records().unwrap();
/// assert_eq!(records.total_results, 1);
/// assert_eq!(records[0].entity_type(), "defect");
/// assert_eq!(records[0].get("id"), Some("7"));
///
/// let other = json!({"version": "12.55"});
/// assert_eq!(normalize(other.clone()).unwrap(), Payload::Raw(other));
/// ```
pub fn normalize(value: serde_json::Value) -> serde_json::Result<Payload> {
    Ok(into_payload(RawBody::decode_value(value)?))
}

/// Normalizes a raw response body, JSON or XML.
///
/// XML is assumed when `content_type` mentions `xml`, or when there is no
/// content type and the body starts with `<`. Only an `<Entities>` root or a
/// JSON object with an `entities` member is treated as a collection.
///
/// # Errors
///
/// Fails only for collection bodies that are malformed or carry a
/// non-integer count.
///
/// # Examples
///
/// ```
/// use qcrest::normalize::{normalize_body, Payload};
///
/// let xml = r#"<Entities TotalResults="1">
///   <Entity Type="defect"><Fields><Field Name="id"><Value>7</Value></Field></Fields></Entity>
/// </Entities>"#;
///
/// let records = normalize_body(xml, Some("application/xml")).unwrap().into_records().unwrap();
/// assert_eq!(records[0].get("id"), Some("7"));
///
/// assert_eq!(normalize_body("OK", None).unwrap(), Payload::Text("OK".to_string()));
/// ```
pub fn normalize_body(body: &str, content_type: Option<&str>) -> Result<Payload, DecodeError> {
    Ok(into_payload(RawBody::decode(body, content_type)?))
}

fn into_payload(body: RawBody) -> Payload {
    match body {
        RawBody::Collection(collection) => Payload::Records(flatten(collection)),
        RawBody::Json(value) => Payload::Raw(value),
        RawBody::Text(text) => Payload::Text(text),
    }
}

fn flatten(collection: RawCollection) -> RecordSet {
    if collection.total_results == 0 {
        return RecordSet::empty(0);
    }

    let records = collection
        .entities
        .into_iter()
        .map(|entity| {
            let mut record = Record::new(entity.entity_type);
            for field in entity.fields {
                let value = field.values.into_iter().next().and_then(|v| v.value);
                record.set(field.name, value);
            }
            record
        })
        .collect();

    RecordSet {
        total_results: collection.total_results,
        records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(name: &str, value: Option<&str>) -> serde_json::Value {
        match value {
            Some(v) => json!({ "Name": name, "values": [ { "value": v } ] }),
            None => json!({ "Name": name, "values": [] }),
        }
    }

    #[test]
    fn test_zero_count_is_empty() {
        let body = json!({ "TotalResults": "0", "entities": [] });
        let records = normalize(body).unwrap().into_records().unwrap();
        assert!(records.is_empty());
        assert_eq!(records.total_results, 0);
    }

    #[test]
    fn test_zero_count_ignores_stray_entities() {
        let body = json!({
            "TotalResults": 0,
            "entities": [ { "Type": "defect", "Fields": [] } ]
        });
        let records = normalize(body).unwrap().into_records().unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_count_is_authoritative() {
        let body = json!({
            "TotalResults": "2",
            "entities": [ { "Type": "defect", "Fields": [ field("id", Some("1")) ] } ]
        });
        let records = normalize(body).unwrap().into_records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records.total_results, 2);
    }

    #[test]
    fn test_field_without_value_is_none() {
        let body = json!({
            "TotalResults": "1",
            "entities": [ { "Type": "defect", "Fields": [ field("owner", None) ] } ]
        });
        let records = normalize(body).unwrap().into_records().unwrap();
        assert!(records[0].contains_field("owner"));
        assert_eq!(records[0].get("owner"), None);

        let json = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(json, json!({ "type": "defect", "owner": null }));
    }

    #[test]
    fn test_value_object_without_value_member() {
        let body = json!({
            "TotalResults": 1,
            "entities": [ { "Type": "test", "Fields": [ { "Name": "x", "values": [ {} ] } ] } ]
        });
        let records = normalize(body).unwrap().into_records().unwrap();
        assert!(records[0].contains_field("x"));
        assert_eq!(records[0].get("x"), None);
    }

    #[test]
    fn test_order_is_preserved() {
        let body = json!({
            "TotalResults": "3",
            "entities": [
                { "Type": "defect", "Fields": [ field("id", Some("3")), field("name", Some("c")) ] },
                { "Type": "defect", "Fields": [ field("id", Some("1")) ] },
                { "Type": "requirement", "Fields": [ field("id", Some("2")) ] }
            ]
        });
        let records = normalize(body).unwrap().into_records().unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.get("id").unwrap()).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
        assert_eq!(records[2].entity_type(), "requirement");

        let names: Vec<_> = records[0].fields().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["id", "name"]);
    }

    #[test]
    fn test_non_collection_passes_through() {
        for body in [json!({ "Version": "12" }), json!([1, 2]), json!("text"), json!(null)] {
            assert_eq!(normalize(body.clone()).unwrap(), Payload::Raw(body));
        }
    }

    #[test]
    fn test_bad_count_is_an_error() {
        let body = json!({ "TotalResults": "many", "entities": [] });
        let err = normalize(body).unwrap_err();
        assert!(err.to_string().contains("TotalResults"));
    }

    #[test]
    fn test_xml_collection_is_flattened() {
        let body = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Entities TotalResults="3">
  <Entity Type="defect">
    <ChildrenCount><Value>0</Value></ChildrenCount>
    <Fields>
      <Field Name="id"><Value>12</Value></Field>
      <Field Name="owner"/>
      <Field Name="name"><Value>Crash on save</Value></Field>
    </Fields>
    <RelatedEntities/>
  </Entity>
  <Entity Type="defect">
    <Fields>
      <Field Name="id"><Value>7</Value></Field>
    </Fields>
  </Entity>
</Entities>"#;

        let records = normalize_body(body, Some("application/xml;charset=UTF-8"))
            .unwrap()
            .into_records()
            .unwrap();

        assert_eq!(records.total_results, 3);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].entity_type(), "defect");
        assert_eq!(records[0].get("id"), Some("12"));
        assert!(records[0].contains_field("owner"));
        assert_eq!(records[0].get("owner"), None);
        assert_eq!(records[0].get("name"), Some("Crash on save"));
        assert_eq!(records[1].get("id"), Some("7"));
    }

    #[test]
    fn test_xml_zero_count_is_empty() {
        let records = normalize_body(r#"<Entities TotalResults="0"/>"#, None)
            .unwrap()
            .into_records()
            .unwrap();
        assert!(records.is_empty());
        assert_eq!(records.total_results, 0);
    }

    #[test]
    fn test_xml_bad_count_is_an_error() {
        let result = normalize_body(r#"<Entities TotalResults="lots"/>"#, Some("application/xml"));
        assert!(matches!(result, Err(DecodeError::Xml(_))));
    }

    #[test]
    fn test_other_xml_passes_through_as_text() {
        let body = r#"<SiteVersion><MajorVersion>12</MajorVersion></SiteVersion>"#;
        assert_eq!(
            normalize_body(body, Some("application/xml")).unwrap(),
            Payload::Text(body.to_string())
        );
    }

    #[test]
    fn test_non_json_bodies_pass_through_as_text() {
        for body in ["", "OK", "not { json"] {
            assert_eq!(
                normalize_body(body, Some("application/json")).unwrap(),
                Payload::Text(body.to_string())
            );
        }
    }

    #[test]
    fn test_malformed_json_collection_is_an_error() {
        let result = normalize_body(r#"{"TotalResults": "1", "entities": "nope"}"#, None);
        assert!(matches!(result, Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_record_set_serializes_total() {
        let set = RecordSet::empty(0);
        assert_eq!(
            serde_json::to_value(&set).unwrap(),
            json!({ "totalResults": 0, "records": [] })
        );
    }
}

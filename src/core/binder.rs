//! Binds a value tree onto typed destinations with case-insensitive field matching.
//!
//! `serde_json` can already deserialize a `Value` into any `DeserializeOwned`
//! type, but it matches keys exactly. Configuration files written as
//! `{"Address": "localhost", "Port": 80}` should still fill a struct with
//! `address` and `port` fields, so this deserializer wraps the tree and maps
//! incoming keys onto the names serde asks for.
//!
//! Key handling depends on what the destination asks for:
//!
//! - structs and enum variants: exact name first, then ASCII case-insensitive
//! - plain maps (`HashMap`, `BTreeMap`, `#[serde(flatten)]` containers): keys as written
//! - self-describing targets (`#[serde(untagged)]` and internally tagged
//!   enums, `serde_json::Value`): keys lowercased, since serde buffers the
//!   content before the field names are known
//!
//! When two keys fold to the same name, the one matching exactly wins and the
//! other is ignored.

use serde::de::value::{BorrowedStrDeserializer, CowStrDeserializer};
use serde::de::{self, DeserializeSeed, EnumAccess, MapAccess, SeqAccess, Unexpected, VariantAccess, Visitor};
use serde::forward_to_deserialize_any;
use serde_json::{Error, Map, Value};
use std::borrow::Cow;

/// A `Deserializer` over a borrowed value tree.
pub(crate) struct Binder<'de> {
    value: &'de Value,
}

impl<'de> Binder<'de> {
    pub(crate) fn new(value: &'de Value) -> Self {
        Self { value }
    }
}

/// Pick the declared name matching `key`: exact match first, then ASCII
/// case-insensitive. Unknown keys pass through untouched.
fn canonical<'de>(key: &'de str, names: &'static [&'static str]) -> &'de str {
    if names.contains(&key) {
        return key;
    }
    names
        .iter()
        .find(|name| name.eq_ignore_ascii_case(key))
        .copied()
        .unwrap_or(key)
}

impl<'de> de::Deserializer<'de> for Binder<'de> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Error>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::Array(items) => visitor.visit_seq(SeqBinder {
                iter: items.iter(),
            }),
            Value::Object(map) => visitor.visit_map(MapBinder::new(map, KeyMode::Lowercase)),
            scalar => de::Deserializer::deserialize_any(scalar, visitor),
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Error>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value, Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value, Error>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::Object(map) => visitor.visit_map(MapBinder::new(map, KeyMode::Verbatim)),
            other => de::Deserializer::deserialize_map(other, visitor),
        }
    }

    fn deserialize_struct<V>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::Object(map) => visitor.visit_map(MapBinder::new(map, KeyMode::Fields(fields))),
            Value::Array(items) => visitor.visit_seq(SeqBinder {
                iter: items.iter(),
            }),
            other => de::Deserializer::deserialize_struct(other, name, fields, visitor),
        }
    }

    fn deserialize_enum<V>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::String(s) => visitor.visit_enum(EnumBinder {
                variant: canonical(s.as_str(), variants),
                payload: None,
            }),
            Value::Object(map) => {
                let mut entries = map.iter();
                let (Some((variant, payload)), None) = (entries.next(), entries.next()) else {
                    return Err(de::Error::invalid_value(
                        Unexpected::Map,
                        &"a map with a single key",
                    ));
                };
                visitor.visit_enum(EnumBinder {
                    variant: canonical(variant.as_str(), variants),
                    payload: Some(payload),
                })
            }
            other => de::Deserializer::deserialize_enum(other, name, variants, visitor),
        }
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct identifier
        ignored_any
    }
}

struct SeqBinder<'de> {
    iter: std::slice::Iter<'de, Value>,
}

impl<'de> SeqAccess<'de> for SeqBinder<'de> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Error>
    where
        T: DeserializeSeed<'de>,
    {
        match self.iter.next() {
            Some(value) => seed.deserialize(Binder::new(value)).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

#[derive(Clone, Copy)]
enum KeyMode {
    /// Fold onto the declared struct field names.
    Fields(&'static [&'static str]),
    /// Plain map keys.
    Verbatim,
    /// Destination unknown until serde replays its buffer.
    Lowercase,
}

struct MapBinder<'de> {
    map: &'de Map<String, Value>,
    iter: serde_json::map::Iter<'de>,
    keys: KeyMode,
    pending: Option<&'de Value>,
}

impl<'de> MapBinder<'de> {
    fn new(map: &'de Map<String, Value>, keys: KeyMode) -> Self {
        Self {
            map,
            iter: map.iter(),
            keys,
            pending: None,
        }
    }

    fn fold(&self, key: &'de str) -> Cow<'de, str> {
        match self.keys {
            KeyMode::Fields(fields) => Cow::Borrowed(canonical(key, fields)),
            KeyMode::Verbatim => Cow::Borrowed(key),
            KeyMode::Lowercase if key.bytes().any(|b| b.is_ascii_uppercase()) => {
                Cow::Owned(key.to_ascii_lowercase())
            }
            KeyMode::Lowercase => Cow::Borrowed(key),
        }
    }
}

impl<'de> MapAccess<'de> for MapBinder<'de> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Error>
    where
        K: DeserializeSeed<'de>,
    {
        loop {
            let Some((key, value)) = self.iter.next() else {
                return Ok(None);
            };

            let folded = self.fold(key.as_str());
            // An exact key elsewhere in the mapping wins over a folded one
            if folded != key.as_str() && self.map.contains_key(folded.as_ref()) {
                continue;
            }

            self.pending = Some(value);
            return seed.deserialize(CowStrDeserializer::new(folded)).map(Some);
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Error>
    where
        V: DeserializeSeed<'de>,
    {
        let value = self
            .pending
            .take()
            .ok_or_else(|| de::Error::custom("map value requested before its key"))?;
        seed.deserialize(Binder::new(value))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

/// An enum written either as `"Variant"` or as `{"Variant": payload}`.
struct EnumBinder<'de> {
    variant: &'de str,
    payload: Option<&'de Value>,
}

impl<'de> EnumAccess<'de> for EnumBinder<'de> {
    type Error = Error;
    type Variant = VariantBinder<'de>;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant), Error>
    where
        V: DeserializeSeed<'de>,
    {
        let variant = seed.deserialize(BorrowedStrDeserializer::<Error>::new(self.variant))?;
        Ok((variant, VariantBinder { payload: self.payload }))
    }
}

struct VariantBinder<'de> {
    payload: Option<&'de Value>,
}

impl<'de> VariantBinder<'de> {
    fn payload(self, expected: &str) -> Result<&'de Value, Error> {
        self.payload
            .ok_or_else(|| de::Error::invalid_type(Unexpected::UnitVariant, &expected))
    }
}

impl<'de> VariantAccess<'de> for VariantBinder<'de> {
    type Error = Error;

    fn unit_variant(self) -> Result<(), Error> {
        match self.payload {
            None | Some(Value::Null) => Ok(()),
            Some(_) => Err(de::Error::invalid_type(
                Unexpected::Other("variant payload"),
                &"unit variant",
            )),
        }
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value, Error>
    where
        T: DeserializeSeed<'de>,
    {
        let payload = self.payload("newtype variant")?;
        seed.deserialize(Binder::new(payload))
    }

    fn tuple_variant<V>(self, _len: usize, visitor: V) -> Result<V::Value, Error>
    where
        V: Visitor<'de>,
    {
        let payload = self.payload("tuple variant")?;
        de::Deserializer::deserialize_seq(Binder::new(payload), visitor)
    }

    fn struct_variant<V>(self, fields: &'static [&'static str], visitor: V) -> Result<V::Value, Error>
    where
        V: Visitor<'de>,
    {
        let payload = self.payload("struct variant")?;
        de::Deserializer::deserialize_struct(Binder::new(payload), "", fields, visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::HashMap;

    fn bind<T: de::DeserializeOwned>(value: &Value) -> Result<T, Error> {
        T::deserialize(Binder::new(value))
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Server {
        address: String,
        port: u16,
    }

    #[allow(dead_code)]
    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "lowercase")]
    enum Mode {
        Primary,
        Replica,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct App {
        server: Server,
        mode: Mode,
        tags: Vec<String>,
        limits: HashMap<String, u32>,
        timeout_ms: Option<u64>,
    }

    #[test]
    fn test_case_insensitive_fields() {
        let tree = json!({"Address": "localhost", "PORT": 80});
        let server: Server = bind(&tree).unwrap();
        assert_eq!(
            server,
            Server {
                address: "localhost".to_string(),
                port: 80
            }
        );
    }

    #[test]
    fn test_nested_structs_enums_and_maps() {
        let tree = json!({
            "Server": {"Address": "db", "Port": 5432},
            "Mode": "REPLICA",
            "Tags": ["a", "b"],
            "Limits": {"Conns": 10},
            "timeout_ms": null
        });
        let app: App = bind(&tree).unwrap();
        assert_eq!(app.server.port, 5432);
        assert_eq!(app.mode, Mode::Replica);
        assert_eq!(app.tags, vec!["a", "b"]);
        // Plain map keys are not folded
        assert_eq!(app.limits.get("Conns"), Some(&10));
        assert_eq!(app.timeout_ms, None);
    }

    #[test]
    fn test_exact_match_preferred() {
        #[derive(Debug, Deserialize)]
        struct Pair {
            a: u8,
            #[serde(rename = "A")]
            upper: u8,
        }
        let pair: Pair = bind(&json!({"a": 1, "A": 2})).unwrap();
        assert_eq!((pair.a, pair.upper), (1, 2));
    }

    #[test]
    fn test_type_mismatch_is_error() {
        let tree = json!({"address": "localhost", "port": "eighty"});
        assert!(bind::<Server>(&tree).is_err());
    }

    #[test]
    fn test_out_of_range_is_error() {
        let tree = json!({"address": "localhost", "port": 70000});
        assert!(bind::<Server>(&tree).is_err());
    }

    #[test]
    fn test_missing_field_is_error() {
        let tree = json!({"address": "localhost"});
        assert!(bind::<Server>(&tree).is_err());
    }

    #[derive(Debug, Deserialize, PartialEq)]
    enum Backend {
        Tcp(Server),
        Unix { path: String },
        Disabled,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Listener {
        backend: Backend,
    }

    #[test]
    fn test_enum_variant_payloads_fold_case() {
        let tcp: Listener =
            bind(&json!({"Backend": {"TCP": {"Address": "db", "Port": 80}}})).unwrap();
        assert_eq!(
            tcp.backend,
            Backend::Tcp(Server {
                address: "db".to_string(),
                port: 80
            })
        );

        let unix: Listener = bind(&json!({"backend": {"unix": {"Path": "/tmp/app.sock"}}})).unwrap();
        assert_eq!(
            unix.backend,
            Backend::Unix {
                path: "/tmp/app.sock".to_string()
            }
        );

        let disabled: Listener = bind(&json!({"Backend": "DISABLED"})).unwrap();
        assert_eq!(disabled.backend, Backend::Disabled);
    }

    #[test]
    fn test_enum_map_with_several_keys_is_error() {
        let tree = json!({"backend": {"Tcp": {"address": "a", "port": 1}, "Disabled": null}});
        assert!(bind::<Listener>(&tree).is_err());
    }

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(untagged)]
    enum Endpoint {
        Full(Server),
        Name(String),
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Upstream {
        endpoint: Endpoint,
    }

    #[test]
    fn test_untagged_enum_folds_case() {
        let full: Upstream = bind(&json!({"Endpoint": {"Address": "db", "PORT": 80}})).unwrap();
        assert_eq!(
            full.endpoint,
            Endpoint::Full(Server {
                address: "db".to_string(),
                port: 80
            })
        );

        let name: Upstream = bind(&json!({"Endpoint": "db.internal"})).unwrap();
        assert_eq!(name.endpoint, Endpoint::Name("db.internal".to_string()));
    }

    #[test]
    fn test_exact_key_wins_over_folded_duplicate() {
        let server: Server = bind(&json!({"address": "a", "port": 1, "Port": 2})).unwrap();
        assert_eq!(server.port, 1);

        let upstream: Upstream =
            bind(&json!({"endpoint": {"address": "a", "port": 1, "PORT": 2}})).unwrap();
        assert_eq!(
            upstream.endpoint,
            Endpoint::Full(Server {
                address: "a".to_string(),
                port: 1
            })
        );
    }

    #[test]
    fn test_scalar_destination_from_mapping_is_error() {
        assert!(bind::<u32>(&json!({"port": 80})).is_err());
    }
}

//! The metadata store.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use servokit_errors::{ServoError, ServoResult};

/// Optional prefix for fully qualified keys.
///
/// `servokit:meta/servo/silent` and `servo/silent` name the same entry.
pub const META_PREFIX: &str = "servokit:meta/";

/// Validating writer for a feature or property.
///
/// Receives the new value in its string form and may update other
/// properties through the [`MetaUpdate`] (for example, a range change that
/// alters the derived precision). Returning an error leaves the stored value
/// unchanged.
pub type MetaWriter = Box<dyn Fn(&str, &mut MetaUpdate<'_>) -> ServoResult<()> + Send + Sync>;

/// Side channel that lets a [`MetaWriter`] update related properties.
#[derive(Debug)]
pub struct MetaUpdate<'a> {
    key: &'a str,
    properties: &'a mut BTreeMap<String, String>,
}

impl MetaUpdate<'_> {
    /// Key of the entry being written.
    pub fn key(&self) -> &str {
        self.key
    }

    /// Overwrite a derived property.
    pub fn set_property(&mut self, key: &str, value: impl ToString) {
        self.properties
            .insert(normalize(key).to_owned(), value.to_string());
    }
}

/// Point-in-time copy of all declared entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaSnapshot {
    /// Declared features
    pub features: BTreeMap<String, bool>,
    /// Declared properties
    pub properties: BTreeMap<String, String>,
}

/// Feature and property store.
///
/// Values may change at run time through writers, so reads return owned
/// copies and the store is shared behind an `Arc`.
pub struct Meta {
    entries: RwLock<MetaSnapshot>,
    writers: BTreeMap<String, MetaWriter>,
}

impl Meta {
    /// Start building a store.
    #[must_use]
    pub fn builder() -> MetaBuilder {
        MetaBuilder::default()
    }

    /// A store with no entries.
    #[must_use]
    pub fn empty() -> Self {
        Self::builder().build()
    }

    /// Check whether the feature is declared, regardless of its value.
    pub fn has_feature(&self, key: &str) -> bool {
        self.entries.read().features.contains_key(normalize(key))
    }

    /// Check whether the feature is declared and set to `true`.
    pub fn supports(&self, key: &str) -> bool {
        matches!(self.feature(key), Ok(true))
    }

    /// Read a feature.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedCapability` if the feature is not declared.
    pub fn feature(&self, key: &str) -> ServoResult<bool> {
        let key = normalize(key);
        self.entries
            .read()
            .features
            .get(key)
            .copied()
            .ok_or_else(|| ServoError::unsupported(key))
    }

    /// Check whether the property is declared.
    pub fn has_property(&self, key: &str) -> bool {
        self.entries.read().properties.contains_key(normalize(key))
    }

    /// Read a property.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedCapability` if the property is not declared.
    pub fn property(&self, key: &str) -> ServoResult<String> {
        let key = normalize(key);
        self.entries
            .read()
            .properties
            .get(key)
            .cloned()
            .ok_or_else(|| ServoError::unsupported(key))
    }

    /// Read a property and parse it.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedCapability` if the property is not declared, or
    /// `InvalidValue` if it does not parse as `T`.
    pub fn property_as<T>(&self, key: &str) -> ServoResult<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let raw = self.property(key)?;
        raw.trim()
            .parse::<T>()
            .map_err(|e| ServoError::invalid_value(normalize(key), raw.as_str(), e.to_string()))
    }

    /// Change a feature through its writer.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedCapability` if the feature is not declared,
    /// `ReadOnly` if it has no writer, or whatever the writer rejects the
    /// value with.
    pub fn set_feature(&self, key: &str, value: bool) -> ServoResult<()> {
        let key = normalize(key);
        let mut guard = self.entries.write();
        let entries = &mut *guard;

        if !entries.features.contains_key(key) {
            return Err(ServoError::unsupported(key));
        }
        let writer = self
            .writers
            .get(key)
            .ok_or_else(|| ServoError::read_only(key))?;

        writer(
            &value.to_string(),
            &mut MetaUpdate {
                key,
                properties: &mut entries.properties,
            },
        )?;
        entries.features.insert(key.to_owned(), value);
        tracing::debug!(key, value, "feature updated");
        Ok(())
    }

    /// Change a property through its writer.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedCapability` if the property is not declared,
    /// `ReadOnly` if it has no writer, or whatever the writer rejects the
    /// value with.
    pub fn set_property(&self, key: &str, value: &str) -> ServoResult<()> {
        let key = normalize(key);
        let mut guard = self.entries.write();
        let entries = &mut *guard;

        if !entries.properties.contains_key(key) {
            return Err(ServoError::unsupported(key));
        }
        let writer = self
            .writers
            .get(key)
            .ok_or_else(|| ServoError::read_only(key))?;

        writer(
            value,
            &mut MetaUpdate {
                key,
                properties: &mut entries.properties,
            },
        )?;
        entries.properties.insert(key.to_owned(), value.to_owned());
        tracing::debug!(key, value, "property updated");
        Ok(())
    }

    /// Check whether the entry accepts writes.
    pub fn is_writable(&self, key: &str) -> bool {
        self.writers.contains_key(normalize(key))
    }

    /// Copy all declared entries.
    pub fn snapshot(&self) -> MetaSnapshot {
        self.entries.read().clone()
    }
}

impl Default for Meta {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read();
        f.debug_struct("Meta")
            .field("features", &entries.features)
            .field("properties", &entries.properties)
            .field("writable", &self.writers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`Meta`].
#[derive(Default)]
pub struct MetaBuilder {
    entries: MetaSnapshot,
    writers: BTreeMap<String, MetaWriter>,
}

impl MetaBuilder {
    /// Declare a feature.
    #[must_use]
    pub fn feature(mut self, key: &str, value: bool) -> Self {
        self.entries
            .features
            .insert(normalize(key).to_owned(), value);
        self
    }

    /// Declare a property.
    #[must_use]
    pub fn property(mut self, key: &str, value: impl ToString) -> Self {
        self.entries
            .properties
            .insert(normalize(key).to_owned(), value.to_string());
        self
    }

    /// Make an entry writable.
    #[must_use]
    pub fn writer<F>(mut self, key: &str, writer: F) -> Self
    where
        F: Fn(&str, &mut MetaUpdate<'_>) -> ServoResult<()> + Send + Sync + 'static,
    {
        self.writers
            .insert(normalize(key).to_owned(), Box::new(writer));
        self
    }

    /// Finish the store.
    #[must_use]
    pub fn build(self) -> Meta {
        Meta {
            entries: RwLock::new(self.entries),
            writers: self.writers,
        }
    }
}

impl fmt::Debug for MetaBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaBuilder")
            .field("entries", &self.entries)
            .field("writable", &self.writers.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn normalize(key: &str) -> &str {
    key.strip_prefix(META_PREFIX).unwrap_or(key)
}

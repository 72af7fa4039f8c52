use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

/// The wire marker for a metric that could not be measured.
pub const SENTINEL: &str = "n/a";

/// A measured value or an explicit "not available" marker.
///
/// Callers must be able to tell a measured zero apart from a failed read,
/// so unavailable metrics serialize as the string `"n/a"` rather than `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric<T> {
    Value(T),
    Unavailable,
}

impl<T> Metric<T> {
    /// Returns the measured value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Metric::Value(v) => Some(v),
            Metric::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Metric::Value(_))
    }

    /// Maps the measured value, preserving the sentinel.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Metric<U> {
        match self {
            Metric::Value(v) => Metric::Value(f(v)),
            Metric::Unavailable => Metric::Unavailable,
        }
    }
}

impl<T> From<Option<T>> for Metric<T> {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => Metric::Value(v),
            None => Metric::Unavailable,
        }
    }
}

impl<T: Serialize> Serialize for Metric<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Metric::Value(v) => v.serialize(serializer),
            Metric::Unavailable => serializer.serialize_str(SENTINEL),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Metric<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum Repr<T> {
            Value(T),
            Marker(String),
        }

        match Repr::<T>::deserialize(deserializer)? {
            Repr::Value(v) => Ok(Metric::Value(v)),
            Repr::Marker(s) if s == SENTINEL => Ok(Metric::Unavailable),
            Repr::Marker(other) => Err(de::Error::custom(format!(
                "expected a value or \"{SENTINEL}\", got \"{other}\""
            ))),
        }
    }
}

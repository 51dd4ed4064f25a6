//! Property values with representation-independent equality and hashing.
//!
//! Numeric values compare by magnitude regardless of width, so a `ShortArray`
//! holding `[1, 2]` equals a `LongArray` holding `[1, 2]` and both hash the
//! same. Array payloads live in owned, immutable buffers; [`DefinedProperty::value`]
//! always hands out a fresh copy while [`DefinedProperty::value_ref`] lends a view.

use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::types::PropId;

const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_TEXT: u8 = 4;
const TAG_ARRAY: u8 = 5;

/// Property payload.
#[derive(Clone, Debug)]
pub enum Value {
    /// Boolean.
    Bool(bool),
    /// 8-bit signed integer.
    Byte(i8),
    /// 16-bit signed integer.
    Short(i16),
    /// 32-bit signed integer.
    Int(i32),
    /// 64-bit signed integer.
    Long(i64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// Single character.
    Char(char),
    /// Owned string.
    Str(String),
    /// Boolean array.
    BoolArray(Box<[bool]>),
    /// Byte array.
    ByteArray(Box<[i8]>),
    /// Short array.
    ShortArray(Box<[i16]>),
    /// Int array.
    IntArray(Box<[i32]>),
    /// Long array.
    LongArray(Box<[i64]>),
    /// Float array.
    FloatArray(Box<[f32]>),
    /// Double array.
    DoubleArray(Box<[f64]>),
    /// Char array.
    CharArray(Box<[char]>),
    /// String array.
    StrArray(Box<[String]>),
}

/// Normalised view of a scalar used for cross-representation comparison.
#[derive(Clone, Copy, Debug)]
enum Scalar<'a> {
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(&'a str),
}

impl Scalar<'_> {
    fn equals(self, other: Scalar<'_>) -> bool {
        match (self, other) {
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            (Scalar::Int(a), Scalar::Int(b)) => a == b,
            (Scalar::Float(a), Scalar::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Scalar::Int(i), Scalar::Float(f)) | (Scalar::Float(f), Scalar::Int(i)) => {
                integral_f64(f) == Some(i)
            }
            (Scalar::Char(a), Scalar::Char(b)) => a == b,
            (Scalar::Str(a), Scalar::Str(b)) => a == b,
            (Scalar::Char(c), Scalar::Str(s)) | (Scalar::Str(s), Scalar::Char(c)) => {
                single_char(s) == Some(c)
            }
            _ => false,
        }
    }

    fn hash_into<H: Hasher>(self, state: &mut H) {
        match self {
            Scalar::Bool(v) => {
                state.write_u8(TAG_BOOL);
                state.write_u8(v as u8);
            }
            Scalar::Int(v) => {
                state.write_u8(TAG_INT);
                state.write_i64(v);
            }
            Scalar::Float(v) => match integral_f64(v) {
                Some(i) => Scalar::Int(i).hash_into(state),
                None => {
                    state.write_u8(TAG_FLOAT);
                    let bits = if v.is_nan() { f64::NAN.to_bits() } else { v.to_bits() };
                    state.write_u64(bits);
                }
            },
            Scalar::Char(c) => {
                let mut buf = [0u8; 4];
                Scalar::Str(c.encode_utf8(&mut buf)).hash_into(state);
            }
            Scalar::Str(s) => {
                state.write_u8(TAG_TEXT);
                state.write_usize(s.len());
                state.write(s.as_bytes());
            }
        }
    }
}

impl fmt::Display for Scalar<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Scalar::Bool(v) => write!(f, "{v}"),
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Float(v) => match integral_f64(v) {
                Some(i) => write!(f, "{i}"),
                None => write!(f, "{v}"),
            },
            Scalar::Char(c) => write!(f, "{c}"),
            Scalar::Str(s) => f.write_str(s),
        }
    }
}

fn integral_f64(v: f64) -> Option<i64> {
    // i64::MAX is not representable as f64; the bound below is 2^63.
    if v.is_finite() && v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

impl Value {
    fn scalar(&self) -> Option<Scalar<'_>> {
        Some(match self {
            Value::Bool(v) => Scalar::Bool(*v),
            Value::Byte(v) => Scalar::Int(i64::from(*v)),
            Value::Short(v) => Scalar::Int(i64::from(*v)),
            Value::Int(v) => Scalar::Int(i64::from(*v)),
            Value::Long(v) => Scalar::Int(*v),
            Value::Float(v) => Scalar::Float(f64::from(*v)),
            Value::Double(v) => Scalar::Float(*v),
            Value::Char(v) => Scalar::Char(*v),
            Value::Str(v) => Scalar::Str(v.as_str()),
            _ => return None,
        })
    }

    /// Returns the element count for array values, `None` for scalars.
    pub fn array_len(&self) -> Option<usize> {
        Some(match self {
            Value::BoolArray(v) => v.len(),
            Value::ByteArray(v) => v.len(),
            Value::ShortArray(v) => v.len(),
            Value::IntArray(v) => v.len(),
            Value::LongArray(v) => v.len(),
            Value::FloatArray(v) => v.len(),
            Value::DoubleArray(v) => v.len(),
            Value::CharArray(v) => v.len(),
            Value::StrArray(v) => v.len(),
            _ => return None,
        })
    }

    fn element(&self, idx: usize) -> Option<Scalar<'_>> {
        Some(match self {
            Value::BoolArray(v) => Scalar::Bool(*v.get(idx)?),
            Value::ByteArray(v) => Scalar::Int(i64::from(*v.get(idx)?)),
            Value::ShortArray(v) => Scalar::Int(i64::from(*v.get(idx)?)),
            Value::IntArray(v) => Scalar::Int(i64::from(*v.get(idx)?)),
            Value::LongArray(v) => Scalar::Int(*v.get(idx)?),
            Value::FloatArray(v) => Scalar::Float(f64::from(*v.get(idx)?)),
            Value::DoubleArray(v) => Scalar::Float(*v.get(idx)?),
            Value::CharArray(v) => Scalar::Char(*v.get(idx)?),
            Value::StrArray(v) => Scalar::Str(v.get(idx)?.as_str()),
            _ => return None,
        })
    }

    /// Structural equality across physical representations.
    ///
    /// Scalars compare by logical value (numbers by magnitude, a `Char` equals a
    /// one-character `Str`); arrays compare element-wise with the same rules.
    /// Scalars never equal arrays.
    pub fn equals(&self, other: &Value) -> bool {
        if let (Some(a), Some(b)) = (self.scalar(), other.scalar()) {
            return a.equals(b);
        }
        match (self.array_len(), other.array_len()) {
            (Some(len), Some(other_len)) if len == other_len => (0..len).all(|idx| {
                match (self.element(idx), other.element(idx)) {
                    (Some(a), Some(b)) => a.equals(b),
                    _ => false,
                }
            }),
            _ => false,
        }
    }

    /// Feeds a representation-independent encoding into `state`.
    ///
    /// Values that are [`Value::equals`] produce identical input.
    pub fn hash_canonical<H: Hasher>(&self, state: &mut H) {
        if let Some(scalar) = self.scalar() {
            scalar.hash_into(state);
            return;
        }
        let len = self.array_len().unwrap_or(0);
        state.write_u8(TAG_ARRAY);
        state.write_usize(len);
        for idx in 0..len {
            if let Some(elem) = self.element(idx) {
                elem.hash_into(state);
            }
        }
    }

    /// Hash consistent with [`Value::equals`].
    pub fn canonical_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.hash_canonical(&mut hasher);
        hasher.finish()
    }

    /// Text rendering shared by every value that [`Value::equals`] this one.
    ///
    /// Integral floats render as integers, so `-0.0`, `0.0` and `0` agree.
    pub fn canonical_text(&self) -> String {
        if let Some(scalar) = self.scalar() {
            return scalar.to_string();
        }
        let len = self.array_len().unwrap_or(0);
        let items: Vec<String> = (0..len)
            .filter_map(|idx| self.element(idx).map(|elem| elem.to_string()))
            .collect();
        format!("[{}]", items.join(", "))
    }

    /// Returns `true` when both values use the same variant.
    pub fn same_variant(&self, other: &Value) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash_canonical(state);
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    f.write_str("[")?;
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str("]")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Byte(v) => write!(f, "{v}"),
            Value::Short(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Char(v) => write!(f, "{v}"),
            Value::Str(v) => f.write_str(v),
            Value::BoolArray(v) => write_list(f, v),
            Value::ByteArray(v) => write_list(f, v),
            Value::ShortArray(v) => write_list(f, v),
            Value::IntArray(v) => write_list(f, v),
            Value::LongArray(v) => write_list(f, v),
            Value::FloatArray(v) => write_list(f, v),
            Value::DoubleArray(v) => write_list(f, v),
            Value::CharArray(v) => write_list(f, v),
            Value::StrArray(v) => write_list(f, v),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

macro_rules! array_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Vec<$ty>> for Value {
                fn from(value: Vec<$ty>) -> Self {
                    Value::$variant(value.into_boxed_slice())
                }
            }

            impl From<&[$ty]> for Value {
                fn from(value: &[$ty]) -> Self {
                    Value::$variant(value.to_vec().into_boxed_slice())
                }
            }
        )*
    };
}

value_from!(
    bool => Bool,
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    char => Char,
    String => Str,
);

array_from!(
    bool => BoolArray,
    i8 => ByteArray,
    i16 => ShortArray,
    i32 => IntArray,
    i64 => LongArray,
    f32 => FloatArray,
    f64 => DoubleArray,
    char => CharArray,
    String => StrArray,
);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_owned())
    }
}

/// A property key paired with a value that is known to exist.
///
/// Storage writes only ever accept defined properties.
#[derive(Clone, Debug)]
pub struct DefinedProperty {
    key: PropId,
    value: Value,
}

impl DefinedProperty {
    /// Creates a property for `key` holding `value`.
    pub fn new(key: PropId, value: impl Into<Value>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }

    /// Property key id.
    pub fn key(&self) -> PropId {
        self.key
    }

    /// Returns a fresh copy of the payload; mutating it never affects this property.
    pub fn value(&self) -> Value {
        self.value.clone()
    }

    /// Borrowed view of the payload.
    pub fn value_ref(&self) -> &Value {
        &self.value
    }

    /// Compares the payload against `other`, ignoring the key.
    pub fn value_equals(&self, other: &Value) -> bool {
        if self.value.same_variant(other) {
            return self.same_variant_equals(other);
        }
        self.value.equals(other)
    }

    /// Hash of the payload, consistent with [`DefinedProperty::value_equals`].
    pub fn value_hash(&self) -> u64 {
        self.value.canonical_hash()
    }

    /// Fast path for comparing two properties with the same physical representation.
    ///
    /// Falls back to the generic comparison when the variants differ.
    pub fn has_equal_value(&self, that: &DefinedProperty) -> bool {
        self.value_equals(&that.value)
    }

    fn same_variant_equals(&self, other: &Value) -> bool {
        match (&self.value, other) {
            (Value::BoolArray(a), Value::BoolArray(b)) => a == b,
            (Value::ByteArray(a), Value::ByteArray(b)) => a == b,
            (Value::ShortArray(a), Value::ShortArray(b)) => a == b,
            (Value::IntArray(a), Value::IntArray(b)) => a == b,
            (Value::LongArray(a), Value::LongArray(b)) => a == b,
            (Value::CharArray(a), Value::CharArray(b)) => a == b,
            (Value::StrArray(a), Value::StrArray(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            // floats need NaN handling, everything else is cheap enough generically
            (a, b) => a.equals(b),
        }
    }
}

impl PartialEq for DefinedProperty {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.has_equal_value(other)
    }
}

impl Eq for DefinedProperty {}

impl Hash for DefinedProperty {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        self.value.hash_canonical(state);
    }
}

impl fmt::Display for DefinedProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Property[{}]={}", self.key, self.value)
    }
}

/// Result of a property lookup: either a defined value or the absence marker.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Property {
    /// The entity holds a value for the key.
    Defined(DefinedProperty),
    /// The entity holds no value for the key.
    NoProperty(PropId),
}

impl Property {
    /// Absence marker for `key`.
    pub fn none(key: PropId) -> Self {
        Property::NoProperty(key)
    }

    /// Defined property for `key`.
    pub fn defined(key: PropId, value: impl Into<Value>) -> Self {
        Property::Defined(DefinedProperty::new(key, value))
    }

    /// Property key id, present in both cases.
    pub fn key(&self) -> PropId {
        match self {
            Property::Defined(prop) => prop.key(),
            Property::NoProperty(key) => *key,
        }
    }

    /// Returns `true` when a value is present.
    pub fn is_defined(&self) -> bool {
        matches!(self, Property::Defined(_))
    }

    /// Returns a copy of the value, if any.
    pub fn value(&self) -> Option<Value> {
        self.as_defined().map(DefinedProperty::value)
    }

    /// Borrowed defined property, if any.
    pub fn as_defined(&self) -> Option<&DefinedProperty> {
        match self {
            Property::Defined(prop) => Some(prop),
            Property::NoProperty(_) => None,
        }
    }

    /// Compares the payload against `other`; an absent property equals nothing.
    pub fn value_equals(&self, other: &Value) -> bool {
        self.as_defined()
            .is_some_and(|prop| prop.value_equals(other))
    }
}

impl From<DefinedProperty> for Property {
    fn from(value: DefinedProperty) -> Self {
        Property::Defined(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_arrays_compare_by_content() {
        let a = DefinedProperty::new(PropId(1), vec![1i16, 2, 3]);
        let b = DefinedProperty::new(PropId(1), vec![1i16, 2, 3]);
        assert!(a.has_equal_value(&b));
        assert!(a.value_equals(&Value::from(vec![1i16, 2, 3])));
        assert_eq!(a.value_hash(), b.value_hash());
        assert!(!a.value_equals(&Value::from(vec![1i16, 2, 4])));
        assert!(!a.value_equals(&Value::from(vec![1i16, 2])));
    }

    #[test]
    fn arrays_compare_across_widths() {
        let short = DefinedProperty::new(PropId(1), vec![1i16, 2]);
        let long = Value::from(vec![1i64, 2]);
        let double = Value::from(vec![1.0f64, 2.0]);
        assert!(short.value_equals(&long));
        assert!(short.value_equals(&double));
        assert_eq!(short.value_hash(), long.canonical_hash());
        assert_eq!(short.value_hash(), double.canonical_hash());
    }

    #[test]
    fn scalars_compare_across_widths() {
        let prop = DefinedProperty::new(PropId(4), 42i32);
        assert!(prop.value_equals(&Value::Long(42)));
        assert!(prop.value_equals(&Value::Double(42.0)));
        assert!(!prop.value_equals(&Value::Double(42.5)));
        assert!(!prop.value_equals(&Value::Str("42".into())));
        assert!(!prop.value_equals(&Value::from(vec![42i32])));
    }

    #[test]
    fn char_equals_single_character_string() {
        let prop = DefinedProperty::new(PropId(2), 'x');
        assert!(prop.value_equals(&Value::from("x")));
        assert!(!prop.value_equals(&Value::from("xy")));
        assert_eq!(prop.value_hash(), Value::from("x").canonical_hash());
    }

    #[test]
    fn value_accessor_returns_detached_copy() {
        let prop = DefinedProperty::new(PropId(9), vec![5i16, 6]);
        let mut copy = prop.value();
        if let Value::ShortArray(ref mut items) = copy {
            items[0] = 99;
        }
        assert!(prop.value_equals(&Value::from(vec![5i16, 6])));
        assert!(!prop.value_equals(&copy));
    }

    #[test]
    fn nan_is_reflexive() {
        let prop = DefinedProperty::new(PropId(3), vec![f64::NAN]);
        assert!(prop.has_equal_value(&prop.clone()));
    }

    #[test]
    fn property_equality_includes_key() {
        let a = DefinedProperty::new(PropId(1), "v");
        let b = DefinedProperty::new(PropId(2), "v");
        assert_ne!(a, b);
        assert!(a.value_equals(b.value_ref()));
    }

    #[test]
    fn no_property_equals_nothing() {
        let none = Property::none(PropId(5));
        assert!(!none.is_defined());
        assert!(!none.value_equals(&Value::Bool(false)));
        assert_eq!(none.key(), PropId(5));
    }

    #[test]
    fn display_renders_arrays() {
        assert_eq!(Value::from(vec![1i16, 2]).to_string(), "[1, 2]");
        assert_eq!(Value::Double(3.0).to_string(), "3");
    }
}

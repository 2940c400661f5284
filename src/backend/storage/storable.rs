// src/backend/storage/storable.rs
use ic_stable_structures::{storable::Bound, Storable};
use serde::{de::DeserializeOwned, Serialize};
use std::borrow::Cow;

/// Wraps any serde type to make it Storable using CBOR encoding.
/// Map keys compare through `T: Ord`, so composite key structs order field by field.
#[derive(Clone, Debug, Ord, PartialOrd, Eq, PartialEq)]
pub struct Cbor<T>(pub T)
where
    T: Serialize + DeserializeOwned;

impl<T> Storable for Cbor<T>
where
    T: Serialize + DeserializeOwned,
{
    fn to_bytes(&self) -> Cow<[u8]> {
        let mut writer = vec![];
        ciborium::ser::into_writer(&self.0, &mut writer)
            .expect("Failed to serialize value to CBOR for stable storage");
        Cow::Owned(writer)
    }

    fn from_bytes(bytes: Cow<[u8]>) -> Self {
        let value: T = ciborium::de::from_reader(bytes.as_ref())
            .expect("Failed to deserialize value from CBOR from stable storage");
        Cbor(value)
    }

    const BOUND: Bound = Bound::Unbounded;
}

pub type StorableString = Cbor<String>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    struct Key {
        parent: String,
        seq: u64,
    }

    #[test]
    fn cbor_bytes_decode_to_the_same_value() {
        let key = Cbor(Key { parent: "com.example.app".into(), seq: 42 });
        let decoded = Cbor::<Key>::from_bytes(key.to_bytes());
        assert_eq!(decoded, key);
    }

    #[test]
    fn composite_keys_order_by_parent_first() {
        let a = Cbor(Key { parent: "a".into(), seq: 9 });
        let b = Cbor(Key { parent: "b".into(), seq: 1 });
        assert!(a < b);
    }
}

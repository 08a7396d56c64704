use serde::Serialize;
use serde::de::DeserializeOwned;

/// Network message with automatic channel name generation and hashing.
///
/// This trait is automatically implemented for all types that are
/// `Serialize + DeserializeOwned + Send + Sync + 'static`.
///
/// The channel name is generated from `std::any::type_name()` and cached.
/// The channel hash is computed from the short type name (without module
/// path) so that it stays stable when a peer reorganizes its modules.
///
/// ## Example
///
/// ```rust
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Serialize, Deserialize, Clone)]
/// struct HarvesterPose {
///     x: f32,
///     y: f32,
///     z: f32,
/// }
///
/// // No trait implementation needed, OrchardMessage is blanket-implemented.
/// ```
pub trait OrchardMessage: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Returns the full type name for this message type (includes module path).
    ///
    /// Example: `"orchard_msgs::GetPlan"`
    fn type_name() -> &'static str {
        cached_name::<Self>(|| std::any::type_name::<Self>().to_string())
    }

    /// Returns the short type name (just the type name, no module path).
    ///
    /// This is what the channel hash is computed from.
    fn short_name() -> &'static str {
        cached_name_keyed::<Self>("short", || {
            let full = Self::type_name();
            full.rsplit("::").next().unwrap_or(full).to_string()
        })
    }

    /// Returns the hash of this message's channel.
    ///
    /// The hash is computed from the short type name. Two types with the same
    /// short name collide intentionally; registration catches that case when
    /// both are used in the same binary.
    fn channel_hash() -> u64 {
        hash_channel(Self::short_name())
    }
}

// Blanket implementation for all serializable types
impl<T> OrchardMessage for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Hash a channel name with the scheme used for [`WirePacket::channel_hash`].
///
/// [`WirePacket::channel_hash`]: crate::WirePacket
pub fn hash_channel(name: &str) -> u64 {
    use std::hash::{Hash, Hasher};

    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    name.hash(&mut hasher);
    hasher.finish()
}

/// Global cache of generated `&'static str` names, keyed by `TypeId` plus a
/// discriminator so one type can cache several derived names.
///
/// The first access per type pays for a format + leak, subsequent accesses
/// are a map lookup.
pub(crate) fn cached_name_keyed<T: 'static + ?Sized>(
    key: &'static str,
    generate: impl FnOnce() -> String,
) -> &'static str {
    use std::any::TypeId;
    use std::collections::HashMap;
    use std::sync::{Mutex, OnceLock};

    static CACHE: OnceLock<Mutex<HashMap<(TypeId, &'static str), &'static str>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));

    let cache_key = (TypeId::of::<T>(), key);

    {
        let cache_guard = cache.lock().unwrap();
        if let Some(&name) = cache_guard.get(&cache_key) {
            return name;
        }
    }

    let static_name: &'static str = Box::leak(generate().into_boxed_str());

    {
        let mut cache_guard = cache.lock().unwrap();
        cache_guard.insert(cache_key, static_name);
    }

    static_name
}

pub(crate) fn cached_name<T: 'static + ?Sized>(generate: impl FnOnce() -> String) -> &'static str {
    cached_name_keyed::<T>("full", generate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_type_name_caching() {
        #[derive(Serialize, Deserialize)]
        struct TestMessage {
            data: String,
        }

        let name1 = TestMessage::type_name();
        let name2 = TestMessage::type_name();

        // Should return the same pointer (cached)
        assert_eq!(name1 as *const str, name2 as *const str);
        assert!(name1.contains("TestMessage"));
    }

    #[test]
    fn test_different_types_different_names() {
        #[derive(Serialize, Deserialize)]
        struct TypeA {
            x: i32,
        }

        #[derive(Serialize, Deserialize)]
        struct TypeB {
            x: i32,
        }

        assert_ne!(TypeA::type_name(), TypeB::type_name());
        assert!(TypeA::type_name().contains("TypeA"));
        assert!(TypeB::type_name().contains("TypeB"));
    }

    #[test]
    fn test_short_name() {
        #[derive(Serialize, Deserialize)]
        struct MyMessage {
            data: String,
        }

        let short = MyMessage::short_name();
        let full = MyMessage::type_name();

        assert_eq!(short, "MyMessage");
        assert!(full.contains("MyMessage"));
        assert!(full.len() > short.len());
    }

    #[test]
    fn test_channel_hash_stability() {
        // Types from different modules with the same short name hash the same.
        mod module1 {
            use serde::{Deserialize, Serialize};
            #[derive(Serialize, Deserialize)]
            pub struct RowUpdate {
                pub row: u32,
            }
        }

        mod module2 {
            use serde::{Deserialize, Serialize};
            #[derive(Serialize, Deserialize)]
            pub struct RowUpdate {
                pub name: String,
            }
        }

        assert_eq!(
            module1::RowUpdate::channel_hash(),
            module2::RowUpdate::channel_hash(),
            "Types with same short name should have same channel hash"
        );
        assert_ne!(module1::RowUpdate::type_name(), module2::RowUpdate::type_name());
    }

    #[test]
    fn test_generic_types() {
        #[derive(Serialize, Deserialize)]
        struct Generic<T> {
            value: T,
        }

        assert_ne!(Generic::<i32>::type_name(), Generic::<String>::type_name());
    }
}

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::messages::{OrchardMessage, cached_name_keyed, hash_channel};

/// Marks a type as a service request with an associated response type.
///
/// A service is the middleware's request/response RPC endpoint: peers call a
/// *named* endpoint with a request and wait for exactly one response. The
/// endpoint name defaults to the short type name and can be overridden where
/// the wire types are defined.
///
/// # Example
///
/// ```rust
/// use serde::{Serialize, Deserialize};
/// use orchard_common::ServiceMessage;
///
/// #[derive(Clone, Debug, Serialize, Deserialize)]
/// struct ListRows;
///
/// #[derive(Clone, Debug, Serialize, Deserialize)]
/// struct RowList {
///     rows: Vec<String>,
/// }
///
/// impl ServiceMessage for ListRows {
///     type Response = RowList;
/// }
///
/// assert_eq!(ListRows::service_name(), "ListRows");
/// ```
pub trait ServiceMessage: OrchardMessage + Clone + Debug {
    /// The response type for this service.
    type Response: OrchardMessage + Clone + Debug;

    /// The endpoint name the service is registered under.
    fn service_name() -> &'static str {
        Self::short_name()
    }
}

/// Wire envelope for an inbound service call.
///
/// The `call_id` is chosen by the caller and echoed verbatim on the reply so
/// the caller can correlate concurrent calls.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(bound = "S: ServiceMessage")]
pub struct ServiceCall<S: ServiceMessage> {
    pub call_id: u64,
    pub request: S,
}

impl<S: ServiceMessage> ServiceCall<S> {
    /// The wire channel this envelope travels on, e.g.
    /// `"ServiceCall(get_gathering_plan)"`.
    pub fn channel_name() -> &'static str {
        cached_name_keyed::<S>("service_call", || {
            format!("ServiceCall({})", S::service_name())
        })
    }

    /// Hash of [`Self::channel_name`], used for the packet fallback lookup.
    pub fn channel_hash() -> u64 {
        hash_channel(Self::channel_name())
    }
}

/// Wire envelope for an outbound service reply.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(bound = "S: ServiceMessage")]
pub struct ServiceReply<S: ServiceMessage> {
    pub call_id: u64,
    pub response: S::Response,
}

impl<S: ServiceMessage> ServiceReply<S> {
    /// The wire channel replies travel on, e.g.
    /// `"ServiceReply(get_gathering_plan)"`.
    pub fn channel_name() -> &'static str {
        cached_name_keyed::<S>("service_reply", || {
            format!("ServiceReply({})", S::service_name())
        })
    }

    /// Hash of [`Self::channel_name`].
    pub fn channel_hash() -> u64 {
        hash_channel(Self::channel_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Serialize, Deserialize)]
    struct Ping;

    #[derive(Clone, Debug, Serialize, Deserialize)]
    struct Pong;

    impl ServiceMessage for Ping {
        type Response = Pong;
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    struct NamedCall;

    impl ServiceMessage for NamedCall {
        type Response = Pong;

        fn service_name() -> &'static str {
            "custom_endpoint"
        }
    }

    #[test]
    fn test_default_service_name() {
        assert_eq!(Ping::service_name(), "Ping");
        assert_eq!(ServiceCall::<Ping>::channel_name(), "ServiceCall(Ping)");
        assert_eq!(ServiceReply::<Ping>::channel_name(), "ServiceReply(Ping)");
    }

    #[test]
    fn test_overridden_service_name() {
        assert_eq!(
            ServiceCall::<NamedCall>::channel_name(),
            "ServiceCall(custom_endpoint)"
        );
    }

    #[test]
    fn test_call_and_reply_channels_differ() {
        assert_ne!(
            ServiceCall::<Ping>::channel_name(),
            ServiceReply::<Ping>::channel_name()
        );
        assert_ne!(
            ServiceCall::<Ping>::channel_hash(),
            ServiceReply::<Ping>::channel_hash()
        );
    }

    #[test]
    fn test_channel_names_cached() {
        let a = ServiceCall::<Ping>::channel_name();
        let b = ServiceCall::<Ping>::channel_name();
        assert_eq!(a as *const str, b as *const str);
    }
}

//! Component payload codec.
//!
//! Each component encodes its own state to an opaque JSON string, paired with
//! its type key. Decoding goes the other way through a registry built at
//! startup: the type key selects a decode function for the component's
//! concrete state type, and a restore function that hands the decoded state
//! back to the matching component on the live target.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::document::EncodedPayloadMap;
use crate::error::PersistError;
use crate::world::{Entity, Transform};

/// A captured component state, erased to whatever concrete type its component uses.
pub trait ComponentState: Any + Debug {
    fn to_json(&self) -> serde_json::Result<String>;
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T> ComponentState for T
where
    T: Serialize + Debug + 'static,
{
    fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

pub type Payload = Box<dyn ComponentState>;

/// Persistence contract implemented by gameplay components.
///
/// `restore` receives the transform the entity was placed at. Components that
/// keep their own copy of the position must prefer it over anything stored in
/// their payload, since selection loads move entities to a new anchor.
pub trait Persistable: Any + Debug {
    type State: Serialize + DeserializeOwned + Debug + 'static;

    /// Stable key the payload is stored under. A blank key opts out of saving.
    const TYPE_KEY: &'static str;

    /// Asset the owning entity is instantiated from, when the component knows it.
    fn asset_id(&self) -> Option<&str> {
        None
    }

    fn capture(&self) -> Self::State;

    fn restore(&mut self, state: Self::State, placement: &Transform);
}

/// Object-safe face of [`Persistable`], used wherever components are stored.
pub trait Saveable: Any + Debug {
    fn type_key(&self) -> &str;
    fn asset_id(&self) -> Option<&str>;
    fn capture_payload(&self) -> Payload;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Persistable> Saveable for T {
    fn type_key(&self) -> &str {
        T::TYPE_KEY
    }

    fn asset_id(&self) -> Option<&str> {
        Persistable::asset_id(self)
    }

    fn capture_payload(&self) -> Payload {
        Box::new(self.capture())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

type DecodeFn = fn(&str) -> serde_json::Result<Payload>;
type RestoreFn = fn(&mut dyn Saveable, Payload, &Transform) -> Result<(), String>;

#[derive(Clone, Copy)]
struct PayloadHandler {
    state_type: &'static str,
    decode: DecodeFn,
    restore: RestoreFn,
}

fn decode_state<C: Persistable>(json: &str) -> serde_json::Result<Payload> {
    let state: C::State = serde_json::from_str(json)?;
    Ok(Box::new(state))
}

fn restore_state<C: Persistable>(
    component: &mut dyn Saveable,
    payload: Payload,
    placement: &Transform,
) -> Result<(), String> {
    let component = component
        .as_any_mut()
        .downcast_mut::<C>()
        .ok_or_else(|| format!("component is not a {}", type_name::<C>()))?;
    let state = payload
        .into_any()
        .downcast::<C::State>()
        .map_err(|_| format!("payload is not a {}", type_name::<C::State>()))?;
    component.restore(*state, placement);
    Ok(())
}

/// Payloads decoded for one target, plus whatever could not be.
#[derive(Debug, Default)]
pub struct DecodedPayloads {
    pub entries: Vec<(String, Payload)>,
    pub errors: Vec<PersistError>,
}

/// Encodes, decodes, and merges per-entity payload maps.
#[derive(Default)]
pub struct StateCodec {
    handlers: HashMap<String, PayloadHandler>,
}

impl Debug for StateCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.handlers.keys().collect();
        keys.sort();
        f.debug_struct("StateCodec").field("types", &keys).finish()
    }
}

impl StateCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `C` so payloads stored under `C::TYPE_KEY` can be decoded.
    pub fn register<C: Persistable>(&mut self) -> &mut Self {
        let handler = PayloadHandler {
            state_type: type_name::<C::State>(),
            decode: decode_state::<C>,
            restore: restore_state::<C>,
        };
        if self.handlers.insert(C::TYPE_KEY.to_string(), handler).is_some() {
            warn!(type_key = C::TYPE_KEY, "payload type registered twice; keeping the latest");
        }
        self
    }

    pub fn with<C: Persistable>(mut self) -> Self {
        self.register::<C>();
        self
    }

    pub fn is_registered(&self, type_key: &str) -> bool {
        self.handlers.contains_key(type_key)
    }

    /// Encodes every payload independently. Payloads that fail to serialize are
    /// dropped and logged; a repeated key keeps the last payload.
    pub fn encode<'a, I>(&self, payloads: I) -> EncodedPayloadMap
    where
        I: IntoIterator<Item = (&'a str, &'a dyn ComponentState)>,
    {
        let mut map = EncodedPayloadMap::default();
        for (key, payload) in payloads {
            match payload.to_json() {
                Ok(json) => map.upsert(key, json),
                Err(err) => warn!(type_key = key, error = %err, "dropping payload that failed to encode"),
            }
        }
        map
    }

    /// Encodes straight to the `customData` string form.
    pub fn encode_to_string<'a, I>(&self, payloads: I) -> String
    where
        I: IntoIterator<Item = (&'a str, &'a dyn ComponentState)>,
    {
        let map = self.encode(payloads);
        if map.is_empty() {
            return String::new();
        }
        map_to_string(&map)
    }

    /// Adds or overwrites `type_key` in an existing `customData` string.
    ///
    /// Existing entries stay opaque: their target may not exist yet, so they are
    /// carried over without decoding. A damaged existing map is reset to empty.
    pub fn merge(&self, existing: &str, type_key: &str, payload: &dyn ComponentState) -> String {
        let mut map = parse_lenient(existing);
        match payload.to_json() {
            Ok(json) => map.upsert(type_key, json),
            Err(err) => {
                warn!(type_key, error = %err, "payload failed to encode during merge");
            }
        }
        map_to_string(&map)
    }

    /// Decodes `custom_data` against the components present on `target`.
    ///
    /// Never fails as a whole: each entry that cannot be resolved or decoded is
    /// dropped and reported in [`DecodedPayloads::errors`].
    pub fn decode(&self, custom_data: &str, target: &Entity) -> DecodedPayloads {
        let mut decoded = DecodedPayloads::default();
        if custom_data.trim().is_empty() {
            return decoded;
        }

        let map: EncodedPayloadMap = match serde_json::from_str(custom_data) {
            Ok(map) => map,
            Err(err) => {
                warn!(entity = %target.name, error = %err, "customData is not a payload map");
                decoded
                    .errors
                    .push(PersistError::parse("customData", err));
                return decoded;
            }
        };
        if map.keys.len() != map.json_values.len() {
            warn!(
                entity = %target.name,
                keys = map.keys.len(),
                values = map.json_values.len(),
                "payload map arrays disagree in length; decoding the paired prefix"
            );
        }

        for (key, json) in map.keys.iter().zip(map.json_values.iter()) {
            match self.decode_entry(key, json, target) {
                Ok(payload) => decoded.entries.push((key.clone(), payload)),
                Err(err) => {
                    warn!(entity = %target.name, type_key = %key, error = %err, "dropping payload");
                    decoded.errors.push(err);
                }
            }
        }
        decoded
    }

    fn decode_entry(&self, key: &str, json: &str, target: &Entity) -> Result<Payload, PersistError> {
        if target.component(key).is_none() {
            return Err(PersistError::type_resolution(
                key,
                "target has no component with this type key",
            ));
        }
        let handler = self
            .handlers
            .get(key)
            .ok_or_else(|| PersistError::type_resolution(key, "no payload type registered"))?;
        (handler.decode)(json).map_err(|err| {
            PersistError::type_resolution(
                key,
                format!("payload does not decode as {}: {err}", handler.state_type),
            )
        })
    }

    /// Hands each decoded payload to the component it belongs to.
    pub fn restore(
        &self,
        payloads: Vec<(String, Payload)>,
        target: &mut Entity,
        placement: &Transform,
    ) -> Vec<PersistError> {
        let mut errors = Vec::new();
        for (key, payload) in payloads {
            let Some(handler) = self.handlers.get(&key).copied() else {
                errors.push(PersistError::type_resolution(&key, "no payload type registered"));
                continue;
            };
            let Some(component) = target.component_mut(&key) else {
                errors.push(PersistError::type_resolution(
                    &key,
                    "target has no component with this type key",
                ));
                continue;
            };
            if let Err(reason) = (handler.restore)(component, payload, placement) {
                warn!(type_key = %key, %reason, "restore rejected payload");
                errors.push(PersistError::type_resolution(&key, reason));
            } else {
                debug!(type_key = %key, "payload restored");
            }
        }
        errors
    }

    /// Decode followed by restore, collecting every per-entry failure.
    pub fn decode_and_restore(
        &self,
        custom_data: &str,
        target: &mut Entity,
        placement: &Transform,
    ) -> Vec<PersistError> {
        let DecodedPayloads {
            entries,
            mut errors,
        } = self.decode(custom_data, target);
        errors.extend(self.restore(entries, target, placement));
        errors
    }
}

fn parse_lenient(existing: &str) -> EncodedPayloadMap {
    if existing.trim().is_empty() {
        return EncodedPayloadMap::default();
    }
    match serde_json::from_str::<EncodedPayloadMap>(existing) {
        Ok(map) if map.keys.len() == map.json_values.len() => map,
        Ok(_) => {
            warn!("existing payload map has mismatched arrays; starting over");
            EncodedPayloadMap::default()
        }
        Err(err) => {
            warn!(error = %err, "existing payload map is corrupt; starting over");
            EncodedPayloadMap::default()
        }
    }
}

fn map_to_string(map: &EncodedPayloadMap) -> String {
    match serde_json::to_string(map) {
        Ok(text) => text,
        Err(err) => {
            warn!(error = %err, "payload map failed to serialize");
            String::new()
        }
    }
}

#[cfg(test)]
#[path = "tests/codec_tests.rs"]
mod tests;

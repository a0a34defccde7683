//! Declaring kinds from script definitions
//!
//! A definition is a plain object: an `id` plus the kind's settings, with
//! camelCase keys and every setting optional. Handler functions travel
//! separately; the caller supplies the resulting [`ScriptBehavior`], or
//! `None` for the default behavior.

use crate::{ScriptBehavior, ScriptError};
use redwire_core::{
    BlockSettings, BlockType, EntitySettings, EntityType, Handle, ItemSettings, ItemType, Kind,
    Registries,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Definition<S> {
    id: String,
    #[serde(flatten)]
    settings: S,
}

fn parse<S: DeserializeOwned>(kind: Kind, json: &str) -> Result<Definition<S>, ScriptError> {
    serde_json::from_str(json).map_err(|source| ScriptError::InvalidDefinition { kind, source })
}

/// Register one definition, given as JSON text, with the registry of `kind`.
///
/// `behavior` is called with the declared id once the definition parses.
pub fn register_definition(
    registries: &Registries,
    kind: Kind,
    json: &str,
    behavior: impl FnOnce(&str) -> Option<ScriptBehavior>,
) -> Result<Handle, ScriptError> {
    let handle = match kind {
        Kind::Block => {
            let def = parse::<BlockSettings>(kind, json)?;
            let scripted = behavior(&def.id);
            let mut builder = BlockType::builder(def.id).settings(def.settings);
            if let Some(scripted) = scripted {
                builder = builder.behavior(scripted);
            }
            registries.blocks().register(builder.build())?
        }
        Kind::Item => {
            let def = parse::<ItemSettings>(kind, json)?;
            let scripted = behavior(&def.id);
            let mut builder = ItemType::builder(def.id).settings(def.settings);
            if let Some(scripted) = scripted {
                builder = builder.behavior(scripted);
            }
            registries.items().register(builder.build())?
        }
        Kind::Entity => {
            let def = parse::<EntitySettings>(kind, json)?;
            let scripted = behavior(&def.id);
            let mut builder = EntityType::builder(def.id).settings(def.settings);
            if let Some(scripted) = scripted {
                builder = builder.behavior(scripted);
            }
            registries.entities().register(builder.build())?
        }
    };
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use redwire_core::{BlockModel, BridgeError, EntityBase};

    #[test]
    fn block_definition_with_model() {
        let registries = Registries::new();
        let handle = register_definition(
            &registries,
            Kind::Block,
            r#"{"id":"mymod:ruby_ore","hardness":3,"requiresTool":true,
                "luminance":20,"model":{"type":"cube_all","texture":"mymod:block/ruby_ore"}}"#,
            |_| None,
        )
        .unwrap();

        let block = registries.blocks().lookup(handle).unwrap();
        assert_eq!(block.settings().hardness, 3.0);
        assert_eq!(block.settings().luminance, 15);
        assert_eq!(
            block.settings().model,
            Some(BlockModel::CubeAll {
                texture: "mymod:block/ruby_ore".into()
            })
        );
    }

    #[test]
    fn entity_definition_with_goals() {
        let registries = Registries::new();
        let handle = register_definition(
            &registries,
            Kind::Entity,
            r#"{"id":"mymod:ruby_cow","maxHealth":10,
                "base":{"type":"animal","breedingItem":"mymod:ruby"},
                "goals":[{"type":"tempt","priority":3,"item":"mymod:ruby","speed":1.25}]}"#,
            |_| None,
        )
        .unwrap();

        let cow = registries.entities().lookup(handle).unwrap();
        assert!(cow.settings().base.is_animal());
        assert!(matches!(
            &cow.settings().base,
            EntityBase::Animal { breeding_item: Some(item) } if item == "mymod:ruby"
        ));
        assert_eq!(cow.settings().goals[0].params["speed"], 1.25);
    }

    #[test]
    fn behavior_is_built_for_the_declared_id() {
        let registries = Registries::new();
        let mut seen = Vec::new();
        register_definition(&registries, Kind::Item, r#"{"id":"mymod:ruby"}"#, |id| {
            seen.push(id.to_string());
            None
        })
        .unwrap();
        let _ = register_definition(&registries, Kind::Item, r#"{"id":7}"#, |id| {
            seen.push(id.to_string());
            None
        });
        assert_eq!(seen, ["mymod:ruby"]);
    }

    #[test]
    fn bad_definitions_fail_loudly() {
        let registries = Registries::new();
        assert!(matches!(
            register_definition(&registries, Kind::Item, r#"{"maxStackSize":16}"#, |_| None),
            Err(ScriptError::InvalidDefinition { kind: Kind::Item, .. })
        ));
        assert!(matches!(
            register_definition(&registries, Kind::Item, r#"{"id":"Not Valid"}"#, |_| None),
            Err(ScriptError::Registration(BridgeError::InvalidIdentifier { .. }))
        ));

        registries.freeze_all();
        assert!(matches!(
            register_definition(&registries, Kind::Item, r#"{"id":"mymod:late"}"#, |_| None),
            Err(ScriptError::Registration(BridgeError::AlreadyFrozen { .. }))
        ));
    }
}

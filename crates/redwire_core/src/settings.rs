//! Kind-specific settings carried by registration requests
//!
//! Settings deserialize from script-side definitions (camelCase keys, every
//! field defaulted) and serialize into the manifest in the same shape.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three object kinds a script can declare.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Block,
    Item,
    Entity,
}

impl Kind {
    pub const ALL: [Kind; 3] = [Kind::Block, Kind::Item, Kind::Entity];

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Block => "block",
            Kind::Item => "item",
            Kind::Entity => "entity",
        }
    }

    /// Name of the manifest array holding entries of this kind.
    pub fn manifest_section(self) -> &'static str {
        match self {
            Kind::Block => "blocks",
            Kind::Item => "items",
            Kind::Entity => "entities",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings payload of one registration request, tagged by kind.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum KindSettings {
    Block(BlockSettings),
    Item(ItemSettings),
    Entity(EntitySettings),
}

impl KindSettings {
    pub fn kind(&self) -> Kind {
        match self {
            KindSettings::Block(_) => Kind::Block,
            KindSettings::Item(_) => Kind::Item,
            KindSettings::Entity(_) => Kind::Entity,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BlockSettings {
    /// Time to break; `-1.0` makes the block unbreakable.
    pub hardness: f32,
    pub resistance: f32,
    pub requires_tool: bool,
    /// Light emission, `0..=15`.
    pub luminance: u8,
    pub slipperiness: f64,
    pub velocity_multiplier: f64,
    pub jump_velocity_multiplier: f64,
    pub ticks_randomly: bool,
    pub collidable: bool,
    pub replaceable: bool,
    pub burnable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<BlockModel>,
}

impl BlockSettings {
    pub const MAX_LUMINANCE: u8 = 15;

    /// Clamp out-of-range fields to what the host accepts.
    pub fn clamped(mut self) -> Self {
        self.luminance = self.luminance.min(Self::MAX_LUMINANCE);
        self
    }
}

impl Default for BlockSettings {
    fn default() -> Self {
        Self {
            hardness: 1.0,
            resistance: 1.0,
            requires_tool: false,
            luminance: 0,
            slipperiness: 0.6,
            velocity_multiplier: 1.0,
            jump_velocity_multiplier: 1.0,
            ticks_randomly: false,
            collidable: true,
            replaceable: false,
            burnable: false,
            model: None,
        }
    }
}

/// Block model description consumed by the asset generator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockModel {
    CubeAll { texture: String },
    CubeColumn { end: String, side: String },
    Custom { model: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ItemSettings {
    pub max_stack_size: u32,
    /// Durability; `0` means the item does not take damage.
    pub max_damage: u32,
    pub fire_resistant: bool,
    pub attack_damage: f64,
    pub attack_speed: f64,
    pub attack_knockback: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub texture: Option<String>,
}

impl Default for ItemSettings {
    fn default() -> Self {
        Self {
            max_stack_size: 64,
            max_damage: 0,
            fire_resistant: false,
            attack_damage: 0.0,
            attack_speed: 0.0,
            attack_knockback: 0.0,
            texture: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EntitySettings {
    pub width: f32,
    pub height: f32,
    pub max_health: f64,
    pub movement_speed: f64,
    pub attack_damage: f64,
    pub spawn_group: SpawnGroup,
    pub base: EntityBase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<EntityModel>,
    pub goals: Vec<GoalConfig>,
    pub target_goals: Vec<GoalConfig>,
}

impl EntitySettings {
    /// Goal list in the JSON array form the host's goal factory reads.
    pub fn goals_json(&self) -> String {
        goals_to_json(&self.goals)
    }

    pub fn target_goals_json(&self) -> String {
        goals_to_json(&self.target_goals)
    }
}

fn goals_to_json(goals: &[GoalConfig]) -> String {
    // GoalConfig holds only strings, integers and JSON values.
    serde_json::to_string(goals).unwrap_or_else(|_| "[]".to_string())
}

impl Default for EntitySettings {
    fn default() -> Self {
        Self {
            width: 0.6,
            height: 1.8,
            max_health: 20.0,
            movement_speed: 0.25,
            attack_damage: 2.0,
            spawn_group: SpawnGroup::Creature,
            base: EntityBase::PathfinderMob,
            model: None,
            goals: Vec::new(),
            target_goals: Vec::new(),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnGroup {
    Monster,
    #[default]
    Creature,
    Ambient,
    WaterCreature,
    Misc,
}

impl SpawnGroup {
    pub fn ordinal(self) -> i32 {
        match self {
            SpawnGroup::Monster => 0,
            SpawnGroup::Creature => 1,
            SpawnGroup::Ambient => 2,
            SpawnGroup::WaterCreature => 3,
            SpawnGroup::Misc => 4,
        }
    }
}

/// Host class an entity proxy extends. Decides which kind-specific events apply.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityBase {
    #[default]
    PathfinderMob,
    Monster,
    Animal {
        #[serde(default, rename = "breedingItem", skip_serializing_if = "Option::is_none")]
        breeding_item: Option<String>,
    },
    Projectile,
}

impl EntityBase {
    pub fn ordinal(&self) -> i32 {
        match self {
            EntityBase::PathfinderMob => 0,
            EntityBase::Monster => 1,
            EntityBase::Animal { .. } => 2,
            EntityBase::Projectile => 3,
        }
    }

    pub fn is_animal(&self) -> bool {
        matches!(self, EntityBase::Animal { .. })
    }

    pub fn is_projectile(&self) -> bool {
        matches!(self, EntityBase::Projectile)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityModel {
    #[serde(rename = "type")]
    pub model_type: String,
    pub texture: String,
    #[serde(default = "default_model_scale")]
    pub scale: f64,
}

fn default_model_scale() -> f64 {
    1.0
}

/// One AI goal entry: a goal type, its priority and free-form parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GoalConfig {
    #[serde(rename = "type")]
    pub goal_type: String,
    pub priority: i32,
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl GoalConfig {
    pub fn new(goal_type: impl Into<String>, priority: i32) -> Self {
        Self {
            goal_type: goal_type.into(),
            priority,
            params: serde_json::Map::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn block_settings_default_missing_fields() {
        let settings: BlockSettings =
            serde_json::from_value(json!({ "hardness": 3.0, "requiresTool": true })).unwrap();
        assert_eq!(settings.hardness, 3.0);
        assert!(settings.requires_tool);
        assert_eq!(settings.slipperiness, 0.6);
        assert!(settings.collidable);
    }

    #[test]
    fn luminance_is_clamped() {
        let settings = BlockSettings {
            luminance: 40,
            ..Default::default()
        };
        assert_eq!(settings.clamped().luminance, 15);
    }

    #[test]
    fn goals_serialize_with_flattened_params() {
        let settings = EntitySettings {
            goals: vec![
                GoalConfig::new("melee_attack", 2).with_param("speed", 1.2),
                GoalConfig::new("random_stroll", 5),
            ],
            ..Default::default()
        };
        let parsed: serde_json::Value = serde_json::from_str(&settings.goals_json()).unwrap();
        assert_eq!(
            parsed,
            json!([
                { "type": "melee_attack", "priority": 2, "speed": 1.2 },
                { "type": "random_stroll", "priority": 5 }
            ])
        );
        assert_eq!(settings.target_goals_json(), "[]");
    }

    #[test]
    fn entity_base_reads_breeding_item() {
        let base: EntityBase =
            serde_json::from_value(json!({ "type": "animal", "breedingItem": "minecraft:wheat" }))
                .unwrap();
        assert_eq!(
            base,
            EntityBase::Animal {
                breeding_item: Some("minecraft:wheat".into())
            }
        );
        assert_eq!(base.ordinal(), 2);
        assert!(base.is_animal());
    }
}

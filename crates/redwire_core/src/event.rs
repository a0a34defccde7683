//! Shared event vocabulary for host -> script callbacks

use crate::Kind;
use std::fmt;

/// Host world identifier as reported by the host (a hash of its level object).
pub type WorldId = i64;

/// Host-side entity id. Players are entities too.
pub type EntityId = i32;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Hand {
    #[default]
    Main,
    Off,
}

impl Hand {
    /// Decode the host's hand ordinal. Anything but `1` is the main hand.
    pub fn from_ordinal(ordinal: i32) -> Self {
        if ordinal == 1 {
            Hand::Off
        } else {
            Hand::Main
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Hand::Main => "main",
            Hand::Off => "off",
        }
    }
}

/// Face of a block, in the host's ordinal order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Down,
    Up,
    North,
    South,
    West,
    East,
}

impl Direction {
    pub fn from_ordinal(ordinal: i32) -> Option<Self> {
        Some(match ordinal {
            0 => Direction::Down,
            1 => Direction::Up,
            2 => Direction::North,
            3 => Direction::South,
            4 => Direction::West,
            5 => Direction::East,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Down => "down",
            Direction::Up => "up",
            Direction::North => "north",
            Direction::South => "south",
            Direction::West => "west",
            Direction::East => "east",
        }
    }
}

/// Result of an interaction callback.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ActionResult {
    Success,
    ConsumePartial,
    Consume,
    Fail,
    #[default]
    Pass,
}

impl ActionResult {
    /// Parse the snake_case name scripts use (`"consume_partial"`).
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "success" => ActionResult::Success,
            "consume_partial" => ActionResult::ConsumePartial,
            "consume" => ActionResult::Consume,
            "fail" => ActionResult::Fail,
            "pass" => ActionResult::Pass,
            _ => return None,
        })
    }

    /// Ordinal the host expects back for a block `use` callback.
    pub fn block_ordinal(self) -> i32 {
        match self {
            ActionResult::Success => 0,
            ActionResult::ConsumePartial => 1,
            ActionResult::Consume => 2,
            ActionResult::Pass => 3,
            ActionResult::Fail => 4,
        }
    }

    /// Ordinal the host expects back for item `use*` callbacks.
    pub fn item_ordinal(self) -> i32 {
        match self {
            ActionResult::Success => 0,
            ActionResult::ConsumePartial => 1,
            ActionResult::Consume => 2,
            ActionResult::Fail => 3,
            ActionResult::Pass => 4,
        }
    }
}

/// Value handed back to the host after dispatching one event.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventOutcome {
    /// Answer to a permission check (break, damage, attack).
    Allow(bool),
    /// Answer to an interaction.
    Action(ActionResult),
    /// Notification events return nothing.
    Done,
}

impl EventOutcome {
    pub fn allowed(self) -> bool {
        match self {
            EventOutcome::Allow(allow) => allow,
            EventOutcome::Action(result) => result != ActionResult::Fail,
            EventOutcome::Done => true,
        }
    }

    /// Integer form for hosts that receive callback results over a C ABI.
    pub fn to_wire(self, kind: Kind) -> i32 {
        match self {
            EventOutcome::Allow(allow) => allow as i32,
            EventOutcome::Action(result) if kind == Kind::Item => result.item_ordinal(),
            EventOutcome::Action(result) => result.block_ordinal(),
            EventOutcome::Done => 0,
        }
    }
}

/// An event addressed to one kind of behavior object.
pub trait KindEvent: fmt::Debug + Send {
    /// Stable event name used in logs.
    fn name(&self) -> &'static str;

    /// Value returned when the target handle cannot be resolved.
    fn default_outcome(&self) -> EventOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_has_different_ordinals_per_kind() {
        assert_eq!(ActionResult::Pass.block_ordinal(), 3);
        assert_eq!(ActionResult::Pass.item_ordinal(), 4);
        assert_eq!(ActionResult::Fail.block_ordinal(), 4);
        assert_eq!(ActionResult::Fail.item_ordinal(), 3);
        assert_eq!(
            EventOutcome::Action(ActionResult::Pass).to_wire(Kind::Item),
            4
        );
        assert_eq!(EventOutcome::Allow(true).to_wire(Kind::Block), 1);
    }

    #[test]
    fn hand_ordinal() {
        assert_eq!(Hand::from_ordinal(0), Hand::Main);
        assert_eq!(Hand::from_ordinal(1), Hand::Off);
        assert_eq!(Direction::from_ordinal(5), Some(Direction::East));
        assert_eq!(Direction::from_ordinal(6), None);
        assert_eq!(Direction::North.as_str(), "north");
        assert_eq!(Hand::Off.as_str(), "off");
    }

    #[test]
    fn action_names() {
        assert_eq!(ActionResult::from_name("consume_partial"), Some(ActionResult::ConsumePartial));
        assert_eq!(ActionResult::from_name("pass"), Some(ActionResult::Pass));
        assert_eq!(ActionResult::from_name("Success"), None);
    }
}

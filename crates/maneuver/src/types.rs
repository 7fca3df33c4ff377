//! Maneuver enums and the desire lookup

use lane_fuser::Side;
use serde::{Deserialize, Serialize};

/// Blinker lamp state, from the driver stalk or a navigation hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlinkerState {
    #[default]
    None,
    Left,
    Right,
    Both,
}

impl BlinkerState {
    pub fn from_lamps(left: bool, right: bool) -> Self {
        match (left, right) {
            (false, false) => BlinkerState::None,
            (true, false) => BlinkerState::Left,
            (false, true) => BlinkerState::Right,
            (true, true) => BlinkerState::Both,
        }
    }

    /// Direction of a single-sided blinker
    pub fn side(&self) -> Option<Side> {
        match self {
            BlinkerState::Left => Some(Side::Left),
            BlinkerState::Right => Some(Side::Right),
            _ => None,
        }
    }

    pub fn is_directional(&self) -> bool {
        self.side().is_some()
    }
}

impl From<Side> for BlinkerState {
    fn from(side: Side) -> Self {
        match side {
            Side::Left => BlinkerState::Left,
            Side::Right => BlinkerState::Right,
        }
    }
}

/// Classification of the current maneuver episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ManeuverType {
    #[default]
    None,
    Turn,
    LaneChange,
}

impl ManeuverType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManeuverType::None => "none",
            ManeuverType::Turn => "turn",
            ManeuverType::LaneChange => "lane_change",
        }
    }
}

/// Lane change phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LaneChangeState {
    #[default]
    Off,
    PreLaneChange,
    Starting,
    Finishing,
}

impl LaneChangeState {
    /// Off and PreLaneChange are the only states where the episode may be reclassified
    pub fn is_idle(&self) -> bool {
        matches!(self, LaneChangeState::Off | LaneChangeState::PreLaneChange)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LaneChangeDirection {
    #[default]
    None,
    Left,
    Right,
}

impl From<Side> for LaneChangeDirection {
    fn from(side: Side) -> Self {
        match side {
            Side::Left => LaneChangeDirection::Left,
            Side::Right => LaneChangeDirection::Right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TurnDirection {
    #[default]
    None,
    Left,
    Right,
}

impl From<Side> for TurnDirection {
    fn from(side: Side) -> Self {
        match side {
            Side::Left => TurnDirection::Left,
            Side::Right => TurnDirection::Right,
        }
    }
}

impl From<TurnDirection> for LaneChangeDirection {
    fn from(dir: TurnDirection) -> Self {
        match dir {
            TurnDirection::None => LaneChangeDirection::None,
            TurnDirection::Left => LaneChangeDirection::Left,
            TurnDirection::Right => LaneChangeDirection::Right,
        }
    }
}

/// Driving intent handed to the path model, in model vector order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Desire {
    #[default]
    None,
    TurnLeft,
    TurnRight,
    LaneChangeLeft,
    LaneChangeRight,
    KeepLeft,
    KeepRight,
}

impl Desire {
    /// Number of entries in the model's desire vector
    pub const COUNT: usize = 7;

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_turn(dir: TurnDirection) -> Self {
        match dir {
            TurnDirection::None => Desire::None,
            TurnDirection::Left => Desire::TurnLeft,
            TurnDirection::Right => Desire::TurnRight,
        }
    }

    /// Lane change lookup: only an active change carries a directional desire.
    /// Keep desires are never produced here.
    pub fn from_lane_change(dir: LaneChangeDirection, state: LaneChangeState) -> Self {
        match (dir, state) {
            (LaneChangeDirection::Left, LaneChangeState::Starting | LaneChangeState::Finishing) => {
                Desire::LaneChangeLeft
            }
            (LaneChangeDirection::Right, LaneChangeState::Starting | LaneChangeState::Finishing) => {
                Desire::LaneChangeRight
            }
            _ => Desire::None,
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, Desire::KeepLeft | Desire::KeepRight)
    }
}

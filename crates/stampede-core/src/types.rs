//! Payload schemas and vector math

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// Type tags for every known payload schema
pub mod tag {
    pub const LOGIN: &str = "login";
    pub const MOVE_REQUEST: &str = "moveRequest";
    pub const MOVE_APPROVED: &str = "moveApproved";
    pub const POSITION_CORRECTION: &str = "positionCorrection";
    pub const REGISTER_RESPONSE: &str = "registerResponse";
    pub const LOGIN_RESPONSE: &str = "loginResponse";
}

/// Position or direction in world space.
///
/// Serialized with upper-case component names to match the game server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3f {
    #[serde(rename = "X")]
    pub x: f32,
    #[serde(rename = "Y")]
    pub y: f32,
    #[serde(rename = "Z")]
    pub z: f32,
}

impl Vector3f {
    pub const ZERO: Vector3f = Vector3f::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    pub fn distance_squared(self, other: Vector3f) -> f32 {
        (other - self).length_squared()
    }

    pub fn distance(self, other: Vector3f) -> f32 {
        (other - self).length()
    }

    /// Step toward `target` by at most `max_delta`, landing exactly on it
    /// instead of overshooting.
    pub fn move_towards(self, target: Vector3f, max_delta: f32) -> Vector3f {
        let delta = target - self;
        let dist = delta.length();
        if dist <= max_delta || dist == 0.0 {
            return target;
        }
        self + delta * (max_delta / dist)
    }
}

impl Add for Vector3f {
    type Output = Vector3f;

    fn add(self, rhs: Vector3f) -> Vector3f {
        Vector3f::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3f {
    type Output = Vector3f;

    fn sub(self, rhs: Vector3f) -> Vector3f {
        Vector3f::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vector3f {
    type Output = Vector3f;

    fn mul(self, rhs: f32) -> Vector3f {
        Vector3f::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl std::fmt::Display for Vector3f {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// Authentication sent immediately after the transport opens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Login {
    #[serde(rename = "clientID")]
    pub client_id: i64,
    pub username: String,
}

/// Ask the server to move this actor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub target: Vector3f,
}

/// Server accepted a move; `speed` is in units per second
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveApproved {
    pub target: Vector3f,
    pub speed: f32,
}

/// Server-authoritative position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionCorrection {
    pub position: Vector3f,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

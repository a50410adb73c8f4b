use std::fmt;

use serde::{Deserialize, Serialize};

/// A capture medium that needs user authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Medium {
    Camera,
    Microphone,
}

impl fmt::Display for Medium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Camera => f.write_str("camera"),
            Self::Microphone => f.write_str("microphone"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Authorization {
    #[default]
    Undetermined,
    Denied,
    Granted,
}

impl Authorization {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }

    pub fn is_determined(&self) -> bool {
        !matches!(self, Self::Undetermined)
    }
}

/// Authorization for both media.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionState {
    pub camera: Authorization,
    pub microphone: Authorization,
}

impl PermissionState {
    pub fn get(&self, medium: Medium) -> Authorization {
        match medium {
            Medium::Camera => self.camera,
            Medium::Microphone => self.microphone,
        }
    }

    pub(crate) fn slot_mut(&mut self, medium: Medium) -> &mut Authorization {
        match medium {
            Medium::Camera => &mut self.camera,
            Medium::Microphone => &mut self.microphone,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.camera.is_determined() && self.microphone.is_determined()
    }
}
